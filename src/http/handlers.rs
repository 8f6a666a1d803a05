use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, LoginOutcome, PasswordChange};
use crate::app::content::{ContentService, FlagOutcome, SaveOutcome, UnsaveOutcome};
use crate::app::ledger::{DailyBonusOutcome, LedgerService, SpendOutcome, DAILY_BONUS};
use crate::app::moderation::{ModerationService, ReportFilter, ResolveOutcome};
use crate::app::stats::{DashboardStats, StatsService};
use crate::app::users::{UserFilter, UserService};
use crate::domain::content::{
    Content, ContentFilter, ContentStatus, ContentType, Difficulty, NewContent,
};
use crate::domain::report::{Report, ReportStatus, ReportSummary, ReportType, ResolutionAction};
use crate::domain::transaction::{Transaction, TransactionKind};
use crate::domain::user::{PublicUser, Role, User, UserStatus};
use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::http::response::Envelope;
use crate::http::{AppError, AuthUser};
use crate::infra::db::is_unique_violation;
use crate::AppState;

const MAX_PAGE_LIMIT: i64 = 100;
const CONTENT_PAGE_LIMIT: i64 = 20;
const TRANSACTION_PAGE_LIMIT: i64 = 10;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 100;

/// Logs an infrastructure failure and maps it to a 500.
fn internal<'a>(
    state: &'a AppState,
    message: &'static str,
) -> impl FnOnce(anyhow::Error) -> AppError + 'a {
    move |err| {
        tracing::error!(error = ?err, "{}", message);
        AppError::internal_detail(message, &err, state.expose_error_details)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// `page` is 1-based; `limit` must be in `1..=100`.
pub(crate) fn page_window(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
) -> Result<PageWindow, AppError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    Ok(PageWindow {
        limit,
        offset: (page - 1).saturating_mul(limit),
    })
}

pub(crate) fn offset_window(
    limit: Option<i64>,
    offset: Option<i64>,
    default_limit: i64,
) -> Result<PageWindow, AppError> {
    let limit = limit.unwrap_or(default_limit);
    let offset = offset.unwrap_or(0);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    if offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }
    Ok(PageWindow { limit, offset })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err(AppError::bad_request(
            "Username must be between 3 and 30 characters",
        ));
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.')
    {
        return Err(AppError::bad_request(
            "Username may only contain letters, numbers, '.', '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::bad_request("Please provide a valid email"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at most 128 characters",
        ));
    }
    Ok(())
}

fn validate_web_url(value: &str, field: &str) -> Result<(), AppError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::bad_request(format!(
            "{} must be an absolute http(s) URL",
            field
        ))),
    }
}

fn duplicate_user_error(err: &anyhow::Error) -> Option<AppError> {
    if is_unique_violation(err, "users_email_key") {
        return Some(AppError::bad_request("Email already in use"));
    }
    if is_unique_violation(err, "users_username_key") {
        return Some(AppError::bad_request("Username already taken"));
    }
    None
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: bool,
    redis: bool,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if database && redis { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database,
        redis,
    })
}

pub(crate) async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::not_found(format!("Can't find {} on this server!", uri.path()))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct UserData {
    pub user: User,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Envelope<UserData>, AppError> {
    let (Some(username), Some(email), Some(password)) = (
        non_blank(payload.username.as_deref()),
        non_blank(payload.email.as_deref()),
        payload.password.as_deref(),
    ) else {
        return Err(AppError::bad_request(
            "Please provide username, email and password",
        ));
    };
    let email = email.to_lowercase();
    validate_username(username)?;
    validate_email(&email)?;
    validate_password(password)?;

    let service = AuthService::from_state(&state);
    let user = match service.signup(username, &email, password).await {
        Ok(user) => user,
        Err(err) => {
            if let Some(duplicate) = duplicate_user_error(&err) {
                return Err(duplicate);
            }
            return Err(internal(&state, "failed to register user")(err));
        }
    };

    let issued = service
        .issue_token(user.id)
        .map_err(internal(&state, "failed to issue token"))?;

    Ok(Envelope::success(UserData { user }).with_token(issued.token))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    #[serde(alias = "identifier", alias = "username")]
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Envelope<UserData>, AppError> {
    let (Some(identifier), Some(password)) = (
        non_blank(payload.email.as_deref()),
        payload.password.as_deref().filter(|password| !password.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "Please provide email/username and password",
        ));
    };
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at most 128 characters",
        ));
    }

    let identifier = if identifier.contains('@') {
        identifier.to_lowercase()
    } else {
        identifier.to_string()
    };

    let outcome = AuthService::from_state(&state)
        .login(&identifier, password)
        .await
        .map_err(internal(&state, "failed to login"))?;

    match outcome {
        LoginOutcome::Authenticated { user, token } => {
            Ok(Envelope::success(UserData { user }).with_token(token.token))
        }
        LoginOutcome::InvalidCredentials => {
            Err(AppError::unauthorized("Incorrect email or password"))
        }
        LoginOutcome::Inactive => Err(AppError::forbidden(
            "Your account is not active. Please contact support.",
        )),
    }
}

pub async fn get_me(auth: AuthUser) -> Envelope<UserData> {
    Envelope::success(UserData { user: auth.user })
}

#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
}

pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> Result<Envelope<UserData>, AppError> {
    let (Some(current_password), Some(new_password)) = (
        payload.current_password.as_deref(),
        payload.new_password.as_deref(),
    ) else {
        return Err(AppError::bad_request(
            "Please provide current and new password",
        ));
    };
    validate_password(new_password)?;

    let outcome = AuthService::from_state(&state)
        .update_password(auth.user_id, current_password, new_password)
        .await
        .map_err(internal(&state, "failed to update password"))?;

    match outcome {
        PasswordChange::Updated(issued) => {
            Ok(Envelope::success(UserData { user: auth.user }).with_token(issued.token))
        }
        PasswordChange::WrongPassword => Err(AppError::unauthorized(
            "Your current password is incorrect",
        )),
        PasswordChange::NotFound => Err(AppError::not_found("User not found")),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(untagged)]
pub enum ProfileView {
    Full(User),
    Public(PublicUser),
}

#[derive(Serialize)]
pub struct ProfileData {
    pub user: ProfileView,
}

/// Callers see their own full record; everyone else gets the public view.
pub async fn get_user_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Envelope<ProfileData>, AppError> {
    let user = UserService::new(state.db.clone())
        .get_user(user_id)
        .await
        .map_err(internal(&state, "failed to load user"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let view = if user.id == auth.user_id || auth.role.at_least(Role::Admin) {
        ProfileView::Full(user)
    } else {
        ProfileView::Public(PublicUser::from(user))
    };

    Ok(Envelope::success(ProfileData { user: view }))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Envelope<UserData>, AppError> {
    let username = payload.username.map(|username| username.trim().to_string());
    if let Some(username) = &username {
        validate_username(username)?;
    }
    let avatar = payload.avatar.map(|avatar| avatar.trim().to_string());
    if let Some(avatar) = avatar.as_deref().filter(|avatar| !avatar.is_empty()) {
        validate_web_url(avatar, "avatar")?;
    }

    let result = UserService::new(state.db.clone())
        .update_profile(auth.user_id, username, avatar)
        .await;

    let user = match result {
        Ok(user) => user.ok_or_else(|| AppError::not_found("User not found"))?,
        Err(err) => {
            if let Some(duplicate) = duplicate_user_error(&err) {
                return Err(duplicate);
            }
            return Err(internal(&state, "failed to update profile")(err));
        }
    };

    Ok(Envelope::success(UserData { user }))
}

#[derive(Deserialize)]
pub struct OffsetQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct TransactionsData {
    pub transactions: Vec<Transaction>,
}

pub async fn list_user_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<OffsetQuery>,
) -> Result<Envelope<TransactionsData>, AppError> {
    let window = offset_window(query.limit, query.offset, CONTENT_PAGE_LIMIT)?;

    let (transactions, total) = LedgerService::new(state.db.clone())
        .list_transactions(auth.user_id, None, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list transactions"))?;

    let results = transactions.len();
    Ok(Envelope::success(TransactionsData { transactions }).with_page(results, total))
}

#[derive(Serialize)]
pub struct ContentListData {
    pub content: Vec<Content>,
}

pub async fn list_saved_content(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<OffsetQuery>,
) -> Result<Envelope<ContentListData>, AppError> {
    let window = offset_window(query.limit, query.offset, CONTENT_PAGE_LIMIT)?;

    let (content, total) = ContentService::new(state.db.clone())
        .saved_by_user(auth.user_id, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list saved content"))?;

    let results = content.len();
    Ok(Envelope::success(ContentListData { content }).with_page(results, total))
}

pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let deactivated = UserService::new(state.db.clone())
        .deactivate(auth.user_id)
        .await
        .map_err(internal(&state, "failed to delete account"))?;

    if !deactivated {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!(user_id = %auth.user_id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ContentQuery {
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub difficulty: Option<Difficulty>,
    /// Comma-separated; an item matches when it carries any of them.
    pub tags: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub(crate) fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

pub async fn list_content(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(query): ApiQuery<ContentQuery>,
) -> Result<Envelope<ContentListData>, AppError> {
    let window = page_window(query.page, query.limit, CONTENT_PAGE_LIMIT)?;

    let filter = ContentFilter {
        content_type: query.content_type,
        difficulty: query.difficulty,
        tags: query
            .tags
            .as_deref()
            .map(parse_tags)
            .filter(|tags| !tags.is_empty()),
        search: non_blank(query.search.as_deref()).map(str::to_string),
    };

    let (content, total) = ContentService::new(state.db.clone())
        .list(&filter, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list content"))?;

    let results = content.len();
    Ok(Envelope::success(ContentListData { content }).with_page(results, total))
}

#[derive(Serialize)]
pub struct ContentData {
    pub content: Content,
}

pub async fn get_content(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiPath(content_id): ApiPath<Uuid>,
) -> Result<Envelope<ContentData>, AppError> {
    let content = ContentService::new(state.db.clone())
        .get(content_id)
        .await
        .map_err(internal(&state, "failed to load content"))?
        .ok_or_else(|| AppError::not_found("Content not found"))?;

    Ok(Envelope::success(ContentData { content }))
}

#[derive(Deserialize)]
pub struct CreateContentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "contentType")]
    pub content_type: Option<ContentType>,
    pub source: Option<String>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(alias = "contentUrl")]
    pub content_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
}

impl CreateContentRequest {
    fn validate(self) -> Result<NewContent, AppError> {
        let title = non_blank(self.title.as_deref())
            .ok_or_else(|| AppError::bad_request("Content must have a title"))?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::bad_request("Title cannot exceed 100 characters"));
        }
        let description = non_blank(self.description.as_deref())
            .ok_or_else(|| AppError::bad_request("Content must have a description"))?;
        let content_type = self
            .content_type
            .ok_or_else(|| AppError::bad_request("Content must have a type"))?;
        let source = non_blank(self.source.as_deref())
            .ok_or_else(|| AppError::bad_request("Content must have a source"))?;
        let content_url = non_blank(self.content_url.as_deref())
            .ok_or_else(|| AppError::bad_request("Content must have a URL"))?;
        validate_web_url(content_url, "content_url")?;
        let image_url = non_blank(self.image_url.as_deref());
        if let Some(image_url) = image_url {
            validate_web_url(image_url, "image_url")?;
        }

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags.iter().flat_map(|tag| parse_tags(tag)) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(NewContent {
            title: title.to_string(),
            description: description.to_string(),
            content_type,
            source: source.to_string(),
            image_url: image_url.map(str::to_string),
            content_url: content_url.to_string(),
            tags,
            difficulty: self.difficulty.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
pub struct ContentCreditsData {
    pub content: Content,
    pub credits: i64,
}

pub async fn create_content(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateContentRequest>,
) -> Result<(StatusCode, Envelope<ContentCreditsData>), AppError> {
    let new_content = payload.validate()?;

    let (content, change) = ContentService::new(state.db.clone())
        .create(auth.user_id, new_content)
        .await
        .map_err(internal(&state, "failed to create content"))?;

    tracing::info!(content_id = %content.id, user_id = %auth.user_id, "content created");

    Ok((
        StatusCode::CREATED,
        Envelope::success(ContentCreditsData {
            content,
            credits: change.balance,
        }),
    ))
}

pub async fn save_content(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(content_id): ApiPath<Uuid>,
) -> Result<Envelope<ContentCreditsData>, AppError> {
    let outcome = ContentService::new(state.db.clone())
        .save(auth.user_id, content_id)
        .await
        .map_err(internal(&state, "failed to save content"))?;

    match outcome {
        SaveOutcome::Saved { content, change } => Ok(Envelope::success(ContentCreditsData {
            content,
            credits: change.balance,
        })),
        SaveOutcome::AlreadySaved => Err(AppError::bad_request("Content already saved")),
        SaveOutcome::NotFound => Err(AppError::not_found("Content not found")),
    }
}

pub async fn unsave_content(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(content_id): ApiPath<Uuid>,
) -> Result<Envelope<ContentData>, AppError> {
    let outcome = ContentService::new(state.db.clone())
        .unsave(auth.user_id, content_id)
        .await
        .map_err(internal(&state, "failed to unsave content"))?;

    match outcome {
        UnsaveOutcome::Unsaved(content) => Ok(Envelope::success(ContentData { content })),
        UnsaveOutcome::NotSaved => Err(AppError::bad_request("Content not saved")),
        UnsaveOutcome::NotFound => Err(AppError::not_found("Content not found")),
    }
}

#[derive(Deserialize)]
pub struct FlagRequest {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct FlaggedData {
    pub content: Content,
    pub report: Report,
}

pub async fn flag_content(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(content_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<FlagRequest>,
) -> Result<Envelope<FlaggedData>, AppError> {
    let reason = non_blank(payload.reason.as_deref())
        .ok_or_else(|| AppError::bad_request("Please provide a reason for flagging"))?;

    let outcome = ContentService::new(state.db.clone())
        .flag(auth.user_id, content_id, reason)
        .await
        .map_err(internal(&state, "failed to flag content"))?;

    match outcome {
        FlagOutcome::Flagged { content, report } => {
            Ok(Envelope::success(FlaggedData { content, report }))
        }
        FlagOutcome::AlreadyFlagged => Err(AppError::bad_request(
            "You have already flagged this content",
        )),
        FlagOutcome::NotFound => Err(AppError::not_found("Content not found")),
    }
}

#[derive(Serialize)]
pub struct ShareData {
    pub new_credits: i64,
}

pub async fn share_content(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(content_id): ApiPath<Uuid>,
) -> Result<Envelope<ShareData>, AppError> {
    let change = ContentService::new(state.db.clone())
        .share(auth.user_id, content_id)
        .await
        .map_err(internal(&state, "failed to share content"))?
        .ok_or_else(|| AppError::not_found("Content not found"))?;

    Ok(Envelope::success(ShareData {
        new_credits: change.balance,
    })
    .with_message("Content shared successfully"))
}

// ---------------------------------------------------------------------------
// Credits
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BalanceData {
    pub credits: i64,
}

pub async fn get_balance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Envelope<BalanceData>, AppError> {
    let credits = LedgerService::new(state.db.clone())
        .balance(auth.user_id)
        .await
        .map_err(internal(&state, "failed to load balance"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Envelope::success(BalanceData { credits }))
}

#[derive(Deserialize)]
pub struct SpendRequest {
    pub amount: Option<i64>,
    pub feature: Option<String>,
}

#[derive(Serialize)]
pub struct SpendData {
    pub remaining_credits: i64,
    pub transaction: Transaction,
}

pub async fn spend_credits(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<SpendRequest>,
) -> Result<Envelope<SpendData>, AppError> {
    let (Some(amount), Some(feature)) = (
        payload.amount.filter(|amount| *amount > 0),
        non_blank(payload.feature.as_deref()),
    ) else {
        return Err(AppError::bad_request("Please provide amount and feature"));
    };

    let outcome = LedgerService::new(state.db.clone())
        .spend(auth.user_id, amount, feature)
        .await
        .map_err(internal(&state, "failed to spend credits"))?;

    match outcome {
        SpendOutcome::Spent(change) => Ok(Envelope::success(SpendData {
            remaining_credits: change.balance,
            transaction: change.transaction,
        })),
        SpendOutcome::InsufficientCredits { .. } => {
            Err(AppError::bad_request("Insufficient credits"))
        }
        SpendOutcome::UserNotFound => Err(AppError::not_found("User not found")),
    }
}

#[derive(Serialize)]
pub struct DailyBonusData {
    pub bonus_amount: i64,
    pub new_balance: i64,
}

pub async fn claim_daily_bonus(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Envelope<DailyBonusData>, AppError> {
    let outcome = LedgerService::new(state.db.clone())
        .claim_daily_bonus(auth.user_id, OffsetDateTime::now_utc())
        .await
        .map_err(internal(&state, "failed to claim daily bonus"))?;

    match outcome {
        DailyBonusOutcome::Claimed(change) => Ok(Envelope::success(DailyBonusData {
            bonus_amount: DAILY_BONUS,
            new_balance: change.balance,
        })),
        DailyBonusOutcome::AlreadyClaimed => Err(AppError::bad_request(
            "Daily bonus already claimed today",
        )),
        DailyBonusOutcome::UserNotFound => Err(AppError::not_found("User not found")),
    }
}

#[derive(Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_credit_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<Envelope<TransactionsData>, AppError> {
    let window = page_window(query.page, query.limit, TRANSACTION_PAGE_LIMIT)?;
    // Unknown types are ignored rather than rejected.
    let kind = query.kind.as_deref().and_then(TransactionKind::from_db);

    let (transactions, total) = LedgerService::new(state.db.clone())
        .list_transactions(auth.user_id, kind, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list transactions"))?;

    let results = transactions.len();
    Ok(Envelope::success(TransactionsData { transactions }).with_page(results, total))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Envelope<DashboardStats>, AppError> {
    let stats = StatsService::new(state.db.clone())
        .dashboard()
        .await
        .map_err(internal(&state, "failed to load dashboard stats"))?;

    Ok(Envelope::success(stats))
}

#[derive(Deserialize)]
pub struct AdminUserQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct UsersData {
    pub users: Vec<User>,
}

pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AdminUserQuery>,
) -> Result<Envelope<UsersData>, AppError> {
    let window = page_window(query.page, query.limit, CONTENT_PAGE_LIMIT)?;
    let filter = UserFilter {
        role: query.role,
        status: query.status,
        search: non_blank(query.search.as_deref()).map(str::to_string),
    };

    let (users, total) = UserService::new(state.db.clone())
        .list_users(&filter, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list users"))?;

    let results = users.len();
    Ok(Envelope::success(UsersData { users }).with_page(results, total))
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: Option<String>,
}

pub async fn update_user_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> Result<Envelope<UserData>, AppError> {
    let role = payload
        .role
        .as_deref()
        .and_then(Role::from_db)
        .ok_or_else(|| AppError::bad_request("Invalid role"))?;

    let user = UserService::new(state.db.clone())
        .update_role(user_id, role)
        .await
        .map_err(internal(&state, "failed to update role"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(user_id = %user_id, admin_id = %auth.user_id, role = ?role, "role updated");
    Ok(Envelope::success(UserData { user }))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

pub async fn update_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> Result<Envelope<UserData>, AppError> {
    let status = payload
        .status
        .as_deref()
        .and_then(UserStatus::from_db)
        .ok_or_else(|| AppError::bad_request("Invalid status"))?;

    let user = UserService::new(state.db.clone())
        .update_status(user_id, status)
        .await
        .map_err(internal(&state, "failed to update status"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(user_id = %user_id, admin_id = %auth.user_id, status = ?status, "status updated");
    Ok(Envelope::success(UserData { user }))
}

#[derive(Deserialize)]
pub struct AdjustCreditsRequest {
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct AdjustmentData {
    pub user: User,
    pub adjustment: i64,
    pub new_balance: i64,
    pub transaction: Transaction,
}

pub async fn adjust_user_credits(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AdjustCreditsRequest>,
) -> Result<Envelope<AdjustmentData>, AppError> {
    let (Some(amount), Some(reason)) = (
        payload.amount.filter(|amount| *amount != 0),
        non_blank(payload.reason.as_deref()),
    ) else {
        return Err(AppError::bad_request("Please provide amount and reason"));
    };

    let users = UserService::new(state.db.clone());
    let change = users
        .adjust_credits(user_id, amount, reason)
        .await
        .map_err(internal(&state, "failed to adjust credits"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let user = users
        .get_user(user_id)
        .await
        .map_err(internal(&state, "failed to load user"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Envelope::success(AdjustmentData {
        user,
        adjustment: amount,
        new_balance: change.balance,
        transaction: change.transaction,
    }))
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    #[serde(alias = "reportType")]
    pub report_type: Option<ReportType>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ReportsData {
    pub reports: Vec<ReportSummary>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Envelope<ReportsData>, AppError> {
    let window = page_window(query.page, query.limit, CONTENT_PAGE_LIMIT)?;
    let filter = ReportFilter {
        status: query.status,
        report_type: query.report_type,
    };

    let (reports, total) = ModerationService::new(state.db.clone())
        .list_reports(&filter, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list reports"))?;

    let results = reports.len();
    Ok(Envelope::success(ReportsData { reports }).with_page(results, total))
}

#[derive(Serialize)]
pub struct ReportData {
    pub report: Report,
}

pub async fn get_report(
    State(state): State<AppState>,
    ApiPath(report_id): ApiPath<Uuid>,
) -> Result<Envelope<ReportData>, AppError> {
    let report = ModerationService::new(state.db.clone())
        .get_report(report_id)
        .await
        .map_err(internal(&state, "failed to load report"))?
        .ok_or_else(|| AppError::not_found("Report not found"))?;

    Ok(Envelope::success(ReportData { report }))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub resolution: Option<String>,
    pub action: Option<String>,
}

pub async fn resolve_report(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(report_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ResolveRequest>,
) -> Result<Envelope<ReportData>, AppError> {
    let (Some(resolution), Some(action)) = (
        non_blank(payload.resolution.as_deref()),
        non_blank(payload.action.as_deref()),
    ) else {
        return Err(AppError::bad_request("Please provide resolution and action"));
    };
    let action = ResolutionAction::parse(action)
        .ok_or_else(|| AppError::bad_request("Invalid action"))?;

    let outcome = ModerationService::new(state.db.clone())
        .resolve(report_id, auth.user_id, resolution, action)
        .await
        .map_err(internal(&state, "failed to resolve report"))?;

    match outcome {
        ResolveOutcome::Resolved(report) => Ok(Envelope::success(ReportData { report })),
        ResolveOutcome::NotFound => Err(AppError::not_found("Report not found")),
        ResolveOutcome::AlreadyProcessed => Err(AppError::bad_request("Report already processed")),
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_flagged_content(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Envelope<ContentListData>, AppError> {
    let window = page_window(query.page, query.limit, CONTENT_PAGE_LIMIT)?;

    let (content, total) = ContentService::new(state.db.clone())
        .list_by_status(ContentStatus::Flagged, window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list flagged content"))?;

    let results = content.len();
    Ok(Envelope::success(ContentListData { content }).with_page(results, total))
}

pub async fn list_most_saved(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Envelope<ContentListData>, AppError> {
    let window = page_window(query.page, query.limit, CONTENT_PAGE_LIMIT)?;

    let (content, total) = ContentService::new(state.db.clone())
        .most_saved(window.limit, window.offset)
        .await
        .map_err(internal(&state, "failed to list most saved content"))?;

    let results = content.len();
    Ok(Envelope::success(ContentListData { content }).with_page(results, total))
}
