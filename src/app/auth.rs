use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::user::{User, UserStatus};
use crate::infra::db::Db;
use crate::AppState;

const TOKEN_ISSUER: &str = "curio";
const TOKEN_TYPE: &str = "access";

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated { user: User, token: IssuedToken },
    InvalidCredentials,
    Inactive,
}

#[derive(Debug)]
pub enum PasswordChange {
    Updated(IssuedToken),
    WrongPassword,
    NotFound,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    token_key: [u8; 32],
    token_ttl_hours: u64,
    signup_credits: i64,
}

impl AuthService {
    pub fn new(db: Db, token_key: [u8; 32], token_ttl_hours: u64, signup_credits: i64) -> Self {
        Self {
            db,
            token_key,
            token_ttl_hours,
            signup_credits,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.paseto_key,
            state.token_ttl_hours,
            state.signup_credits,
        )
    }

    /// Creates an active `user` account holding the signup allowance.
    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query(&format!(
            "INSERT INTO users (username, email, password_hash, credits) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(self.signup_credits)
        .fetch_one(self.db.pool())
        .await?;

        let user = user_from_row(&row)?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// `identifier` matches either the email or the username.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome> {
        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM users WHERE email = $1 OR username = $1",
            USER_COLUMNS
        ))
        .bind(identifier)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(LoginOutcome::InvalidCredentials),
        };

        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() || !verify_password(password, &password_hash)? {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let user = user_from_row(&row)?;
        if user.status != UserStatus::Active {
            return Ok(LoginOutcome::Inactive);
        }

        let token = self.issue_token(user.id)?;
        Ok(LoginOutcome::Authenticated { user, token })
    }

    pub async fn update_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<PasswordChange> {
        let password_hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        let Some(password_hash) = password_hash else {
            return Ok(PasswordChange::NotFound);
        };
        if !verify_password(current_password, &password_hash)? {
            return Ok(PasswordChange::WrongPassword);
        }

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(new_password)?)
            .execute(self.db.pool())
            .await?;

        Ok(PasswordChange::Updated(self.issue_token(user_id)?))
    }

    /// Returns the subject of a valid, unexpired access token.
    pub fn authenticate_token(&self, token: &str) -> Result<Option<Uuid>> {
        let Some(claims) = self.decrypt_claims(token)? else {
            return Ok(None);
        };
        let claim = |name: &str| claims.get_claim(name).and_then(|value| value.as_str());
        if claim("typ") != Some(TOKEN_TYPE) {
            return Ok(None);
        }
        let subject = claim("sub").ok_or_else(|| anyhow!("token has no subject"))?;
        Ok(Some(Uuid::parse_str(subject)?))
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<IssuedToken> {
        let ttl_seconds = self
            .token_ttl_hours
            .checked_mul(60 * 60)
            .ok_or_else(|| anyhow!("token ttl of {} hours overflows", self.token_ttl_hours))?;
        let ttl = std::time::Duration::from_secs(ttl_seconds);
        let mut claims = Claims::new_expires_in(&ttl)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", TOKEN_TYPE)?;

        let key = SymmetricKey::<V4>::from(&self.token_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at = OffsetDateTime::now_utc() + Duration::seconds(i64::try_from(ttl_seconds)?);
        Ok(IssuedToken { token, expires_at })
    }

    /// `None` for malformed, forged or expired tokens.
    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.token_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let claims = UntrustedToken::<Local, V4>::try_from(token)
            .ok()
            .and_then(|untrusted| local::decrypt(&key, &untrusted, &rules, None, None).ok())
            .and_then(|trusted| trusted.payload_claims().cloned());
        Ok(claims)
    }
}

/// Argon2id with default parameters and a fresh salt, PHC-encoded.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("password hashing failed: {}", err))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let stored = PasswordHash::new(stored)
        .map_err(|err| anyhow!("stored password hash is malformed: {}", err))?;
    let matches = Argon2::default()
        .verify_password(password.as_bytes(), &stored)
        .is_ok();
    Ok(matches)
}
