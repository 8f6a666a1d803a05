use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::ledger::{BalanceChange, LedgerService};
use crate::domain::transaction::{LedgerEntry, TransactionReference};
use crate::domain::user::{Role, User, UserStatus};
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, avatar, role::text AS role, status::text AS status, credits, created_at";

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        username: Option<String>,
        avatar: Option<String>,
    ) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 avatar = COALESCE($3, avatar) \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(username)
        .bind(avatar)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Soft delete: the account is suspended, its ledger and content stay.
    pub async fn deactivate(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET status = 'suspended' WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64)> {
        let pattern = filter
            .search
            .as_deref()
            .map(|search| format!("%{}%", escape_like_pattern(search)));
        let role = filter.role.map(|role| role.as_db());
        let status = filter.status.map(|status| status.as_db());

        let rows = sqlx::query(&format!(
            "SELECT {} FROM users \
             WHERE ($1::text IS NULL OR role::text = $1) \
               AND ($2::text IS NULL OR status::text = $2) \
               AND ($3::text IS NULL OR username ILIKE $3 ESCAPE '\\' OR email ILIKE $3 ESCAPE '\\') \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4 OFFSET $5",
            USER_COLUMNS
        ))
        .bind(role)
        .bind(status)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE ($1::text IS NULL OR role::text = $1) \
               AND ($2::text IS NULL OR status::text = $2) \
               AND ($3::text IS NULL OR username ILIKE $3 ESCAPE '\\' OR email ILIKE $3 ESCAPE '\\')",
        )
        .bind(role)
        .bind(status)
        .bind(&pattern)
        .fetch_one(self.db.pool())
        .await?;

        let users = rows.iter().map(user_from_row).collect::<Result<Vec<_>>>()?;
        Ok((users, total))
    }

    pub async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role = $2::user_role WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn update_status(&self, user_id: Uuid, status: UserStatus) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET status = $2::user_status WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(status.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Admin credit adjustment. Positive amounts credit, negative amounts debit
    /// with the balance clamped at zero; the ledger always records `|amount|`.
    pub async fn adjust_credits(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> Result<Option<BalanceChange>> {
        let entry = if amount >= 0 {
            LedgerEntry::credit(amount, reason, TransactionReference::AdminAdjustment)
        } else {
            LedgerEntry::debit(
                amount.saturating_abs(),
                reason,
                TransactionReference::AdminAdjustment,
            )
        };

        let change = LedgerService::new(self.db.clone())
            .apply(user_id, &entry)
            .await?;

        if let Some(change) = &change {
            tracing::info!(
                user_id = %user_id,
                amount = amount,
                balance = change.balance,
                "credits adjusted"
            );
        }

        Ok(change)
    }

    pub async fn recent_users(&self, limit: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT $1",
            USER_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }
}

pub(crate) fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    let status: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        avatar: row.get("avatar"),
        role: Role::from_db(&role).ok_or_else(|| anyhow!("unknown user role: {}", role))?,
        status: UserStatus::from_db(&status)
            .ok_or_else(|| anyhow!("unknown user status: {}", status))?,
        credits: row.get("credits"),
        created_at: row.get("created_at"),
    })
}

pub(crate) fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like_pattern;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like_pattern("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like_pattern("rust"), "rust");
    }
}
