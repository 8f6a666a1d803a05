//! Credit ledger.
//!
//! Every balance change goes through [`LedgerService::apply_with_tx`], which
//! locks the user row, writes the clamped balance and appends exactly one
//! transaction row inside the caller's database transaction.

use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};
use time::{Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::domain::transaction::{
    LedgerEntry, Transaction, TransactionKind, TransactionReference,
};
use crate::infra::db::Db;

pub const CONTENT_CREATION_REWARD: i64 = 20;
pub const CONTENT_SAVE_REWARD: i64 = 5;
pub const CONTENT_SHARE_REWARD: i64 = 10;
pub const DAILY_BONUS: i64 = 25;

const TRANSACTION_COLUMNS: &str = "t.id, t.user_id, t.amount, t.type::text AS type, t.description, \
     t.reference::text AS reference, t.content_id, c.title AS content_title, t.created_at";

/// Result of a ledger write: the new balance and the row that recorded it.
#[derive(Debug, Clone)]
pub struct BalanceChange {
    pub balance: i64,
    pub transaction: Transaction,
}

#[derive(Debug)]
pub enum SpendOutcome {
    Spent(BalanceChange),
    InsufficientCredits { balance: i64 },
    UserNotFound,
}

#[derive(Debug)]
pub enum DailyBonusOutcome {
    Claimed(BalanceChange),
    AlreadyClaimed,
    UserNotFound,
}

#[derive(Clone)]
pub struct LedgerService {
    db: Db,
}

impl LedgerService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(balance)
    }

    /// Apply a single entry in its own database transaction.
    pub async fn apply(&self, user_id: Uuid, entry: &LedgerEntry) -> Result<Option<BalanceChange>> {
        let mut tx = self.db.pool().begin().await?;
        let change = self.apply_with_tx(user_id, entry, &mut tx).await?;
        match change {
            Some(change) => {
                tx.commit().await?;
                Ok(Some(change))
            }
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    /// Returns `None` when the user does not exist; nothing is written then.
    pub async fn apply_with_tx(
        &self,
        user_id: Uuid,
        entry: &LedgerEntry,
        tx: &mut sqlx::Transaction<'_, Postgres>,
    ) -> Result<Option<BalanceChange>> {
        if entry.delta == 0 {
            return Err(anyhow!("ledger entry must change the balance"));
        }

        let Some(current) = lock_balance(user_id, tx).await? else {
            return Ok(None);
        };

        let balance = entry.apply_to(current);
        sqlx::query("UPDATE users SET credits = $2 WHERE id = $1")
            .bind(user_id)
            .bind(balance)
            .execute(&mut **tx)
            .await?;

        let row = sqlx::query(
            "INSERT INTO transactions \
                 (user_id, amount, type, description, reference, content_id, created_at) \
             VALUES ($1, $2, $3::transaction_type, $4, $5::transaction_reference, $6, \
                     COALESCE($7, now())) \
             RETURNING id, user_id, amount, type::text AS type, description, \
                       reference::text AS reference, content_id, NULL::text AS content_title, created_at",
        )
        .bind(user_id)
        .bind(entry.magnitude())
        .bind(entry.kind().as_db())
        .bind(&entry.description)
        .bind(entry.reference.as_db())
        .bind(entry.content_id)
        .bind(entry.recorded_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Some(BalanceChange {
            balance,
            transaction: transaction_from_row(&row)?,
        }))
    }

    pub async fn spend(&self, user_id: Uuid, amount: i64, feature: &str) -> Result<SpendOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let Some(balance) = lock_balance(user_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(SpendOutcome::UserNotFound);
        };

        if balance < amount {
            tx.rollback().await?;
            return Ok(SpendOutcome::InsufficientCredits { balance });
        }

        let entry = LedgerEntry::debit(
            amount,
            format!("Used credits for {}", feature),
            TransactionReference::PremiumFeature,
        );
        let change = self
            .apply_with_tx(user_id, &entry, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("user disappeared while spending credits"))?;

        tx.commit().await?;
        Ok(SpendOutcome::Spent(change))
    }

    /// Grants the daily bonus unless a `daily_login` entry already exists in
    /// the UTC day containing `now`. The granted entry is stamped with `now`
    /// so later checks see it in the same window.
    pub async fn claim_daily_bonus(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<DailyBonusOutcome> {
        let mut tx = self.db.pool().begin().await?;

        if lock_balance(user_id, &mut tx).await?.is_none() {
            tx.rollback().await?;
            return Ok(DailyBonusOutcome::UserNotFound);
        }

        let (day_start, day_end) = utc_day_window(now);
        let already_claimed: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM transactions \
                 WHERE user_id = $1 \
                   AND reference = 'daily_login' \
                   AND created_at >= $2 AND created_at < $3 \
             )",
        )
        .bind(user_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&mut *tx)
        .await?;

        if already_claimed {
            tx.rollback().await?;
            return Ok(DailyBonusOutcome::AlreadyClaimed);
        }

        let entry = LedgerEntry::credit(
            DAILY_BONUS,
            "Daily login bonus",
            TransactionReference::DailyLogin,
        )
        .recorded_at(now);
        let change = self
            .apply_with_tx(user_id, &entry, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("user disappeared while claiming bonus"))?;

        tx.commit().await?;
        Ok(DailyBonusOutcome::Claimed(change))
    }

    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        kind: Option<TransactionKind>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64)> {
        let kind = kind.map(|kind| kind.as_db());

        let rows = sqlx::query(&format!(
            "SELECT {} \
             FROM transactions t \
             LEFT JOIN content c ON c.id = t.content_id \
             WHERE t.user_id = $1 AND ($2::text IS NULL OR t.type::text = $2) \
             ORDER BY t.created_at DESC, t.id DESC \
             LIMIT $3 OFFSET $4",
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(kind)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions \
             WHERE user_id = $1 AND ($2::text IS NULL OR type::text = $2)",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_one(self.db.pool())
        .await?;

        let transactions = rows
            .iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((transactions, total))
    }

    pub async fn recent_transactions(&self, limit: i64) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} \
             FROM transactions t \
             LEFT JOIN content c ON c.id = t.content_id \
             ORDER BY t.created_at DESC, t.id DESC \
             LIMIT $1",
            TRANSACTION_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    /// Total credits awarded and spent across all users.
    pub async fn totals(&self) -> Result<(i64, i64)> {
        let row = sqlx::query(
            "SELECT \
                 COALESCE(SUM(amount) FILTER (WHERE type = 'credit'), 0)::bigint AS awarded, \
                 COALESCE(SUM(amount) FILTER (WHERE type = 'debit'), 0)::bigint AS spent \
             FROM transactions",
        )
        .fetch_one(self.db.pool())
        .await?;

        Ok((row.get("awarded"), row.get("spent")))
    }
}

async fn lock_balance(
    user_id: Uuid,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<Option<i64>> {
    let balance = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(balance)
}

/// Start (inclusive) and end (exclusive) of the UTC calendar day containing `now`.
pub fn utc_day_window(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let start = now.to_offset(UtcOffset::UTC).date().midnight().assume_utc();
    (start, start + Duration::days(1))
}

pub(crate) fn transaction_from_row(row: &PgRow) -> Result<Transaction> {
    let kind: String = row.get("type");
    let reference: String = row.get("reference");

    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        kind: TransactionKind::from_db(&kind)
            .ok_or_else(|| anyhow!("unknown transaction type: {}", kind))?,
        description: row.get("description"),
        reference: TransactionReference::from_db(&reference)
            .ok_or_else(|| anyhow!("unknown transaction reference: {}", reference))?,
        content_id: row.get("content_id"),
        content_title: row.get("content_title"),
        created_at: row.get("created_at"),
    })
}
