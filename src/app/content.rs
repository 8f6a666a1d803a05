use std::collections::HashMap;

use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};
use uuid::Uuid;

use crate::app::ledger::{
    BalanceChange, LedgerService, CONTENT_CREATION_REWARD, CONTENT_SAVE_REWARD,
    CONTENT_SHARE_REWARD,
};
use crate::app::moderation::ModerationService;
use crate::app::users::escape_like_pattern;
use crate::domain::content::{
    Content, ContentFilter, ContentFlag, ContentStatus, ContentType, Difficulty, NewContent,
};
use crate::domain::report::Report;
use crate::domain::transaction::{LedgerEntry, TransactionReference};
use crate::infra::db::Db;

const CONTENT_SELECT: &str = "SELECT c.id, c.title, c.description, c.content_type::text AS content_type, \
            c.source, c.image_url, c.content_url, c.tags, c.difficulty::text AS difficulty, \
            c.status::text AS status, c.created_by, u.username AS created_by_username, c.created_at, \
            ARRAY(SELECT s.user_id FROM content_saves s WHERE s.content_id = c.id ORDER BY s.created_at) AS saved_by \
     FROM content c \
     LEFT JOIN users u ON u.id = c.created_by";

#[derive(Debug)]
pub enum SaveOutcome {
    Saved { content: Content, change: BalanceChange },
    AlreadySaved,
    NotFound,
}

#[derive(Debug)]
pub enum UnsaveOutcome {
    Unsaved(Content),
    NotSaved,
    NotFound,
}

#[derive(Debug)]
pub enum FlagOutcome {
    Flagged { content: Content, report: Report },
    AlreadyFlagged,
    NotFound,
}

#[derive(Clone)]
pub struct ContentService {
    db: Db,
}

impl ContentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Publishes a new item and rewards its author in the same transaction.
    pub async fn create(
        &self,
        author_id: Uuid,
        new_content: NewContent,
    ) -> Result<(Content, BalanceChange)> {
        let mut tx = self.db.pool().begin().await?;

        let content_id: Uuid = sqlx::query_scalar(
            "INSERT INTO content \
                 (title, description, content_type, source, image_url, content_url, tags, difficulty, created_by) \
             VALUES ($1, $2, $3::content_type, $4, $5, $6, $7, $8::content_difficulty, $9) \
             RETURNING id",
        )
        .bind(&new_content.title)
        .bind(&new_content.description)
        .bind(new_content.content_type.as_db())
        .bind(&new_content.source)
        .bind(&new_content.image_url)
        .bind(&new_content.content_url)
        .bind(&new_content.tags)
        .bind(new_content.difficulty.as_db())
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await?;

        let entry = LedgerEntry::credit(
            CONTENT_CREATION_REWARD,
            "Created new content",
            TransactionReference::ContentCreation,
        )
        .for_content(content_id);
        let change = LedgerService::new(self.db.clone())
            .apply_with_tx(author_id, &entry, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("author {} not found", author_id))?;

        let content = fetch_content(content_id, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("content {} vanished after insert", content_id))?;

        tx.commit().await?;
        Ok((content, change))
    }

    pub async fn get(&self, content_id: Uuid) -> Result<Option<Content>> {
        let mut conn = self.db.pool().acquire().await?;
        let row = sqlx::query(&format!("{} WHERE c.id = $1", CONTENT_SELECT))
            .bind(content_id)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = vec![content_from_row(&row)?];
        attach_flags(&mut items, &mut conn).await?;
        Ok(items.pop())
    }

    /// Active items only, newest first.
    pub async fn list(
        &self,
        filter: &ContentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Content>, i64)> {
        let content_type = filter.content_type.map(|content_type| content_type.as_db());
        let difficulty = filter.difficulty.map(|difficulty| difficulty.as_db());
        let pattern = filter
            .search
            .as_deref()
            .map(|search| format!("%{}%", escape_like_pattern(search)));

        const WHERE: &str = "WHERE c.status = 'active' \
               AND ($1::text IS NULL OR c.content_type::text = $1) \
               AND ($2::text IS NULL OR c.difficulty::text = $2) \
               AND ($3::text[] IS NULL OR c.tags && $3) \
               AND ($4::text IS NULL \
                    OR c.title ILIKE $4 ESCAPE '\\' \
                    OR c.description ILIKE $4 ESCAPE '\\' \
                    OR array_to_string(c.tags, ' ') ILIKE $4 ESCAPE '\\')";

        let mut conn = self.db.pool().acquire().await?;
        let rows = sqlx::query(&format!(
            "{} {} ORDER BY c.created_at DESC, c.id DESC LIMIT $5 OFFSET $6",
            CONTENT_SELECT, WHERE
        ))
        .bind(content_type)
        .bind(difficulty)
        .bind(&filter.tags)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM content c {}", WHERE))
            .bind(content_type)
            .bind(difficulty)
            .bind(&filter.tags)
            .bind(&pattern)
            .fetch_one(&mut *conn)
            .await?;

        let mut items = rows.iter().map(content_from_row).collect::<Result<Vec<_>>>()?;
        attach_flags(&mut items, &mut conn).await?;
        Ok((items, total))
    }

    pub async fn list_by_status(
        &self,
        status: ContentStatus,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Content>, i64)> {
        let mut conn = self.db.pool().acquire().await?;
        let rows = sqlx::query(&format!(
            "{} WHERE c.status = $1::content_status \
             ORDER BY c.created_at DESC, c.id DESC LIMIT $2 OFFSET $3",
            CONTENT_SELECT
        ))
        .bind(status.as_db())
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content WHERE status = $1::content_status")
                .bind(status.as_db())
                .fetch_one(&mut *conn)
                .await?;

        let mut items = rows.iter().map(content_from_row).collect::<Result<Vec<_>>>()?;
        attach_flags(&mut items, &mut conn).await?;
        Ok((items, total))
    }

    /// Items with at least one save, most saved first.
    pub async fn most_saved(&self, limit: i64, offset: i64) -> Result<(Vec<Content>, i64)> {
        let mut conn = self.db.pool().acquire().await?;
        let rows = sqlx::query(&format!(
            "{} \
             JOIN (SELECT content_id, COUNT(*) AS save_count FROM content_saves GROUP BY content_id) sc \
               ON sc.content_id = c.id \
             ORDER BY sc.save_count DESC, c.created_at DESC, c.id DESC \
             LIMIT $1 OFFSET $2",
            CONTENT_SELECT
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT content_id) FROM content_saves")
            .fetch_one(&mut *conn)
            .await?;

        let mut items = rows.iter().map(content_from_row).collect::<Result<Vec<_>>>()?;
        attach_flags(&mut items, &mut conn).await?;
        Ok((items, total))
    }

    /// Items saved by `user_id`, most recently saved first.
    pub async fn saved_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Content>, i64)> {
        let mut conn = self.db.pool().acquire().await?;
        let rows = sqlx::query(&format!(
            "{} \
             JOIN content_saves mine ON mine.content_id = c.id AND mine.user_id = $1 \
             ORDER BY mine.created_at DESC, c.id DESC \
             LIMIT $2 OFFSET $3",
            CONTENT_SELECT
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_saves WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        let mut items = rows.iter().map(content_from_row).collect::<Result<Vec<_>>>()?;
        attach_flags(&mut items, &mut conn).await?;
        Ok((items, total))
    }

    pub async fn save(&self, user_id: Uuid, content_id: Uuid) -> Result<SaveOutcome> {
        let mut tx = self.db.pool().begin().await?;

        if !content_exists(content_id, &mut tx).await? {
            tx.rollback().await?;
            return Ok(SaveOutcome::NotFound);
        }

        let inserted = sqlx::query(
            "INSERT INTO content_saves (content_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(content_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(SaveOutcome::AlreadySaved);
        }

        let entry = LedgerEntry::credit(
            CONTENT_SAVE_REWARD,
            "Saved content",
            TransactionReference::ContentSave,
        )
        .for_content(content_id);
        let change = LedgerService::new(self.db.clone())
            .apply_with_tx(user_id, &entry, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("user {} not found", user_id))?;

        let content = fetch_content(content_id, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("content {} vanished while saving", content_id))?;

        tx.commit().await?;
        Ok(SaveOutcome::Saved { content, change })
    }

    /// Unsaving never touches the balance.
    pub async fn unsave(&self, user_id: Uuid, content_id: Uuid) -> Result<UnsaveOutcome> {
        let mut tx = self.db.pool().begin().await?;

        if !content_exists(content_id, &mut tx).await? {
            tx.rollback().await?;
            return Ok(UnsaveOutcome::NotFound);
        }

        let deleted = sqlx::query("DELETE FROM content_saves WHERE content_id = $1 AND user_id = $2")
            .bind(content_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(UnsaveOutcome::NotSaved);
        }

        let content = fetch_content(content_id, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("content {} vanished while unsaving", content_id))?;

        tx.commit().await?;
        Ok(UnsaveOutcome::Unsaved(content))
    }

    /// Records a flag, escalates the item at the flag threshold and opens a
    /// report for moderators.
    pub async fn flag(&self, user_id: Uuid, content_id: Uuid, reason: &str) -> Result<FlagOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let status: Option<String> = sqlx::query_scalar(
            "SELECT status::text FROM content WHERE id = $1 FOR UPDATE",
        )
        .bind(content_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(status) = status else {
            tx.rollback().await?;
            return Ok(FlagOutcome::NotFound);
        };
        let status = ContentStatus::from_db(&status)
            .ok_or_else(|| anyhow!("unknown content status: {}", status))?;

        let inserted = sqlx::query(
            "INSERT INTO content_flags (content_id, user_id, reason) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(content_id)
        .bind(user_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(FlagOutcome::AlreadyFlagged);
        }

        let flag_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content_flags WHERE content_id = $1")
                .bind(content_id)
                .fetch_one(&mut *tx)
                .await?;

        let next_status = status.after_flag(flag_count as usize);
        if next_status != status {
            sqlx::query("UPDATE content SET status = $2::content_status WHERE id = $1")
                .bind(content_id)
                .bind(next_status.as_db())
                .execute(&mut *tx)
                .await?;
            tracing::info!(content_id = %content_id, flags = flag_count, "content flagged for review");
        }

        let report = ModerationService::new(self.db.clone())
            .open_report_with_tx(content_id, user_id, reason, &mut tx)
            .await?;

        let content = fetch_content(content_id, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("content {} vanished while flagging", content_id))?;

        tx.commit().await?;
        Ok(FlagOutcome::Flagged { content, report })
    }

    /// Returns `None` when the content does not exist.
    pub async fn share(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<BalanceChange>> {
        let mut tx = self.db.pool().begin().await?;

        if !content_exists(content_id, &mut tx).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let entry = LedgerEntry::credit(
            CONTENT_SHARE_REWARD,
            "Shared content",
            TransactionReference::ContentShare,
        )
        .for_content(content_id);
        let change = LedgerService::new(self.db.clone())
            .apply_with_tx(user_id, &entry, &mut tx)
            .await?
            .ok_or_else(|| anyhow!("user {} not found", user_id))?;

        tx.commit().await?;
        Ok(Some(change))
    }

    pub async fn count_by_status(&self, status: Option<ContentStatus>) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content WHERE ($1::text IS NULL OR status::text = $1)",
        )
        .bind(status.map(|status| status.as_db()))
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }
}

async fn content_exists(
    content_id: Uuid,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<bool> {
    let exists = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM content WHERE id = $1)")
        .bind(content_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(exists)
}

async fn fetch_content(
    content_id: Uuid,
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<Option<Content>> {
    let row = sqlx::query(&format!("{} WHERE c.id = $1", CONTENT_SELECT))
        .bind(content_id)
        .fetch_optional(&mut **tx)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut items = vec![content_from_row(&row)?];
    attach_flags(&mut items, &mut **tx).await?;
    Ok(items.pop())
}

async fn attach_flags(items: &mut [Content], conn: &mut sqlx::PgConnection) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
    let rows = sqlx::query(
        "SELECT content_id, user_id, reason, created_at \
         FROM content_flags \
         WHERE content_id = ANY($1) \
         ORDER BY created_at, user_id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut flags: HashMap<Uuid, Vec<ContentFlag>> = HashMap::new();
    for row in rows {
        flags
            .entry(row.get("content_id"))
            .or_default()
            .push(ContentFlag {
                user_id: row.get("user_id"),
                reason: row.get("reason"),
                created_at: row.get("created_at"),
            });
    }

    for item in items.iter_mut() {
        item.flags = flags.remove(&item.id).unwrap_or_default();
    }
    Ok(())
}

fn content_from_row(row: &PgRow) -> Result<Content> {
    let content_type: String = row.get("content_type");
    let difficulty: String = row.get("difficulty");
    let status: String = row.get("status");

    Ok(Content {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        content_type: ContentType::from_db(&content_type)
            .ok_or_else(|| anyhow!("unknown content type: {}", content_type))?,
        source: row.get("source"),
        image_url: row.get("image_url"),
        content_url: row.get("content_url"),
        tags: row.get("tags"),
        difficulty: Difficulty::from_db(&difficulty)
            .ok_or_else(|| anyhow!("unknown difficulty: {}", difficulty))?,
        status: ContentStatus::from_db(&status)
            .ok_or_else(|| anyhow!("unknown content status: {}", status))?,
        flags: Vec::new(),
        saved_by: row.get("saved_by"),
        created_by: row.get("created_by"),
        created_by_username: row.get("created_by_username"),
        created_at: row.get("created_at"),
    })
}
