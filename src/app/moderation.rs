use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};
use uuid::Uuid;

use crate::domain::content::ContentStatus;
use crate::domain::report::{
    Report, ReportStatus, ReportSummary, ReportType, ResolutionAction,
};
use crate::infra::db::Db;

const REPORT_COLUMNS: &str = "id, content_id, user_id, report_type::text AS report_type, description, \
     status::text AS status, resolved_by, resolution, resolved_at, created_at";

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub report_type: Option<ReportType>,
}

#[derive(Debug)]
pub enum ResolveOutcome {
    Resolved(Report),
    NotFound,
    AlreadyProcessed,
}

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
}

impl ModerationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Opens a pending report for a flag, typed from the flag reason.
    pub async fn open_report_with_tx(
        &self,
        content_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
        tx: &mut sqlx::Transaction<'_, Postgres>,
    ) -> Result<Report> {
        let row = sqlx::query(&format!(
            "INSERT INTO reports (content_id, user_id, report_type, description) \
             VALUES ($1, $2, $3::report_type, $4) \
             RETURNING {}",
            REPORT_COLUMNS
        ))
        .bind(content_id)
        .bind(reporter_id)
        .bind(ReportType::classify(reason).as_db())
        .bind(reason)
        .fetch_one(&mut **tx)
        .await?;

        report_from_row(&row)
    }

    pub async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM reports WHERE id = $1",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(report_from_row).transpose()
    }

    pub async fn list_reports(
        &self,
        filter: &ReportFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ReportSummary>, i64)> {
        let status = filter.status.map(|status| status.as_db());
        let report_type = filter.report_type.map(|report_type| report_type.as_db());

        let rows = sqlx::query(
            "SELECT r.id, r.content_id, r.user_id, r.report_type::text AS report_type, r.description, \
                    r.status::text AS status, r.resolved_by, r.resolution, r.resolved_at, r.created_at, \
                    reporter.username AS reporter_username, \
                    c.title AS content_title, c.status::text AS content_status, \
                    resolver.username AS resolver_username \
             FROM reports r \
             LEFT JOIN users reporter ON reporter.id = r.user_id \
             LEFT JOIN users resolver ON resolver.id = r.resolved_by \
             LEFT JOIN content c ON c.id = r.content_id \
             WHERE ($1::text IS NULL OR r.status::text = $1) \
               AND ($2::text IS NULL OR r.report_type::text = $2) \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $3 OFFSET $4",
        )
        .bind(status)
        .bind(report_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports \
             WHERE ($1::text IS NULL OR status::text = $1) \
               AND ($2::text IS NULL OR report_type::text = $2)",
        )
        .bind(status)
        .bind(report_type)
        .fetch_one(self.db.pool())
        .await?;

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            let content_status: Option<String> = row.get("content_status");
            reports.push(ReportSummary {
                report: report_from_row(&row)?,
                reporter_username: row.get("reporter_username"),
                content_title: row.get("content_title"),
                content_status: content_status.as_deref().and_then(ContentStatus::from_db),
                resolver_username: row.get("resolver_username"),
            });
        }

        Ok((reports, total))
    }

    /// Closes a pending report. The report update and any content status
    /// change commit together; a closed report is never reopened.
    pub async fn resolve(
        &self,
        report_id: Uuid,
        resolver_id: Uuid,
        resolution: &str,
        action: ResolutionAction,
    ) -> Result<ResolveOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let status: Option<String> = sqlx::query_scalar(
            "SELECT status::text FROM reports WHERE id = $1 FOR UPDATE",
        )
        .bind(report_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(status) = status else {
            tx.rollback().await?;
            return Ok(ResolveOutcome::NotFound);
        };
        if ReportStatus::from_db(&status) != Some(ReportStatus::Pending) {
            tx.rollback().await?;
            return Ok(ResolveOutcome::AlreadyProcessed);
        }

        let row = sqlx::query(&format!(
            "UPDATE reports \
             SET status = $2::report_status, \
                 resolution = $3, \
                 resolved_by = $4, \
                 resolved_at = now() \
             WHERE id = $1 \
             RETURNING {}",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .bind(action.report_status().as_db())
        .bind(resolution)
        .bind(resolver_id)
        .fetch_one(&mut *tx)
        .await?;
        let report = report_from_row(&row)?;

        if let (Some(content_id), Some(content_status)) =
            (report.content_id, action.content_status())
        {
            sqlx::query("UPDATE content SET status = $2::content_status WHERE id = $1")
                .bind(content_id)
                .bind(content_status.as_db())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            report_id = %report_id,
            resolver_id = %resolver_id,
            action = ?action,
            "report resolved"
        );

        Ok(ResolveOutcome::Resolved(report))
    }

    pub async fn count_by_status(&self, status: ReportStatus) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE status = $1::report_status")
            .bind(status.as_db())
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

fn report_from_row(row: &PgRow) -> Result<Report> {
    let report_type: String = row.get("report_type");
    let status: String = row.get("status");

    Ok(Report {
        id: row.get("id"),
        content_id: row.get("content_id"),
        user_id: row.get("user_id"),
        report_type: ReportType::from_db(&report_type)
            .ok_or_else(|| anyhow!("unknown report type: {}", report_type))?,
        description: row.get("description"),
        status: ReportStatus::from_db(&status)
            .ok_or_else(|| anyhow!("unknown report status: {}", status))?,
        resolved_by: row.get("resolved_by"),
        resolution: row.get("resolution"),
        resolved_at: row.get("resolved_at"),
        created_at: row.get("created_at"),
    })
}
