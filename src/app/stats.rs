use anyhow::Result;
use serde::Serialize;
use sqlx::Row;

use crate::app::content::ContentService;
use crate::app::ledger::LedgerService;
use crate::app::moderation::{ModerationService, ReportFilter};
use crate::app::users::UserService;
use crate::domain::content::ContentStatus;
use crate::domain::report::{ReportStatus, ReportSummary};
use crate::domain::transaction::Transaction;
use crate::domain::user::User;
use crate::infra::db::Db;

const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Serialize)]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub moderators: i64,
    pub admins: i64,
}

#[derive(Debug, Serialize)]
pub struct ContentCounts {
    pub total: i64,
    pub active: i64,
    pub flagged: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportCounts {
    pub pending: i64,
    pub resolved: i64,
}

#[derive(Debug, Serialize)]
pub struct CreditTotals {
    pub awarded: i64,
    pub spent: i64,
}

#[derive(Debug, Serialize)]
pub struct RecentActivity {
    pub users: Vec<User>,
    pub transactions: Vec<Transaction>,
    pub reports: Vec<ReportSummary>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: UserCounts,
    pub content: ContentCounts,
    pub reports: ReportCounts,
    pub credits: CreditTotals,
    pub recent: RecentActivity,
}

#[derive(Clone)]
pub struct StatsService {
    db: Db,
}

impl StatsService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let content = ContentService::new(self.db.clone());
        let ledger = LedgerService::new(self.db.clone());
        let moderation = ModerationService::new(self.db.clone());

        let (awarded, spent) = ledger.totals().await?;
        let (recent_reports, _) = moderation
            .list_reports(&ReportFilter::default(), RECENT_LIMIT, 0)
            .await?;

        Ok(DashboardStats {
            users: self.user_counts().await?,
            content: ContentCounts {
                total: content.count_by_status(None).await?,
                active: content.count_by_status(Some(ContentStatus::Active)).await?,
                flagged: content.count_by_status(Some(ContentStatus::Flagged)).await?,
            },
            reports: ReportCounts {
                pending: moderation.count_by_status(ReportStatus::Pending).await?,
                resolved: moderation.count_by_status(ReportStatus::Resolved).await?,
            },
            credits: CreditTotals { awarded, spent },
            recent: RecentActivity {
                users: UserService::new(self.db.clone())
                    .recent_users(RECENT_LIMIT)
                    .await?,
                transactions: ledger.recent_transactions(RECENT_LIMIT).await?,
                reports: recent_reports,
            },
        })
    }

    async fn user_counts(&self) -> Result<UserCounts> {
        let row = sqlx::query(
            "SELECT \
                 COUNT(*) AS total, \
                 COUNT(*) FILTER (WHERE status = 'active') AS active, \
                 COUNT(*) FILTER (WHERE role = 'moderator') AS moderators, \
                 COUNT(*) FILTER (WHERE role = 'admin') AS admins \
             FROM users",
        )
        .fetch_one(self.db.pool())
        .await?;

        Ok(UserCounts {
            total: row.get("total"),
            active: row.get("active"),
            moderators: row.get("moderators"),
            admins: row.get("admins"),
        })
    }
}
