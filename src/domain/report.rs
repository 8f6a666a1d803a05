use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::content::ContentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub content_id: Option<Uuid>,
    pub user_id: Uuid,
    pub report_type: ReportType,
    pub description: String,
    pub status: ReportStatus,
    pub resolved_by: Option<Uuid>,
    pub resolution: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Report joined with the names a moderator needs to triage it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    #[serde(flatten)]
    pub report: Report,
    pub reporter_username: Option<String>,
    pub content_title: Option<String>,
    pub content_status: Option<ContentStatus>,
    pub resolver_username: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Inappropriate,
    Spam,
    Copyright,
    Misinformation,
    Other,
}

impl ReportType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "inappropriate" => Some(Self::Inappropriate),
            "spam" => Some(Self::Spam),
            "copyright" => Some(Self::Copyright),
            "misinformation" => Some(Self::Misinformation),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Inappropriate => "inappropriate",
            Self::Spam => "spam",
            Self::Copyright => "copyright",
            Self::Misinformation => "misinformation",
            Self::Other => "other",
        }
    }

    /// Keyword classification of a flag reason. The first keyword found wins,
    /// checked in the order spam, copyright, inappropriate.
    pub fn classify(reason: &str) -> Self {
        const KEYWORDS: [(&str, ReportType); 3] = [
            ("spam", ReportType::Spam),
            ("copyright", ReportType::Copyright),
            ("inappropriate", ReportType::Inappropriate),
        ];

        let reason = reason.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(keyword, _)| reason.contains(keyword))
            .map(|(_, report_type)| *report_type)
            .unwrap_or(ReportType::Other)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

/// What a moderator does with the reported content when closing a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    Remove,
    Restore,
    Dismiss,
    Reject,
}

impl ResolutionAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "remove" => Some(Self::Remove),
            "restore" => Some(Self::Restore),
            "dismiss" => Some(Self::Dismiss),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn report_status(&self) -> ReportStatus {
        match self {
            Self::Reject => ReportStatus::Rejected,
            _ => ReportStatus::Resolved,
        }
    }

    pub fn content_status(&self) -> Option<ContentStatus> {
        match self {
            Self::Remove => Some(ContentStatus::Removed),
            Self::Restore => Some(ContentStatus::Active),
            Self::Dismiss | Self::Reject => None,
        }
    }
}
