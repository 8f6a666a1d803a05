use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of distinct flags that moves an item into the review queue.
pub const FLAG_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content_type: ContentType,
    pub source: String,
    pub image_url: Option<String>,
    pub content_url: String,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    pub status: ContentStatus,
    pub flags: Vec<ContentFlag>,
    pub saved_by: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_username: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFlag {
    pub user_id: Uuid,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields accepted when a user shares a new item.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub title: String,
    pub description: String,
    pub content_type: ContentType,
    pub source: String,
    pub image_url: Option<String>,
    pub content_url: String,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub content_type: Option<ContentType>,
    pub difficulty: Option<Difficulty>,
    pub tags: Option<Vec<String>>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Article,
    Video,
    Course,
    Resource,
    Discussion,
}

impl ContentType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "article" => Some(Self::Article),
            "video" => Some(Self::Video),
            "course" => Some(Self::Course),
            "resource" => Some(Self::Resource),
            "discussion" => Some(Self::Discussion),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Video => "video",
            Self::Course => "course",
            Self::Resource => "resource",
            Self::Discussion => "discussion",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Active,
    Flagged,
    Removed,
}

impl ContentStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "flagged" => Some(Self::Flagged),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Flagged => "flagged",
            Self::Removed => "removed",
        }
    }

    /// Status after a flag brings the item to `flag_count` flags.
    pub fn after_flag(self, flag_count: usize) -> Self {
        if flag_count >= FLAG_THRESHOLD && self == Self::Active {
            Self::Flagged
        } else {
            self
        }
    }
}
