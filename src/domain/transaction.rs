use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An append-only ledger row. `amount` is the magnitude; `kind` carries the sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub description: String,
    pub reference: TransactionReference,
    pub content_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    pub fn signed_amount(&self) -> i64 {
        self.kind.apply_sign(self.amount)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(Self::Credit),
            "debit" => Some(Self::Debit),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    pub fn for_delta(delta: i64) -> Self {
        if delta >= 0 {
            Self::Credit
        } else {
            Self::Debit
        }
    }

    pub fn apply_sign(&self, magnitude: i64) -> i64 {
        match self {
            Self::Credit => magnitude,
            Self::Debit => -magnitude,
        }
    }
}

/// Closed set of reasons a balance may change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReference {
    ContentSave,
    ContentShare,
    DailyLogin,
    AdminAdjustment,
    PremiumFeature,
    ContentCreation,
}

impl TransactionReference {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "content_save" => Some(Self::ContentSave),
            "content_share" => Some(Self::ContentShare),
            "daily_login" => Some(Self::DailyLogin),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            "premium_feature" => Some(Self::PremiumFeature),
            "content_creation" => Some(Self::ContentCreation),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::ContentSave => "content_save",
            Self::ContentShare => "content_share",
            Self::DailyLogin => "daily_login",
            Self::AdminAdjustment => "admin_adjustment",
            Self::PremiumFeature => "premium_feature",
            Self::ContentCreation => "content_creation",
        }
    }
}

/// A pending balance change: the signed delta plus what the ledger row records.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub delta: i64,
    pub description: String,
    pub reference: TransactionReference,
    pub content_id: Option<Uuid>,
    /// Row timestamp; the database clock when unset.
    pub recorded_at: Option<OffsetDateTime>,
}

impl LedgerEntry {
    pub fn credit(
        amount: i64,
        description: impl Into<String>,
        reference: TransactionReference,
    ) -> Self {
        Self {
            delta: amount,
            description: description.into(),
            reference,
            content_id: None,
            recorded_at: None,
        }
    }

    pub fn debit(
        amount: i64,
        description: impl Into<String>,
        reference: TransactionReference,
    ) -> Self {
        Self {
            delta: -amount,
            description: description.into(),
            reference,
            content_id: None,
            recorded_at: None,
        }
    }

    pub fn for_content(mut self, content_id: Uuid) -> Self {
        self.content_id = Some(content_id);
        self
    }

    pub fn recorded_at(mut self, at: OffsetDateTime) -> Self {
        self.recorded_at = Some(at);
        self
    }

    pub fn kind(&self) -> TransactionKind {
        TransactionKind::for_delta(self.delta)
    }

    pub fn magnitude(&self) -> i64 {
        self.delta.saturating_abs()
    }

    /// Balance after applying this entry, clamped at zero.
    pub fn apply_to(&self, balance: i64) -> i64 {
        balance.saturating_add(self.delta).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_overflow_clamps_to_zero() {
        let entry = LedgerEntry::debit(1000, "cleanup", TransactionReference::AdminAdjustment);
        assert_eq!(entry.apply_to(50), 0);
        assert_eq!(entry.magnitude(), 1000);
        assert_eq!(entry.kind(), TransactionKind::Debit);
    }

    #[test]
    fn credit_adds_to_balance() {
        let entry = LedgerEntry::credit(5, "Saved content", TransactionReference::ContentSave);
        assert_eq!(entry.apply_to(0), 5);
        assert_eq!(entry.kind(), TransactionKind::Credit);
    }

    #[test]
    fn signed_amount_follows_kind() {
        assert_eq!(TransactionKind::Debit.apply_sign(10), -10);
        assert_eq!(TransactionKind::Credit.apply_sign(10), 10);
    }

    #[test]
    fn transaction_serializes_kind_as_type() {
        let tx = Transaction {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            amount: 25,
            kind: TransactionKind::Credit,
            description: "Daily login bonus".into(),
            reference: TransactionReference::DailyLogin,
            content_id: None,
            content_title: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "credit");
        assert_eq!(value["reference"], "daily_login");
        assert_eq!(tx.signed_amount(), 25);
    }
}
