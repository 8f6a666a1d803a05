use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub credits: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Profile as seen by other users: no email, no balance.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            avatar: user.avatar,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Role tiers, ordered so that `Admin > Moderator > User`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    pub fn at_least(&self, min: Role) -> bool {
        *self >= min
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
    Banned,
}

impl UserStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "banned" => Some(Self::Banned),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Banned => "banned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Admin > Role::Moderator);
        assert!(Role::Moderator > Role::User);
        assert!(Role::Admin.at_least(Role::Moderator));
        assert!(Role::Moderator.at_least(Role::Moderator));
        assert!(!Role::User.at_least(Role::Moderator));
        assert!(!Role::Moderator.at_least(Role::Admin));
    }

    #[test]
    fn role_db_names_round_trip() {
        for role in [Role::User, Role::Moderator, Role::Admin] {
            assert_eq!(Role::from_db(role.as_db()), Some(role));
        }
        assert_eq!(Role::from_db("superuser"), None);
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert_eq!(UserStatus::from_db("banned"), Some(UserStatus::Banned));
        assert_eq!(UserStatus::from_db("deleted"), None);
    }

    #[test]
    fn public_user_hides_private_fields() {
        let user = User {
            id: Uuid::new_v4(),
            username: "john".into(),
            email: "john@example.com".into(),
            avatar: None,
            role: Role::User,
            status: UserStatus::Active,
            credits: 250,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(value.get("email").is_none());
        assert!(value.get("credits").is_none());
        assert_eq!(value["role"], "user");
    }
}
