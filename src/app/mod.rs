pub mod auth;
pub mod content;
pub mod ledger;
pub mod moderation;
pub mod rate_limiter;
pub mod stats;
pub mod users;
