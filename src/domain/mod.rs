pub mod content;
pub mod report;
pub mod transaction;
pub mod user;
