use anyhow::{anyhow, Result};
use tracing::info;
use uuid::Uuid;

use crate::app::auth::hash_password;
use crate::app::content::ContentService;
use crate::app::users::UserService;
use crate::config::AppConfig;
use crate::domain::content::{ContentType, Difficulty, NewContent};
use crate::domain::user::Role;
use crate::infra::db::Db;

struct SeedUser {
    username: &'static str,
    email: &'static str,
    role: Role,
    credits: i64,
}

const SEED_USERS: [SeedUser; 3] = [
    SeedUser {
        username: "admin",
        email: "admin@example.com",
        role: Role::Admin,
        credits: 1000,
    },
    SeedUser {
        username: "moderator",
        email: "moderator@example.com",
        role: Role::Moderator,
        credits: 500,
    },
    SeedUser {
        username: "learner",
        email: "learner@example.com",
        role: Role::User,
        credits: 100,
    },
];

struct SeedContent {
    title: &'static str,
    description: &'static str,
    content_type: ContentType,
    source: &'static str,
    content_url: &'static str,
    tags: &'static [&'static str],
    difficulty: Difficulty,
}

const SEED_CONTENT: [SeedContent; 6] = [
    SeedContent {
        title: "The Rust Programming Language",
        description: "The official book: ownership, borrowing, traits and fearless concurrency.",
        content_type: ContentType::Course,
        source: "Rust Project",
        content_url: "https://doc.rust-lang.org/book/",
        tags: &["rust", "systems", "beginner-friendly"],
        difficulty: Difficulty::Beginner,
    },
    SeedContent {
        title: "Asynchronous Programming in Rust",
        description: "How futures, executors and async/await fit together.",
        content_type: ContentType::Article,
        source: "Rust Async Working Group",
        content_url: "https://rust-lang.github.io/async-book/",
        tags: &["rust", "async", "concurrency"],
        difficulty: Difficulty::Advanced,
    },
    SeedContent {
        title: "PostgreSQL Tutorial",
        description: "A hands-on tour of SQL queries, indexes and transactions in Postgres.",
        content_type: ContentType::Resource,
        source: "PostgreSQL Global Development Group",
        content_url: "https://www.postgresql.org/docs/current/tutorial.html",
        tags: &["postgres", "database", "sql"],
        difficulty: Difficulty::Intermediate,
    },
    SeedContent {
        title: "HTTP: An Overview",
        description: "Requests, responses, headers and status codes explained.",
        content_type: ContentType::Article,
        source: "MDN Web Docs",
        content_url: "https://developer.mozilla.org/en-US/docs/Web/HTTP/Overview",
        tags: &["http", "web", "backend"],
        difficulty: Difficulty::Beginner,
    },
    SeedContent {
        title: "Designing Data-Intensive Applications Talk",
        description: "Replication, partitioning and consistency trade-offs in practice.",
        content_type: ContentType::Video,
        source: "Strange Loop",
        content_url: "https://www.youtube.com/watch?v=PdtlXdse7pw",
        tags: &["distributed-systems", "database", "architecture"],
        difficulty: Difficulty::Advanced,
    },
    SeedContent {
        title: "Which web framework do you reach for?",
        description: "Share what you use for HTTP services and why.",
        content_type: ContentType::Discussion,
        source: "Community",
        content_url: "https://users.rust-lang.org/",
        tags: &["web", "rust", "community"],
        difficulty: Difficulty::Intermediate,
    },
];

/// Populates an empty database with demo accounts and a starter catalogue.
pub async fn run(db: &Db, config: &AppConfig) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        info!(users = existing, "database already populated, skipping seed");
        return Ok(());
    }

    let password_hash = hash_password(&config.seed_password)?;
    let users = UserService::new(db.clone());
    let mut admin_id = None;

    for seed in &SEED_USERS {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4::user_role) \
             RETURNING id",
        )
        .bind(seed.username)
        .bind(seed.email)
        .bind(&password_hash)
        .bind(seed.role.as_db())
        .fetch_one(db.pool())
        .await?;

        users
            .adjust_credits(user_id, seed.credits, "Starting balance")
            .await?
            .ok_or_else(|| anyhow!("seeded user {} vanished", seed.username))?;

        if seed.role == Role::Admin {
            admin_id = Some(user_id);
        }
        info!(username = seed.username, role = ?seed.role, "seeded user");
    }

    let admin_id = admin_id.ok_or_else(|| anyhow!("no admin in seed set"))?;
    let content = ContentService::new(db.clone());
    for seed in &SEED_CONTENT {
        content
            .create(
                admin_id,
                NewContent {
                    title: seed.title.to_string(),
                    description: seed.description.to_string(),
                    content_type: seed.content_type,
                    source: seed.source.to_string(),
                    image_url: None,
                    content_url: seed.content_url.to_string(),
                    tags: seed.tags.iter().map(|tag| tag.to_string()).collect(),
                    difficulty: seed.difficulty,
                },
            )
            .await?;
    }

    info!(
        users = SEED_USERS.len(),
        content = SEED_CONTENT.len(),
        "seed complete"
    );
    Ok(())
}
