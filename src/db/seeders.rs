//! Demo data for local development

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use super::models::{now_millis, FastSession, User};
use crate::auth::hash_password;

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "DemoPass123!";

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Reset the demo account: upsert the user, drop their sessions and insert a
/// 12 hour fast from two days ago and an 8 hour fast from yesterday.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<User> {
    info!("Seeding demo account...");

    let password_hash = hash_password(DEMO_PASSWORD).context("Failed to hash demo password")?;
    let user = User::upsert(pool, DEMO_EMAIL, &password_hash).await?;

    let removed = FastSession::delete_all_for_user(pool, &user.id).await?;
    if removed > 0 {
        info!("Removed {} existing demo sessions", removed);
    }

    let now = now_millis();
    let two_days_ago = now - 2 * DAY_MS;
    let yesterday = now - DAY_MS;

    FastSession::insert_completed(
        pool,
        &user.id,
        12,
        two_days_ago,
        two_days_ago + 12 * HOUR_MS,
        Some("seed 1"),
    )
    .await?;
    FastSession::insert_completed(
        pool,
        &user.id,
        8,
        yesterday,
        yesterday + 8 * HOUR_MS,
        Some("seed 2"),
    )
    .await?;

    info!(user_id = %user.id, "Seeded user {} (password: {})", DEMO_EMAIL, DEMO_PASSWORD);
    Ok(user)
}
