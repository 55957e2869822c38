// file: src/database/users.rs
// Users are provisioned by the identity provider; this is only the storage side.
use crate::models::{User, UserProfile};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const USER_COLUMNS: &str = "id, external_id, email, username, first_name, last_name, image_url, created_at";

pub async fn upsert(pool: &SqlitePool, profile: &UserProfile, now: DateTime<Utc>) -> Result<User> {
    sqlx::query(
        r#"
        INSERT INTO users (id, external_id, email, username, first_name, last_name, image_url, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_id) DO UPDATE SET
            email = excluded.email,
            username = excluded.username,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            image_url = excluded.image_url
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&profile.external_id)
    .bind(&profile.email)
    .bind(&profile.username)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.image_url)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_external_id(pool, &profile.external_id)
        .await?
        .ok_or_else(|| anyhow!("User {} vanished after upsert", profile.external_id))
}

pub async fn find_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE external_id = ?",
        USER_COLUMNS
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<User>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users WHERE id IN (", USER_COLUMNS));
    let mut in_list = qb.separated(", ");
    for id in ids {
        in_list.push_bind(id.clone());
    }
    in_list.push_unseparated(")");

    let users = qb
        .build_query_as::<User>()
        .fetch_all(pool)
        .await
        .context("Failed to load users")?;
    Ok(users)
}
