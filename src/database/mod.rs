// file: src/database/mod.rs

use crate::models::{Meeting, MeetingFilter, MeetingMembers, MeetingPatch, NewMeeting, User, UserProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePool, Row, Sqlite};

// Declare submodules
pub mod meetings;
pub mod users;

/// The persistence operations the reconciler and the listings depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn find_meetings(&self, filter: &MeetingFilter) -> Result<Vec<Meeting>>;

    async fn count_meetings(&self, filter: &MeetingFilter) -> Result<i64>;

    async fn update_many(
        &self,
        ids: &[String],
        patch: &MeetingPatch,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    async fn update_meeting(
        &self,
        meeting_id: &str,
        patch: &MeetingPatch,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Meeting>;
}

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn open(database_url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        let db_exists = Sqlite::database_exists(database_url)
            .await
            .context("Failed to check if database exists")?;
        if !db_exists {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, bringing its schema up to date.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        run_schema(&pool).await.context("Failed to run database schema")?;
        ensure_migrations(&pool).await.context("Failed to ensure migrations")?;

        info!("Database initialized successfully");
        Ok(Database { pool })
    }

    #[cfg(test)]
    pub(crate) async fn open_temporary() -> Result<Self> {
        let temp_file = tempfile::NamedTempFile::new()?;
        let (_, path) = temp_file.keep()?;
        Self::open(&format!("sqlite:{}", path.display())).await
    }

    // --- User Delegates ---

    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<User> {
        users::upsert(&self.pool, profile, Utc::now()).await
    }

    pub async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        users::find_by_external_id(&self.pool, external_id).await
    }

    // --- Meeting Delegates ---

    pub async fn insert_meeting(&self, meeting: &NewMeeting) -> Result<Meeting> {
        meetings::insert(&self.pool, meeting, Utc::now()).await
    }

    pub async fn get_meeting(&self, meeting_id: &str) -> Result<Option<Meeting>> {
        meetings::get(&self.pool, meeting_id).await
    }

    pub async fn cancel_meeting(&self, meeting_id: &str) -> Result<bool> {
        meetings::cancel(&self.pool, meeting_id, Utc::now()).await
    }

    pub async fn add_participant(&self, meeting_id: &str, user_id: &str) -> Result<()> {
        meetings::add_participant(&self.pool, meeting_id, user_id, Utc::now()).await
    }

    pub async fn load_members(&self, meetings: &[Meeting]) -> Result<MeetingMembers> {
        meetings::load_members(&self.pool, meetings).await
    }
}

#[async_trait]
impl MeetingStore for Database {
    async fn find_meetings(&self, filter: &MeetingFilter) -> Result<Vec<Meeting>> {
        meetings::find(&self.pool, filter).await
    }

    async fn count_meetings(&self, filter: &MeetingFilter) -> Result<i64> {
        meetings::count(&self.pool, filter).await
    }

    async fn update_many(
        &self,
        ids: &[String],
        patch: &MeetingPatch,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        meetings::update_many(&self.pool, ids, patch, now).await
    }

    async fn update_meeting(
        &self,
        meeting_id: &str,
        patch: &MeetingPatch,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Meeting> {
        meetings::update(&self.pool, meeting_id, patch, expected_version, now).await
    }
}

async fn run_schema(pool: &SqlitePool) -> Result<()> {
    let schema = include_str!("schema.sql");

    let mut current_statement = String::new();
    let mut in_trigger = false;

    for line in schema.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }

        if trimmed.to_uppercase().starts_with("CREATE TRIGGER") {
            in_trigger = true;
        }

        current_statement.push_str(line);
        current_statement.push('\n');

        if trimmed.ends_with(';') {
            if in_trigger {
                if trimmed.to_uppercase() == "END;" {
                    in_trigger = false;
                    sqlx::query(&current_statement).execute(pool).await?;
                    current_statement.clear();
                }
            } else {
                sqlx::query(&current_statement).execute(pool).await?;
                current_statement.clear();
            }
        }
    }
    Ok(())
}

/// Adds reconciliation columns to `meetings` tables created before they existed.
async fn ensure_migrations(pool: &SqlitePool) -> Result<()> {
    let rows = sqlx::query("PRAGMA table_info(meetings)")
        .fetch_all(pool)
        .await
        .context("Failed to fetch table info")?;

    let columns: Vec<String> = rows
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    let wanted = [
        ("ended_at", "ALTER TABLE meetings ADD COLUMN ended_at DATETIME"),
        ("actual_duration", "ALTER TABLE meetings ADD COLUMN actual_duration INTEGER"),
        ("recording_urls", "ALTER TABLE meetings ADD COLUMN recording_urls TEXT"),
        ("version", "ALTER TABLE meetings ADD COLUMN version INTEGER NOT NULL DEFAULT 1"),
    ];

    for (column, statement) in wanted {
        if !columns.iter().any(|c| c == column) {
            info!("Migrating: Adding {} column to meetings table", column);
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to add {} column", column))?;
        }
    }

    Ok(())
}
