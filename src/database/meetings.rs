// file: src/database/meetings.rs
use super::users;
use crate::models::{
    Meeting, MeetingFilter, MeetingMembers, MeetingPatch, MeetingRow, MeetingStatus, NewMeeting, Participant,
    User,
};
use crate::utils::logging;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::time::Instant;

const MEETING_COLUMNS: &str = "id, host_id, title, description, scheduled_for, duration, status, \
     stream_call_id, ended_at, actual_duration, recording_urls, version, created_at, updated_at";

pub async fn insert(pool: &SqlitePool, meeting: &NewMeeting, now: DateTime<Utc>) -> Result<Meeting> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO meetings (
            id, host_id, title, description, scheduled_for, duration, status,
            stream_call_id, version, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&meeting.host_id)
    .bind(&meeting.title)
    .bind(&meeting.description)
    .bind(meeting.scheduled_for)
    .bind(meeting.duration)
    .bind(MeetingStatus::Scheduled)
    .bind(&meeting.stream_call_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert meeting")?;

    get(pool, &id)
        .await?
        .ok_or_else(|| anyhow!("Meeting {} vanished after insert", id))
}

pub async fn get(pool: &SqlitePool, meeting_id: &str) -> Result<Option<Meeting>> {
    let row = sqlx::query_as::<_, MeetingRow>(&format!(
        "SELECT {} FROM meetings WHERE id = ?",
        MEETING_COLUMNS
    ))
    .bind(meeting_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Meeting::from))
}

pub async fn find(pool: &SqlitePool, filter: &MeetingFilter) -> Result<Vec<Meeting>> {
    let started = Instant::now();

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM meetings", MEETING_COLUMNS));
    push_filter(&mut qb, filter);
    qb.push(format!(
        " ORDER BY scheduled_for {order}, id {order}",
        order = filter.order.as_sql()
    ));
    if let Some(page) = filter.page {
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset());
    }

    let rows = qb
        .build_query_as::<MeetingRow>()
        .fetch_all(pool)
        .await
        .context("Failed to query meetings")?;

    logging::log_database_operation("find", "meetings", started.elapsed().as_millis() as u64);
    Ok(rows.into_iter().map(Meeting::from).collect())
}

pub async fn count(pool: &SqlitePool, filter: &MeetingFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM meetings");
    push_filter(&mut qb, filter);

    let row = qb
        .build()
        .fetch_one(pool)
        .await
        .context("Failed to count meetings")?;

    Ok(row.try_get::<i64, _>(0)?)
}

/// Applies `patch` to every listed meeting in one statement. Cancelled rows
/// are never touched. Returns the number of rows changed.
pub async fn update_many(
    pool: &SqlitePool,
    ids: &[String],
    patch: &MeetingPatch,
    now: DateTime<Utc>,
) -> Result<u64> {
    if ids.is_empty() || patch.is_empty() {
        return Ok(0);
    }

    let started = Instant::now();
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE meetings SET ");
    push_patch(&mut qb, patch, now);
    qb.push(" WHERE status != ")
        .push_bind(MeetingStatus::Cancelled)
        .push(" AND id IN (");
    let mut in_list = qb.separated(", ");
    for id in ids {
        in_list.push_bind(id.clone());
    }
    in_list.push_unseparated(")");

    let result = qb
        .build()
        .execute(pool)
        .await
        .context("Failed to bulk update meetings")?;

    logging::log_database_operation("update_many", "meetings", started.elapsed().as_millis() as u64);
    Ok(result.rows_affected())
}

/// Writes `patch` only if the row still carries `expected_version`, then
/// returns the row as stored. When another writer got there first the
/// current row is returned untouched.
pub async fn update(
    pool: &SqlitePool,
    meeting_id: &str,
    patch: &MeetingPatch,
    expected_version: i64,
    now: DateTime<Utc>,
) -> Result<Meeting> {
    if !patch.is_empty() {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE meetings SET ");
        push_patch(&mut qb, patch, now);
        qb.push(" WHERE id = ")
            .push_bind(meeting_id.to_string())
            .push(" AND version = ")
            .push_bind(expected_version);

        let result = qb
            .build()
            .execute(pool)
            .await
            .with_context(|| format!("Failed to update meeting {}", meeting_id))?;

        if result.rows_affected() == 0 {
            log::debug!(
                "[Database] meeting {} changed since version {}, keeping the stored row",
                meeting_id,
                expected_version
            );
        }
    }

    get(pool, meeting_id)
        .await?
        .ok_or_else(|| anyhow!("Meeting {} not found", meeting_id))
}

pub async fn cancel(pool: &SqlitePool, meeting_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE meetings SET status = ?, version = version + 1, updated_at = ? \
         WHERE id = ? AND status IN (?, ?)",
    )
    .bind(MeetingStatus::Cancelled)
    .bind(now)
    .bind(meeting_id)
    .bind(MeetingStatus::Scheduled)
    .bind(MeetingStatus::Ongoing)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_participant(
    pool: &SqlitePool,
    meeting_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO meeting_participants (meeting_id, user_id, added_at) VALUES (?, ?, ?)",
    )
    .bind(meeting_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Participants of the listed meetings with their user records, oldest
/// invitation first.
pub async fn participants_of(pool: &SqlitePool, meeting_ids: &[String]) -> Result<Vec<Participant>> {
    if meeting_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT p.meeting_id, p.user_id, p.added_at, u.external_id, u.email, u.username, \
         u.first_name, u.last_name, u.image_url, u.created_at \
         FROM meeting_participants p JOIN users u ON u.id = p.user_id \
         WHERE p.meeting_id IN (",
    );
    let mut in_list = qb.separated(", ");
    for id in meeting_ids {
        in_list.push_bind(id.clone());
    }
    in_list.push_unseparated(")");
    qb.push(" ORDER BY p.added_at ASC, p.user_id ASC");

    let rows = qb
        .build_query_as::<ParticipantRow>()
        .fetch_all(pool)
        .await
        .context("Failed to load meeting participants")?;

    Ok(rows.into_iter().map(Participant::from).collect())
}

/// Hosts and participants of `meetings`: one query per relation, however
/// many meetings are listed.
pub async fn load_members(pool: &SqlitePool, meetings: &[Meeting]) -> Result<MeetingMembers> {
    let mut members = MeetingMembers::default();
    if meetings.is_empty() {
        return Ok(members);
    }

    let started = Instant::now();
    let mut host_ids: Vec<String> = meetings.iter().map(|m| m.host_id.clone()).collect();
    host_ids.sort();
    host_ids.dedup();
    for host in users::find_by_ids(pool, &host_ids).await? {
        members.hosts.insert(host.id.clone(), host);
    }

    let meeting_ids: Vec<String> = meetings.iter().map(|m| m.id.clone()).collect();
    for participant in participants_of(pool, &meeting_ids).await? {
        members
            .participants
            .entry(participant.meeting_id.clone())
            .or_default()
            .push(participant);
    }

    logging::log_database_operation("load_members", "meeting_participants", started.elapsed().as_millis() as u64);
    Ok(members)
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    meeting_id: String,
    user_id: String,
    added_at: DateTime<Utc>,
    external_id: String,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            user: User {
                id: row.user_id.clone(),
                external_id: row.external_id,
                email: row.email,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
                image_url: row.image_url,
                created_at: row.created_at,
            },
            meeting_id: row.meeting_id,
            user_id: row.user_id,
            added_at: row.added_at,
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MeetingFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(member_id) = &filter.member_id {
        qb.push(" AND (host_id = ")
            .push_bind(member_id.clone())
            .push(" OR id IN (SELECT meeting_id FROM meeting_participants WHERE user_id = ")
            .push_bind(member_id.clone())
            .push("))");
    }

    if !filter.statuses.is_empty() {
        qb.push(" AND status IN (");
        let mut statuses = qb.separated(", ");
        for status in &filter.statuses {
            statuses.push_bind(*status);
        }
        statuses.push_unseparated(")");
    }

    if let Some(from) = filter.scheduled_from {
        qb.push(" AND scheduled_for >= ").push_bind(from);
    }

    if let Some(until) = filter.scheduled_until {
        qb.push(" AND scheduled_for < ").push_bind(until);
    }
}

fn push_patch(qb: &mut QueryBuilder<'_, Sqlite>, patch: &MeetingPatch, now: DateTime<Utc>) {
    let mut set = qb.separated(", ");

    if let Some(status) = patch.status {
        set.push("status = ").push_bind_unseparated(status);
    }
    if let Some(ended_at) = patch.ended_at {
        set.push("ended_at = ").push_bind_unseparated(ended_at);
    }
    if let Some(actual_duration) = patch.actual_duration {
        set.push("actual_duration = ").push_bind_unseparated(actual_duration);
    }
    if let Some(urls) = &patch.recording_urls {
        set.push("recording_urls = ").push_bind_unseparated(Json(urls.clone()));
    }

    set.push("version = version + 1");
    set.push("updated_at = ").push_bind_unseparated(now);
}
