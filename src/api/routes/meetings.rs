//! Meeting API endpoints.
//!
//! - GET  /api/meetings             - All of the caller's meetings
//! - POST /api/meetings             - Create a meeting with a provisioned call
//! - GET  /api/meetings/upcoming    - Reconciled upcoming meetings
//! - GET  /api/meetings/previous    - Reconciled past meetings
//! - POST /api/meetings/:id/participants - Invite a user to a hosted meeting
//! - POST /api/meetings/:id/cancel  - Cancel a hosted meeting

use crate::api::auth::CurrentUser;
use crate::api::error::ApiResult;
use crate::models::{CreateMeetingRequest, InviteRequest, ListingParams, MeetingListing};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_meetings).post(create_meeting))
        .route("/upcoming", get(upcoming_meetings))
        .route("/previous", get(previous_meetings))
        .route("/:id/participants", post(invite_participant))
        .route("/:id/cancel", post(cancel_meeting))
}

async fn list_meetings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListingParams>,
) -> ApiResult<Json<MeetingListing>> {
    let listing = state.meetings.list_all(&user, &params, Utc::now()).await?;
    Ok(Json(listing))
}

async fn upcoming_meetings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListingParams>,
) -> ApiResult<Json<MeetingListing>> {
    let listing = state.meetings.list_upcoming(&user, &params, Utc::now()).await?;
    Ok(Json(listing))
}

async fn previous_meetings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListingParams>,
) -> ApiResult<Json<MeetingListing>> {
    let listing = state.meetings.list_previous(&user, &params, Utc::now()).await?;
    Ok(Json(listing))
}

async fn create_meeting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateMeetingRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let meeting = state.meetings.create_meeting(&user, request).await?;
    let view = state.meetings.view(meeting).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "meeting": view,
        })),
    ))
}

async fn invite_participant(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(meeting_id): Path<String>,
    Json(request): Json<InviteRequest>,
) -> ApiResult<Json<Value>> {
    let meeting = state.meetings.invite_participant(&user, &meeting_id, request).await?;
    Ok(Json(json!({
        "success": true,
        "meeting": state.meetings.view(meeting).await?,
    })))
}

async fn cancel_meeting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(meeting_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let meeting = state.meetings.cancel_meeting(&user, &meeting_id).await?;
    Ok(Json(json!({
        "success": true,
        "meeting": state.meetings.view(meeting).await?,
    })))
}
