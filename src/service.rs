// Meeting listings, creation, invitations and cancellation for an
// authenticated member.

use crate::calls::CallProvider;
use crate::database::{Database, MeetingStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    CallSpec, CreateMeetingRequest, InviteRequest, ListingParams, Meeting, MeetingFilter, MeetingListing,
    MeetingStatus, MeetingView, NewMeeting, Pagination, SortOrder, SyncMeta, User, MAX_DURATION_MINUTES,
};
use crate::reconcile::Reconciler;
use crate::utils::logging;
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Upcoming,
    Previous,
    All,
}

impl ListingKind {
    pub fn name(&self) -> &'static str {
        match self {
            ListingKind::Upcoming => "upcoming",
            ListingKind::Previous => "previous",
            ListingKind::All => "all",
        }
    }

    fn filter(&self, member_id: &str, now: DateTime<Utc>) -> MeetingFilter {
        let filter = MeetingFilter::for_member(member_id);
        match self {
            ListingKind::Upcoming => filter
                .with_statuses(&[MeetingStatus::Scheduled, MeetingStatus::Ongoing])
                .scheduled_from(now)
                .ordered(SortOrder::Ascending),
            ListingKind::Previous => filter
                .with_statuses(&[MeetingStatus::Completed, MeetingStatus::Cancelled])
                .ordered(SortOrder::Descending),
            ListingKind::All => filter.ordered(SortOrder::Descending),
        }
    }

    /// Upcoming always paginates; the others only when asked to.
    fn paginates(&self, params: &ListingParams) -> bool {
        matches!(self, ListingKind::Upcoming) || params.is_paginated()
    }

    fn reconciles(&self) -> bool {
        !matches!(self, ListingKind::All)
    }

    fn keeps(&self, meeting: &Meeting) -> bool {
        match self {
            ListingKind::Upcoming => meeting.status.is_active(),
            ListingKind::Previous | ListingKind::All => true,
        }
    }
}

pub struct MeetingService {
    db: Arc<Database>,
    reconciler: Reconciler,
    provider: Option<Arc<dyn CallProvider>>,
}

impl MeetingService {
    pub fn new(
        db: Arc<Database>,
        provider: Option<Arc<dyn CallProvider>>,
        provider_timeout: std::time::Duration,
    ) -> Self {
        let store: Arc<dyn MeetingStore> = db.clone();
        Self {
            reconciler: Reconciler::new(store, provider.clone(), provider_timeout),
            db,
            provider,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn has_provider(&self) -> bool {
        self.reconciler.has_provider()
    }

    pub async fn list_upcoming(
        &self,
        member: &User,
        params: &ListingParams,
        now: DateTime<Utc>,
    ) -> AppResult<MeetingListing> {
        self.list(ListingKind::Upcoming, member, params, now).await
    }

    pub async fn list_previous(
        &self,
        member: &User,
        params: &ListingParams,
        now: DateTime<Utc>,
    ) -> AppResult<MeetingListing> {
        self.list(ListingKind::Previous, member, params, now).await
    }

    pub async fn list_all(
        &self,
        member: &User,
        params: &ListingParams,
        now: DateTime<Utc>,
    ) -> AppResult<MeetingListing> {
        self.list(ListingKind::All, member, params, now).await
    }

    pub async fn list(
        &self,
        kind: ListingKind,
        member: &User,
        params: &ListingParams,
        now: DateTime<Utc>,
    ) -> AppResult<MeetingListing> {
        let auto_completed = if kind.reconciles() {
            self.reconciler.auto_complete_expired(&member.id, now).await?
        } else {
            0
        };

        let filter = kind.filter(&member.id, now);
        let pagination = if kind.paginates(params) {
            let page = params.page_request();
            let total = self.db.count_meetings(&filter).await?;
            Some(Pagination::new(page, total))
        } else {
            None
        };

        let candidates = self
            .db
            .find_meetings(&filter.paged(pagination.as_ref().map(|_| params.page_request())))
            .await?;

        if !kind.reconciles() {
            return Ok(MeetingListing {
                success: true,
                meetings: self.with_members(candidates).await?,
                pagination,
                meta: None,
            });
        }

        let started = Instant::now();
        let outcome = self.reconciler.reconcile_all(candidates, now).await;
        logging::log_reconcile_batch(
            kind.name(),
            outcome.total(),
            outcome.updated,
            outcome.failed,
            started.elapsed().as_millis() as u64,
        );

        let meta = SyncMeta::from_outcome(&outcome, outcome.total(), auto_completed);
        let kept: Vec<Meeting> = outcome.meetings.into_iter().filter(|m| kind.keeps(m)).collect();

        Ok(MeetingListing {
            success: true,
            meetings: self.with_members(kept).await?,
            pagination,
            meta: Some(meta),
        })
    }

    /// Attaches hosts and participants to `meetings`, keeping their order.
    pub async fn with_members(&self, meetings: Vec<Meeting>) -> AppResult<Vec<MeetingView>> {
        let members = self.db.load_members(&meetings).await?;
        Ok(meetings.into_iter().map(|m| members.view(m)).collect())
    }

    pub async fn view(&self, meeting: Meeting) -> AppResult<MeetingView> {
        let members = self.db.load_members(std::slice::from_ref(&meeting)).await?;
        Ok(members.view(meeting))
    }

    /// Provisions a call with the provider, then stores the meeting as
    /// SCHEDULED with that call attached.
    pub async fn create_meeting(&self, host: &User, request: CreateMeetingRequest) -> AppResult<Meeting> {
        let title = request.title.as_deref().map(str::trim).unwrap_or_default();
        let (scheduled_for, duration) = match (request.scheduled_for.as_deref(), request.duration) {
            (Some(scheduled_for), Some(duration)) if !title.is_empty() && duration > 0 => {
                (scheduled_for, duration)
            }
            _ => return Err(AppError::invalid_input("Missing required fields")),
        };
        if duration > MAX_DURATION_MINUTES {
            return Err(AppError::invalid_input(format!(
                "Duration must be at most {} minutes",
                MAX_DURATION_MINUTES
            )));
        }

        let scheduled_for = DateTime::parse_from_rfc3339(scheduled_for.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| AppError::invalid_input("Invalid date format"))?;

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| AppError::config("Stream credentials missing"))?;

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let call_id = format!("meeting-{}", uuid::Uuid::new_v4());
        let spec = CallSpec {
            created_by_id: host.external_id.clone(),
            starts_at: scheduled_for,
            title: title.to_string(),
            description: description.clone(),
            duration,
            host_id: host.id.clone(),
            host_name: host.display_name(),
        };
        provider.create_call(&call_id, &spec).await?;

        let meeting = self
            .db
            .insert_meeting(&NewMeeting {
                host_id: host.id.clone(),
                title: title.to_string(),
                description,
                scheduled_for,
                duration,
                stream_call_id: Some(call_id),
            })
            .await?;

        info!("Meeting {} created by {}", meeting.id, host.id);
        Ok(meeting)
    }

    /// Adds a registered user to a meeting hosted by `host`. Inviting someone
    /// already on the list changes nothing.
    pub async fn invite_participant(
        &self,
        host: &User,
        meeting_id: &str,
        request: InviteRequest,
    ) -> AppResult<Meeting> {
        let invitee_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::invalid_input("Missing required fields"))?;

        let meeting = self.hosted_meeting(host, meeting_id).await?;
        if !meeting.status.is_active() {
            return Err(AppError::invalid_input(format!(
                "Meeting is {} and can no longer take participants",
                meeting.status
            )));
        }

        let invitee = self
            .db
            .find_user_by_external_id(invitee_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if invitee.id == host.id {
            return Err(AppError::invalid_input("The host is already a member"));
        }

        self.db.add_participant(&meeting.id, &invitee.id).await?;
        info!("User {} invited to meeting {} by {}", invitee.id, meeting.id, host.id);
        Ok(meeting)
    }

    /// Cancels a meeting hosted by `host`. Meetings the caller does not host
    /// are reported as missing.
    pub async fn cancel_meeting(&self, host: &User, meeting_id: &str) -> AppResult<Meeting> {
        let meeting = self.hosted_meeting(host, meeting_id).await?;

        if !meeting.status.is_active() || !self.db.cancel_meeting(&meeting.id).await? {
            return Err(AppError::invalid_input(format!(
                "Meeting is {} and can no longer be cancelled",
                meeting.status
            )));
        }

        info!("Meeting {} cancelled by {}", meeting.id, host.id);
        self.hosted_meeting(host, &meeting.id).await
    }

    async fn hosted_meeting(&self, host: &User, meeting_id: &str) -> AppResult<Meeting> {
        self.db
            .get_meeting(meeting_id)
            .await?
            .filter(|m| m.host_id == host.id)
            .ok_or_else(|| AppError::not_found("Meeting not found"))
    }
}
