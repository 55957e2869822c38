// Meeting status reconciliation
// Brings stored meetings in line with the call provider's view of the
// session, falling back to the schedule when the provider can't be asked.

use crate::calls::CallProvider;
use crate::database::MeetingStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    BatchOutcome, CallState, Meeting, MeetingFilter, MeetingPatch, MeetingStatus, Recording,
};
use crate::utils::logging;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Status implied by the schedule alone.
pub fn infer_status(meeting: &Meeting, now: DateTime<Utc>) -> MeetingStatus {
    if now < meeting.scheduled_for {
        MeetingStatus::Scheduled
    } else if now < meeting.planned_end() {
        MeetingStatus::Ongoing
    } else {
        MeetingStatus::Completed
    }
}

/// Computes the fields of `meeting` that need correcting.
///
/// `call` is `None` when there is no call, no provider, or the lookup
/// failed; `recordings` is `None` when the listing was not available.
/// Only fields whose value would change end up in the patch, so applying
/// the result and planning again yields an empty patch.
pub fn plan_corrections(
    meeting: &Meeting,
    call: Option<&CallState>,
    recordings: Option<&[Recording]>,
    now: DateTime<Utc>,
) -> MeetingPatch {
    let mut patch = MeetingPatch::default();
    if meeting.status == MeetingStatus::Cancelled {
        return patch;
    }

    let provider_end = call.and_then(|state| state.ended_at);
    let candidate = match call {
        Some(_) if provider_end.is_some() => MeetingStatus::Completed,
        Some(state) if state.has_session => MeetingStatus::Ongoing,
        _ => infer_status(meeting, now),
    };

    let status = meeting.status.advance_to(candidate);
    if status != meeting.status {
        patch.status = Some(status);
    }

    if status == MeetingStatus::Completed {
        let ended_at = match provider_end {
            Some(end) => Some(end),
            None if meeting.ended_at.is_none() => Some(now),
            None => None,
        };
        if ended_at.is_some() && ended_at != meeting.ended_at {
            patch.ended_at = ended_at;
        }
    }

    if let Some(minutes) = call.and_then(CallState::measured_minutes) {
        if meeting.actual_duration != Some(minutes) {
            patch.actual_duration = Some(minutes);
        }
    }

    if let Some(recordings) = recordings.filter(|r| !r.is_empty()) {
        let urls: Vec<String> = recordings.iter().map(|r| r.url.clone()).collect();
        if meeting.recording_urls.as_ref() != Some(&urls) {
            patch.recording_urls = Some(urls);
        }
    }

    patch
}

pub struct Reconciler {
    store: Arc<dyn MeetingStore>,
    provider: Option<Arc<dyn CallProvider>>,
    provider_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        provider: Option<Arc<dyn CallProvider>>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            provider_timeout,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Reconciles one meeting and returns it as it now stands.
    ///
    /// Provider failures degrade to schedule-based inference; only a failed
    /// store write is an error.
    pub async fn reconcile(&self, meeting: &Meeting, now: DateTime<Utc>) -> AppResult<Meeting> {
        if meeting.status == MeetingStatus::Cancelled {
            return Ok(meeting.clone());
        }

        let (call, recordings) = match (&self.provider, meeting.stream_call_id.as_deref()) {
            (Some(provider), Some(call_id)) => {
                let (call, recordings) = futures::join!(
                    self.bounded(provider.get_call_state(call_id)),
                    self.bounded(provider.list_recordings(call_id)),
                );
                let call = call
                    .map_err(|e| logging::log_provider_error("get_call_state", call_id, &e))
                    .ok();
                let recordings = recordings
                    .map_err(|e| logging::log_provider_error("list_recordings", call_id, &e))
                    .ok();
                (call, recordings)
            }
            _ => (None, None),
        };

        let patch = plan_corrections(meeting, call.as_ref(), recordings.as_deref(), now);
        if patch.is_empty() {
            return Ok(meeting.clone());
        }

        debug!("Correcting meeting {}: {:?}", meeting.id, patch);
        let stored = self
            .store
            .update_meeting(&meeting.id, &patch, meeting.version, now)
            .await?;
        Ok(stored)
    }

    /// Reconciles every meeting concurrently. Output order follows input
    /// order; a meeting that failed is returned as it was passed in.
    pub async fn reconcile_all(&self, meetings: Vec<Meeting>, now: DateTime<Utc>) -> BatchOutcome {
        let mut outcome = BatchOutcome::empty(now);
        if meetings.is_empty() {
            return outcome;
        }

        let results = join_all(meetings.iter().map(|m| self.reconcile(m, now))).await;

        for (original, result) in meetings.into_iter().zip(results) {
            match result {
                Ok(meeting) => {
                    if meeting != original {
                        outcome.updated += 1;
                    }
                    outcome.meetings.push(meeting);
                }
                Err(e) => {
                    warn!("Failed to reconcile meeting {}: {}", original.id, e);
                    outcome.failed += 1;
                    outcome.meetings.push(original);
                }
            }
        }

        outcome
    }

    /// Marks the member's SCHEDULED/ONGOING meetings whose planned end is
    /// strictly before `now` as COMPLETED, ended at `now`. The provider is
    /// not consulted.
    pub async fn auto_complete_expired(&self, member_id: &str, now: DateTime<Utc>) -> AppResult<u64> {
        let filter = MeetingFilter::for_member(member_id)
            .with_statuses(&[MeetingStatus::Scheduled, MeetingStatus::Ongoing])
            .scheduled_until(now);

        let expired: Vec<String> = self
            .store
            .find_meetings(&filter)
            .await?
            .into_iter()
            .filter(|m| m.planned_end() < now)
            .map(|m| m.id)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let swept = self
            .store
            .update_many(&expired, &MeetingPatch::completed_at(now), now)
            .await?;
        info!("Auto-completed {} expired meeting(s) for member {}", swept, member_id);
        Ok(swept)
    }

    async fn bounded<T, F>(&self, lookup: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.provider_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ProviderTimeout(self.provider_timeout.as_millis() as u64)),
        }
    }
}
