// file: src/models/meeting.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

use super::User;

/// Longest meeting that can be scheduled, in minutes.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum MeetingStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "SCHEDULED",
            MeetingStatus::Ongoing => "ONGOING",
            MeetingStatus::Completed => "COMPLETED",
            MeetingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MeetingStatus::Scheduled | MeetingStatus::Ongoing)
    }

    /// Moves forward along SCHEDULED -> ONGOING -> COMPLETED, never back.
    /// CANCELLED absorbs everything.
    pub fn advance_to(self, candidate: MeetingStatus) -> MeetingStatus {
        fn rank(status: MeetingStatus) -> u8 {
            match status {
                MeetingStatus::Scheduled => 0,
                MeetingStatus::Ongoing => 1,
                MeetingStatus::Completed => 2,
                MeetingStatus::Cancelled => 3,
            }
        }

        if self == MeetingStatus::Cancelled || candidate == MeetingStatus::Cancelled {
            return self;
        }
        if rank(candidate) > rank(self) {
            candidate
        } else {
            self
        }
    }
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MeetingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(MeetingStatus::Scheduled),
            "ONGOING" => Ok(MeetingStatus::Ongoing),
            "COMPLETED" => Ok(MeetingStatus::Completed),
            "CANCELLED" => Ok(MeetingStatus::Cancelled),
            _ => Err(format!("Unknown meeting status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub duration: i64, // minutes
    pub status: MeetingStatus,
    pub stream_call_id: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_duration: Option<i64>, // minutes
    pub recording_urls: Option<Vec<String>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Saturates at the calendar bounds rather than overflowing.
    pub fn planned_end(&self) -> DateTime<Utc> {
        Duration::try_minutes(self.duration)
            .and_then(|planned| self.scheduled_for.checked_add_signed(planned))
            .unwrap_or(if self.duration < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }

    pub fn has_recording(&self) -> bool {
        self.recording_urls
            .as_ref()
            .map(|urls| !urls.is_empty())
            .unwrap_or(false)
    }

    pub fn effective_duration(&self) -> i64 {
        self.actual_duration.unwrap_or(self.duration)
    }

    /// Copy of this record with `patch` applied on top.
    pub fn with_patch(&self, patch: &MeetingPatch) -> Meeting {
        let mut meeting = self.clone();
        if let Some(status) = patch.status {
            meeting.status = status;
        }
        if let Some(ended_at) = patch.ended_at {
            meeting.ended_at = Some(ended_at);
        }
        if let Some(actual_duration) = patch.actual_duration {
            meeting.actual_duration = Some(actual_duration);
        }
        if let Some(urls) = &patch.recording_urls {
            meeting.recording_urls = Some(urls.clone());
        }
        meeting
    }
}

/// Row shape as stored; `recording_urls` is a JSON array column.
#[derive(Debug, FromRow)]
pub struct MeetingRow {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub duration: i64,
    pub status: MeetingStatus,
    pub stream_call_id: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_duration: Option<i64>,
    pub recording_urls: Option<Json<Vec<String>>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Self {
            id: row.id,
            host_id: row.host_id,
            title: row.title,
            description: row.description,
            scheduled_for: row.scheduled_for,
            duration: row.duration,
            status: row.status,
            stream_call_id: row.stream_call_id,
            ended_at: row.ended_at,
            actual_duration: row.actual_duration,
            recording_urls: row.recording_urls.map(|Json(urls)| urls),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Partial update of the reconciled fields. `None` leaves a column alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingPatch {
    pub status: Option<MeetingStatus>,
    pub ended_at: Option<DateTime<Utc>>,
    pub actual_duration: Option<i64>,
    pub recording_urls: Option<Vec<String>>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.ended_at.is_none()
            && self.actual_duration.is_none()
            && self.recording_urls.is_none()
    }

    pub fn completed_at(ended_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(MeetingStatus::Completed),
            ended_at: Some(ended_at),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub host_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub duration: i64,
    pub stream_call_id: Option<String>,
}

/// Body of a create-meeting request, validated by the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_for: Option<String>,
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedFields {
    pub has_recording: bool,
    pub actual_duration: i64,
}

/// A user invited to a meeting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub meeting_id: String,
    pub user_id: String,
    pub added_at: DateTime<Utc>,
    pub user: User,
}

/// Body of an invite request; `userId` is the invitee's identity-provider id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub user_id: Option<String>,
}

/// A meeting as returned by the API, with its members and derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingView {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub host: Option<User>,
    pub participants: Vec<Participant>,
    pub computed: ComputedFields,
}

impl MeetingView {
    pub fn new(meeting: Meeting, host: Option<User>, participants: Vec<Participant>) -> Self {
        let computed = ComputedFields {
            has_recording: meeting.has_recording(),
            actual_duration: meeting.effective_duration(),
        };
        Self {
            meeting,
            host,
            participants,
            computed,
        }
    }
}

/// Hosts keyed by user id and participants keyed by meeting id, loaded once
/// for a whole listing.
#[derive(Debug, Clone, Default)]
pub struct MeetingMembers {
    pub hosts: HashMap<String, User>,
    pub participants: HashMap<String, Vec<Participant>>,
}

impl MeetingMembers {
    pub fn view(&self, meeting: Meeting) -> MeetingView {
        let host = self.hosts.get(&meeting.host_id).cloned();
        let participants = self.participants.get(&meeting.id).cloned().unwrap_or_default();
        MeetingView::new(meeting, host, participants)
    }
}

#[cfg(test)]
pub(crate) fn sample_meeting(scheduled_for: DateTime<Utc>, duration: i64) -> Meeting {
    Meeting {
        id: "meeting-1".to_string(),
        host_id: "user-1".to_string(),
        title: "Weekly sync".to_string(),
        description: None,
        scheduled_for,
        duration,
        status: MeetingStatus::Scheduled,
        stream_call_id: None,
        ended_at: None,
        actual_duration: None,
        recording_urls: None,
        version: 1,
        created_at: scheduled_for - Duration::days(1),
        updated_at: scheduled_for - Duration::days(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_advances_forward_only() {
        use MeetingStatus::*;

        assert_eq!(Scheduled.advance_to(Ongoing), Ongoing);
        assert_eq!(Ongoing.advance_to(Completed), Completed);
        assert_eq!(Scheduled.advance_to(Completed), Completed);
        assert_eq!(Ongoing.advance_to(Scheduled), Ongoing);
        assert_eq!(Completed.advance_to(Ongoing), Completed);
        assert_eq!(Cancelled.advance_to(Completed), Cancelled);
        assert_eq!(Scheduled.advance_to(Cancelled), Scheduled);
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("ongoing".parse::<MeetingStatus>().unwrap(), MeetingStatus::Ongoing);
        assert_eq!(MeetingStatus::Cancelled.to_string(), "CANCELLED");
        assert!("archived".parse::<MeetingStatus>().is_err());
    }

    #[test]
    fn test_planned_end() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let meeting = sample_meeting(start, 45);
        assert_eq!(meeting.planned_end(), Utc.with_ymd_and_hms(2025, 3, 10, 9, 45, 0).unwrap());
    }

    #[test]
    fn test_planned_end_saturates_on_overflow() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(sample_meeting(start, 1_000_000_000_000).planned_end(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(sample_meeting(start, i64::MAX).planned_end(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(sample_meeting(start, i64::MIN).planned_end(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_view_computed_fields_fall_back_to_planned_duration() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let meeting = sample_meeting(start, 30);

        let view = MeetingView::new(meeting.clone(), None, Vec::new());
        assert!(!view.computed.has_recording);
        assert_eq!(view.computed.actual_duration, 30);

        let recorded = Meeting {
            actual_duration: Some(42),
            recording_urls: Some(vec!["https://cdn.example.com/rec-1.mp4".to_string()]),
            ..meeting
        };
        let view = MeetingView::new(recorded, None, Vec::new());
        assert!(view.computed.has_recording);
        assert_eq!(view.computed.actual_duration, 42);
    }

    #[test]
    fn test_empty_recording_list_is_not_a_recording() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let meeting = Meeting {
            recording_urls: Some(vec![]),
            ..sample_meeting(start, 30)
        };
        assert!(!meeting.has_recording());
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let json = serde_json::to_value(MeetingView::new(sample_meeting(start, 30), None, Vec::new())).unwrap();

        assert_eq!(json["status"], "SCHEDULED");
        assert_eq!(json["hostId"], "user-1");
        assert!(json["streamCallId"].is_null());
        assert_eq!(json["computed"]["hasRecording"], false);
        assert_eq!(json["computed"]["actualDuration"], 30);
        assert!(json["host"].is_null());
        assert_eq!(json["participants"], serde_json::json!([]));
    }

    #[test]
    fn test_patch_apply_and_empty() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let meeting = sample_meeting(start, 30);
        assert!(MeetingPatch::default().is_empty());

        let end = start + Duration::minutes(28);
        let patched = meeting.with_patch(&MeetingPatch::completed_at(end));
        assert_eq!(patched.status, MeetingStatus::Completed);
        assert_eq!(patched.ended_at, Some(end));
        assert_eq!(patched.actual_duration, None);
    }
}
