// file: src/models/call.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a provider call, fetched per reconciliation and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallState {
    pub session_started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub has_session: bool,
}

impl CallState {
    /// Measured length in whole minutes, when both ends are known.
    pub fn measured_minutes(&self) -> Option<i64> {
        let (start, end) = (self.session_started_at?, self.ended_at?);
        let millis = (end - start).num_milliseconds().max(0);
        Some((millis as f64 / 60_000.0).round() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub url: String,
    pub filename: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Recording {
    pub fn new(url: String) -> Self {
        Self {
            url,
            filename: None,
            start_time: None,
            end_time: None,
        }
    }
}

/// Data sent to the provider when a meeting's call is provisioned.
#[derive(Debug, Clone, Serialize)]
pub struct CallSpec {
    pub created_by_id: String,
    pub starts_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub duration: i64,
    pub host_id: String,
    pub host_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_measured_minutes_rounds_to_nearest() {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap();
        let state = CallState {
            session_started_at: Some(start),
            ended_at: Some(start + Duration::seconds(29 * 60 + 31)),
            has_session: true,
        };
        assert_eq!(state.measured_minutes(), Some(30));

        let state = CallState {
            ended_at: Some(start + Duration::seconds(29 * 60 + 29)),
            ..state
        };
        assert_eq!(state.measured_minutes(), Some(29));
    }

    #[test]
    fn test_measured_minutes_requires_both_ends() {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap();
        let state = CallState {
            session_started_at: Some(start),
            ended_at: None,
            has_session: true,
        };
        assert_eq!(state.measured_minutes(), None);
        assert_eq!(CallState::default().measured_minutes(), None);
    }

    #[test]
    fn test_measured_minutes_never_negative() {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap();
        let state = CallState {
            session_started_at: Some(start),
            ended_at: Some(start - Duration::minutes(5)),
            has_session: true,
        };
        assert_eq!(state.measured_minutes(), Some(0));
    }
}
