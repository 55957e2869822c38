// file: src/models/sync.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Meeting;

/// Result of reconciling one batch of meetings.
///
/// `meetings` keeps input order. A meeting whose reconciliation failed is
/// carried through as it was read, so callers still get best-effort data.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub meetings: Vec<Meeting>,
    pub updated: usize,
    pub failed: usize,
    pub synced_at: DateTime<Utc>,
}

impl BatchOutcome {
    pub fn empty(synced_at: DateTime<Utc>) -> Self {
        Self {
            meetings: Vec::new(),
            updated: 0,
            failed: 0,
            synced_at,
        }
    }

    pub fn total(&self) -> usize {
        self.meetings.len()
    }
}

/// `meta` block of a reconciled listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    pub synced: bool,
    pub count: usize,
    pub failed: usize,
    pub auto_completed: u64,
    pub synced_at: DateTime<Utc>,
}

impl SyncMeta {
    pub fn from_outcome(outcome: &BatchOutcome, count: usize, auto_completed: u64) -> Self {
        Self {
            synced: true,
            count,
            failed: outcome.failed,
            auto_completed,
            synced_at: outcome.synced_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_outcome() {
        let now = Utc::now();
        let outcome = BatchOutcome::empty(now);
        assert_eq!(outcome.total(), 0);
        assert_eq!(outcome.failed, 0);

        let meta = SyncMeta::from_outcome(&outcome, 0, 2);
        assert!(meta.synced);
        assert_eq!(meta.auto_completed, 2);
        assert_eq!(meta.synced_at, now);
    }
}
