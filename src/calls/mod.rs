// Call provider integration
// The hosted video-call service is the authority on whether a meeting's
// session has started or ended, and on its recordings.

use crate::error::AppResult;
use crate::models::{CallSpec, CallState, Recording};
use async_trait::async_trait;

pub mod stream;
pub mod token;

pub use stream::StreamCallProvider;

/// Read and provisioning access to external call sessions.
///
/// Lookups may fail independently of each other; callers decide whether a
/// failure is fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallProvider: Send + Sync {
    async fn get_call_state(&self, call_id: &str) -> AppResult<CallState>;

    async fn list_recordings(&self, call_id: &str) -> AppResult<Vec<Recording>>;

    /// Get-or-create: calling twice with the same id is not an error.
    async fn create_call(&self, call_id: &str, spec: &CallSpec) -> AppResult<()>;
}
