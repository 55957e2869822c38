// meetline library
// Meeting status reconciliation against a hosted video-call provider,
// plus the listing API that drives it.

pub mod api;
pub mod calls;
pub mod config;
pub mod database;
pub mod error;
pub mod http_config;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use calls::{CallProvider, StreamCallProvider};
pub use config::{Config, StreamConfig};
pub use database::{Database, MeetingStore};
pub use error::{AppError, AppResult};
pub use models::*;
pub use reconcile::Reconciler;
pub use service::{ListingKind, MeetingService};

use api::AuthSettings;
use std::sync::Arc;

/// Application state shared across request handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub meetings: Arc<MeetingService>,
    pub auth: Arc<AuthSettings>,
    pub shutdown: tokio_util::sync::CancellationToken,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        provider: Option<Arc<dyn CallProvider>>,
        config: &Config,
    ) -> AppResult<Self> {
        Ok(Self {
            meetings: Arc::new(MeetingService::new(db.clone(), provider, config.provider_timeout)),
            auth: Arc::new(AuthSettings::from_config(config)?),
            db,
            shutdown: tokio_util::sync::CancellationToken::new(),
        })
    }
}
