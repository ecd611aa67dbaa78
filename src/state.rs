//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is the one container for process-wide collaborators. It is
//! built once by `AppState::init` and injected into Axum handlers via the
//! `State` extractor; every field is `Arc`-backed so clones are cheap.
//! `AppState::shutdown` is the matching teardown: it ends every realtime
//! subscription so websocket tasks drain before the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::realtime::ChangeFeed;
use crate::services::booking::BookingDraft;
use crate::services::payment::{MockGateway, PaymentGateway};
use crate::storage::{LocalDiskStorage, MemoryStorage, ObjectStorage};
use crate::store::Repositories;
use crate::store::pg::PgStore;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repos: Repositories,
    pub storage: Arc<dyn ObjectStorage>,
    pub payments: Arc<dyn PaymentGateway>,
    pub feed: ChangeFeed,
    /// In-progress booking wizards keyed by user id.
    pub booking_drafts: Arc<RwLock<HashMap<Uuid, BookingDraft>>>,
}

impl AppState {
    /// Assemble state from already-built collaborators.
    #[must_use]
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        storage: Arc<dyn ObjectStorage>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let feed = ChangeFeed::new(config.realtime_queue_capacity);
        Self {
            config: Arc::new(config),
            repos,
            storage,
            payments,
            feed,
            booking_drafts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build every backend named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Postgres pool cannot connect or migrate.
    pub async fn init(config: AppConfig) -> Result<Self, sqlx::Error> {
        let repos = match &config.database_url {
            Some(url) => {
                let pool = crate::db::init_pool(url, config.db_max_connections).await?;
                info!(max_connections = config.db_max_connections, "postgres store ready");
                Repositories::from_backend(Arc::new(PgStore::new(pool)))
            }
            None => {
                info!("DATABASE_URL not set; using in-memory store");
                Repositories::in_memory()
            }
        };

        let storage: Arc<dyn ObjectStorage> = match &config.storage_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "local object storage");
                Arc::new(LocalDiskStorage::new(dir))
            }
            None => Arc::new(MemoryStorage::new()),
        };

        let payments = Arc::new(MockGateway::new(config.public_base_url.clone()));
        Ok(Self::new(config, repos, storage, payments))
    }

    /// Close the realtime feed. Safe to call more than once.
    pub fn shutdown(&self) {
        let open = self.feed.subscriber_count();
        self.feed.close();
        info!(closed_subscriptions = open, "app state shut down");
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
