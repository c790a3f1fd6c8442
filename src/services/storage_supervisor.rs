use std::{env, future::Future, str::FromStr, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{
        session_store::{SessionStore, memory::MemorySessionStore},
        storage::StorageError,
    },
    services::sse_events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Environment variable selecting the session store.
pub const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Session store implementations the server can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local map; rooms vanish on restart.
    #[default]
    Memory,
    /// CouchDB through its HTTP API.
    #[cfg(feature = "couch-store")]
    Couch,
    /// MongoDB.
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Self::Couch),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(Self::Mongo),
            other => Err(format!("unsupported store backend `{other}`")),
        }
    }
}

impl StoreBackend {
    /// Backend named by `STORE_BACKEND`, defaulting to memory.
    pub fn from_env() -> Self {
        match env::var(STORE_BACKEND_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|err: String| {
                warn!(error = %err, "falling back to the memory store");
                Self::Memory
            }),
            Err(_) => Self::Memory,
        }
    }

    /// Open a connection to the backend.
    pub async fn connect(self) -> Result<Arc<dyn SessionStore>, StorageError> {
        match self {
            Self::Memory => Ok(Arc::new(MemorySessionStore::new())),
            #[cfg(feature = "couch-store")]
            Self::Couch => {
                use crate::dao::session_store::couchdb::{CouchConfig, CouchSessionStore};

                let config = CouchConfig::from_env()?;
                Ok(Arc::new(CouchSessionStore::connect(config).await?))
            }
            #[cfg(feature = "mongo-store")]
            Self::Mongo => {
                use crate::dao::session_store::mongodb::{MongoConfig, MongoSessionStore};

                let config = MongoConfig::from_env().await?;
                Ok(Arc::new(MongoSessionStore::connect(config).await?))
            }
        }
    }
}

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                info!(backend = store.backend(), "storage connection established; leaving degraded mode");
                state.install_session_store(store.clone()).await;
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded().await {
                                info!("storage healthy again; leaving degraded mode");
                                state.install_session_store(store.clone()).await;
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "storage health check failed");
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!("storage reconnection succeeded after health check failure");
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering degraded mode"
                                            );
                                            state.clear_session_store().await;
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        }
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                state.install_session_store(store.clone()).await;
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted storage reconnect attempts; staying in degraded mode");
                            state.clear_session_store().await;
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Relay degraded mode changes to every open room stream.
pub async fn forward_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        info!(degraded, "degraded mode changed");
        sse_events::broadcast_system_status(&state, degraded);
    }
}
