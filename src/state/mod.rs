pub mod ledger;
pub mod normalizer;
pub mod scheduler;
pub mod session;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::session_store::SessionStore,
    error::ServiceError,
    state::{
        session::{PlayerId, RoomCode},
        transitions::SessionRules,
    },
};

pub use self::sse::{RoomHubs, SseHub};

pub type SharedState = Arc<AppState>;

/// Buffered events per room before slow subscribers start lagging.
const ROOM_EVENT_CAPACITY: usize = 32;

#[derive(Clone)]
/// Handle used to push messages to a connected presence socket.
pub struct PresenceConnection {
    /// Identifies this socket among successive connections of the same player.
    pub connection_id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing persistent connections and the store handle.
///
/// Session documents themselves never live here: every read goes through the
/// installed [`SessionStore`].
pub struct AppState {
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    rooms: RoomHubs,
    presence: DashMap<(RoomCode, PlayerId), PresenceConnection>,
    config: AppConfig,
    rules: SessionRules,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let rules = config.session_rules();
        Arc::new(Self {
            session_store: RwLock::new(None),
            rooms: RoomHubs::new(ROOM_EVENT_CAPACITY),
            presence: DashMap::new(),
            config,
            rules,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current session store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.session_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Per-room broadcast hubs feeding the SSE streams.
    pub fn rooms(&self) -> &RoomHubs {
        &self.rooms
    }

    /// Registry of open presence sockets keyed by room and player.
    pub fn presence(&self) -> &DashMap<(RoomCode, PlayerId), PresenceConnection> {
        &self.presence
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Rules handed to every transition.
    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
