//! In-process store used for single-node deployments and tests.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::{
    dao::{
        session_store::{Revision, SessionStore, Versioned},
        storage::{StorageError, StorageResult},
    },
    state::session::{RoomCode, Session},
};

#[derive(Debug, Clone)]
struct Slot {
    revision: u64,
    session: Session,
}

/// [`SessionStore`] backed by a concurrent map with per-document counters.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<RoomCode, Slot>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_revision(code: &str, revision: &str) -> StorageResult<u64> {
        revision
            .parse::<u64>()
            .map_err(|_| StorageError::conflict(code))
    }
}

impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn create(&self, session: Session) -> BoxFuture<'static, StorageResult<Revision>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            match sessions.entry(session.room_code.clone()) {
                Entry::Occupied(entry) => Err(StorageError::already_exists(entry.key().clone())),
                Entry::Vacant(entry) => {
                    entry.insert(Slot {
                        revision: 1,
                        session,
                    });
                    Ok("1".to_string())
                }
            }
        })
    }

    fn load(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<Versioned<Session>>>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            Ok(sessions.get(&code).map(|slot| Versioned {
                revision: slot.revision.to_string(),
                document: slot.session.clone(),
            }))
        })
    }

    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Revision,
        session: Session,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            let expected = Self::parse_revision(&code, &expected)?;
            let Some(mut slot) = sessions.get_mut(&code) else {
                return Err(StorageError::conflict(code));
            };
            if slot.revision != expected {
                return Err(StorageError::conflict(code));
            }
            slot.revision += 1;
            slot.session = session;
            Ok(slot.revision.to_string())
        })
    }

    fn delete(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<bool>> {
        let sessions = self.sessions.clone();
        Box::pin(async move { Ok(sessions.remove(&code).is_some()) })
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<RoomCode>>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            let mut codes: Vec<RoomCode> = sessions.iter().map(|slot| slot.key().clone()).collect();
            codes.sort();
            Ok(codes)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
