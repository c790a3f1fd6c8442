#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::{
    dao::storage::StorageResult,
    state::session::{RoomCode, Session},
};

/// Opaque token identifying one stored version of a document.
pub type Revision = String;

/// A document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Revision to hand back to [`SessionStore::compare_and_swap`].
    pub revision: Revision,
    /// Stored document.
    pub document: T,
}

/// Keyed document store with optimistic, revision-checked writes.
///
/// Every write to one room is serialized by the backend: exactly one of two
/// writers holding the same revision succeeds, the other sees
/// [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict).
pub trait SessionStore: Send + Sync {
    /// Short backend name reported by the health check.
    fn backend(&self) -> &'static str;
    /// Insert a new session; fails with `AlreadyExists` when the code is taken.
    fn create(&self, session: Session) -> BoxFuture<'static, StorageResult<Revision>>;
    /// Read the latest version of a session.
    fn load(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<Versioned<Session>>>>;
    /// Replace a session only if it is still at `expected`.
    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Revision,
        session: Session,
    ) -> BoxFuture<'static, StorageResult<Revision>>;
    /// Remove a session; returns whether it existed.
    fn delete(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<bool>>;
    /// Codes of every stored session.
    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<RoomCode>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
