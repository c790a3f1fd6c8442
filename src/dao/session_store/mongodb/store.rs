use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{MongoSessionDocument, code_filter, revision_filter},
};
use crate::{
    dao::{
        session_store::{Revision, SessionStore, Versioned},
        storage::StorageResult,
    },
    state::session::{RoomCode, Session},
};

const SESSIONS: &str = "sessions";
const UPDATED_INDEX: &str = "session_updated_idx";

/// [`SessionStore`] over MongoDB. Replaces are filtered on the stored
/// `revision`, so a write derived from a stale read matches nothing.
#[derive(Clone)]
pub struct MongoSessionStore {
    config: Arc<MongoConfig>,
    database: Arc<RwLock<Database>>,
}

impl MongoSessionStore {
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open().await?;
        let store = Self {
            config: Arc::new(config),
            database: Arc::new(RwLock::new(database)),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map(drop)
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reopen(&self) -> MongoResult<()> {
        let database = self.config.open().await?;
        *self.database.write().await = database;
        Ok(())
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let by_update = IndexModel::builder()
            .keys(doc! { "updated_at": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some(UPDATED_INDEX.to_owned()))
                    .build(),
            )
            .build();
        self.collection()
            .await
            .create_index(by_update)
            .await
            .map(drop)
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSIONS,
                index: UPDATED_INDEX,
                source,
            })
    }

    async fn collection(&self) -> Collection<MongoSessionDocument> {
        self.database.read().await.collection(SESSIONS)
    }

    async fn insert(&self, session: Session) -> MongoResult<Revision> {
        let code = session.room_code.clone();
        let document = MongoSessionDocument::new(session, 1);
        match self.collection().await.insert_one(&document).await {
            Ok(_) => Ok(document.revision.to_string()),
            Err(err) if is_duplicate_key(&err) => Err(MongoDaoError::Duplicate { code }),
            Err(source) => Err(MongoDaoError::SaveSession { code, source }),
        }
    }

    async fn find(&self, code: RoomCode) -> MongoResult<Option<Versioned<Session>>> {
        let document = self
            .collection()
            .await
            .find_one(code_filter(&code))
            .await
            .map_err(|source| MongoDaoError::LoadSession {
                code: code.clone(),
                source,
            })?;

        Ok(document.map(|doc| Versioned {
            revision: doc.revision.to_string(),
            document: doc.session,
        }))
    }

    async fn replace(&self, code: RoomCode, expected: Revision, session: Session) -> MongoResult<Revision> {
        let Ok(expected) = expected.parse::<i64>() else {
            return Err(MongoDaoError::Conflict { code });
        };
        let mut document = MongoSessionDocument::new(session, expected + 1);
        document.id = code.clone();

        let result = self
            .collection()
            .await
            .replace_one(revision_filter(&code, expected), &document)
            .await
            .map_err(|source| MongoDaoError::SaveSession {
                code: code.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::Conflict { code });
        }
        Ok(document.revision.to_string())
    }

    async fn remove(&self, code: RoomCode) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(code_filter(&code))
            .await
            .map_err(|source| MongoDaoError::DeleteSession { code, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_codes(&self) -> MongoResult<Vec<RoomCode>> {
        let documents: Vec<MongoSessionDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|source| MongoDaoError::ListSessions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListSessions { source })?;

        Ok(documents.into_iter().map(|doc| doc.id).collect())
    }
}

impl SessionStore for MongoSessionStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    fn create(&self, session: Session) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.insert(session).await.map_err(Into::into) })
    }

    fn load(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<Versioned<Session>>>> {
        let store = self.clone();
        Box::pin(async move { store.find(code).await.map_err(Into::into) })
    }

    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Revision,
        session: Session,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace(code, expected, session)
                .await
                .map_err(Into::into)
        })
    }

    fn delete(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove(code).await.map_err(Into::into) })
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<RoomCode>>> {
        let store = self.clone();
        Box::pin(async move { store.list_codes().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reopen().await.map_err(Into::into) })
    }
}
