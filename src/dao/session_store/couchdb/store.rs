use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    dao::{
        session_store::{Revision, SessionStore, Versioned},
        storage::{StorageError, StorageResult},
    },
    state::session::{RoomCode, Session},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchSessionDocument, END_SUFFIX, SESSION_PREFIX, WriteResponse,
        room_code_from_doc_id, session_doc_id,
    },
};

/// [`SessionStore`] over the CouchDB HTTP API. Every write carries the
/// `_rev` it was derived from, so CouchDB itself arbitrates concurrent updates.
#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    config: Arc<CouchConfig>,
}

impl CouchSessionStore {
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::Client { source })?;
        let store = Self {
            client,
            config: Arc::new(config),
        };
        store.ensure_database().await?;
        Ok(store)
    }

    /// Send `method` against `target` inside the database; an empty target hits the database itself.
    async fn send(
        &self,
        method: Method,
        target: &str,
        customize: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> CouchResult<Response> {
        let url = if target.is_empty() {
            format!("{}/{}", self.config.url, self.config.database)
        } else {
            format!("{}/{}/{}", self.config.url, self.config.database, target)
        };
        let mut builder = self.client.request(method.clone(), url);
        if let Some((user, password)) = &self.config.credentials {
            builder = builder.basic_auth(user, Some(password));
        }
        customize(builder)
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                method,
                target: target.to_string(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let response = self.send(Method::GET, "", |b| b).await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let created = self.send(Method::PUT, "", |b| b).await?.status();
                // 412: created concurrently
                if created.is_success() || created == StatusCode::PRECONDITION_FAILED {
                    info!(database = %self.config.database, "created CouchDB database");
                    Ok(())
                } else {
                    Err(unexpected(Method::PUT, "", created))
                }
            }
            other => Err(unexpected(Method::GET, "", other)),
        }
    }

    async fn fetch(&self, doc_id: &str) -> CouchResult<Option<CouchSessionDocument>> {
        let response = self.send(Method::GET, doc_id, |b| b).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => decode(response, doc_id).await.map(Some),
            other => Err(unexpected(Method::GET, doc_id, other)),
        }
    }

    /// A 409 means the embedded `_rev` is stale, or missing for an id that exists.
    async fn store(&self, document: &CouchSessionDocument) -> CouchResult<Revision> {
        let doc_id = document.id.as_str();
        let response = self.send(Method::PUT, doc_id, |b| b.json(document)).await?;
        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                target: doc_id.to_string(),
            }),
            status if status.is_success() => decode::<WriteResponse>(response, doc_id)
                .await
                .map(|written| written.rev),
            other => Err(unexpected(Method::PUT, doc_id, other)),
        }
    }

    async fn remove(&self, doc_id: &str) -> CouchResult<bool> {
        loop {
            let Some(rev) = self.fetch(doc_id).await?.and_then(|doc| doc.rev) else {
                return Ok(false);
            };
            let response = self
                .send(Method::DELETE, doc_id, |b| b.query(&[("rev", rev.as_str())]))
                .await?;
            match response.status() {
                StatusCode::NOT_FOUND => return Ok(false),
                StatusCode::CONFLICT => debug!(doc_id, "delete lost a race with a write; retrying"),
                status if status.is_success() => return Ok(true),
                other => return Err(unexpected(Method::DELETE, doc_id, other)),
            }
        }
    }

    async fn room_codes(&self) -> CouchResult<Vec<RoomCode>> {
        const ALL_DOCS: &str = "_all_docs";
        let range = [
            ("startkey", format!("\"{SESSION_PREFIX}\"")),
            ("endkey", format!("\"{SESSION_PREFIX}{END_SUFFIX}\"")),
        ];
        let response = self.send(Method::GET, ALL_DOCS, |b| b.query(&range)).await?;
        if !response.status().is_success() {
            return Err(unexpected(Method::GET, ALL_DOCS, response.status()));
        }
        let listing: AllDocsResponse = decode(response, ALL_DOCS).await?;
        Ok(listing
            .rows
            .iter()
            .filter_map(|row| room_code_from_doc_id(&row.id))
            .collect())
    }
}

fn unexpected(method: Method, target: &str, status: StatusCode) -> CouchDaoError {
    CouchDaoError::Status {
        method,
        target: target.to_string(),
        status,
    }
}

async fn decode<T: DeserializeOwned>(response: Response, target: &str) -> CouchResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|source| CouchDaoError::Decode {
            target: target.to_string(),
            source,
        })
}

impl SessionStore for CouchSessionStore {
    fn backend(&self) -> &'static str {
        "couch"
    }

    fn create(&self, session: Session) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move {
            let document = CouchSessionDocument::new(session, None);
            store.store(&document).await.map_err(|err| match err {
                CouchDaoError::Conflict { .. } => {
                    StorageError::already_exists(document.session.room_code.clone())
                }
                other => other.into(),
            })
        })
    }

    fn load(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<Versioned<Session>>>> {
        let store = self.clone();
        Box::pin(async move {
            let found = store.fetch(&session_doc_id(&code)).await?;
            Ok(found.and_then(|doc| {
                let CouchSessionDocument { rev, session, .. } = doc;
                rev.map(|revision| Versioned {
                    revision,
                    document: session,
                })
            }))
        })
    }

    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Revision,
        session: Session,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move {
            let mut document = CouchSessionDocument::new(session, Some(expected));
            document.id = session_doc_id(&code);
            Ok(store.store(&document).await?)
        })
    }

    fn delete(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.remove(&session_doc_id(&code)).await?) })
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<RoomCode>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.room_codes().await?) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let status = store.send(Method::GET, "", |b| b).await?.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(unexpected(Method::GET, "", status).into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.ensure_database().await?) })
    }
}
