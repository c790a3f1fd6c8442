use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::state::session::Session;

/// Stored form of a session: the room code as `_id`, a revision counter
/// checked on every replace, and the document itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub revision: i64,
    pub updated_at: DateTime,
    pub session: Session,
}

impl MongoSessionDocument {
    pub fn new(session: Session, revision: i64) -> Self {
        Self {
            id: session.room_code.clone(),
            revision,
            updated_at: DateTime::from_millis(i64::try_from(session.updated_at).unwrap_or(i64::MAX)),
            session,
        }
    }
}

pub fn code_filter(code: &str) -> Document {
    doc! { "_id": code }
}

pub fn revision_filter(code: &str, revision: i64) -> Document {
    doc! { "_id": code, "revision": revision }
}
