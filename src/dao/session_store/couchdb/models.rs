use serde::{Deserialize, Serialize};

use crate::state::session::{RoomCode, Session};

pub const SESSION_PREFIX: &str = "session::";
pub const END_SUFFIX: &str = "\u{ffff}";

/// Stored form of a session: CouchDB bookkeeping around the flattened document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: Session,
}

impl CouchSessionDocument {
    pub fn new(session: Session, rev: Option<String>) -> Self {
        Self {
            id: session_doc_id(&session.room_code),
            rev,
            session,
        }
    }
}

/// Body returned by successful writes.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
}

pub fn session_doc_id(code: &str) -> String {
    format!("{SESSION_PREFIX}{code}")
}

pub fn room_code_from_doc_id(doc_id: &str) -> Option<RoomCode> {
    doc_id.strip_prefix(SESSION_PREFIX).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::Settings;

    #[test]
    fn document_flattens_the_session_next_to_couch_fields() {
        let session = Session::new("ABC234".into(), "t".into(), Settings::default(), 5);
        let doc = CouchSessionDocument::new(session, None);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["_id"], "session::ABC234");
        assert!(value.get("_rev").is_none());
        assert_eq!(value["room_code"], "ABC234");
        assert_eq!(value["status"], "LOBBY");

        let mut stored = value.clone();
        stored["_rev"] = serde_json::json!("3-abc");
        let back: CouchSessionDocument = serde_json::from_value(stored).unwrap();
        assert_eq!(back.rev.as_deref(), Some("3-abc"));
        assert_eq!(back.session.room_code, "ABC234");
    }

    #[test]
    fn doc_ids_round_trip_to_room_codes() {
        assert_eq!(room_code_from_doc_id(&session_doc_id("XYZ789")).as_deref(), Some("XYZ789"));
        assert_eq!(room_code_from_doc_id("_design/app"), None);
    }
}
