mod config;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Conflict { code } => StorageError::conflict(code),
            MongoDaoError::Duplicate { code } => StorageError::already_exists(code),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
