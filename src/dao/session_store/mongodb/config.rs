use std::{env, time::Duration};

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const URI_VAR: &str = "MONGO_URI";
const DATABASE_VAR: &str = "MONGO_DB";
const DEFAULT_DATABASE: &str = "story_relay";

const PING_ATTEMPTS: u32 = 10;
const FIRST_PING_BACKOFF: Duration = Duration::from_millis(250);
const MAX_PING_BACKOFF: Duration = Duration::from_secs(5);

/// Parsed client options plus the database holding the `sessions` collection.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database: String,
}

impl MongoConfig {
    pub async fn parse(uri: &str, database: Option<String>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        Ok(Self {
            options,
            database: database.unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
        })
    }

    /// `MONGO_URI` is required, `MONGO_DB` falls back to `story_relay`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = env::var(URI_VAR).map_err(|_| MongoDaoError::MissingEnvVar { var: URI_VAR })?;
        Self::parse(&uri, env::var(DATABASE_VAR).ok()).await
    }

    /// Open a client and block until the server answers a ping, backing off between tries.
    pub async fn open(&self) -> MongoResult<Database> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database);

        let mut backoff = FIRST_PING_BACKOFF;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(database),
                Err(source) if attempts >= PING_ATTEMPTS => {
                    return Err(MongoDaoError::InitialPing { attempts, source });
                }
                Err(err) => {
                    debug!(attempt = attempts, error = %err, "MongoDB not answering yet");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_PING_BACKOFF);
                }
            }
        }
    }
}
