use std::env;

use super::error::{CouchDaoError, CouchResult};

const URL_VAR: &str = "COUCH_URL";
const DATABASE_VAR: &str = "COUCH_DB";
const USER_VAR: &str = "COUCH_USERNAME";
const PASSWORD_VAR: &str = "COUCH_PASSWORD";

/// Database used when `COUCH_DB` is unset.
pub const DEFAULT_DATABASE: &str = "story_relay";

/// Where session documents live in CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub url: String,
    pub database: String,
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> CouchResult<Self> {
        let database = database.into();
        if !is_valid_database_name(&database) {
            return Err(CouchDaoError::InvalidDatabaseName { name: database });
        }
        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            database,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Read `COUCH_URL` (required), `COUCH_DB` and the optional basic-auth pair.
    pub fn from_env() -> CouchResult<Self> {
        let url = env::var(URL_VAR).map_err(|_| CouchDaoError::MissingEnvVar { var: URL_VAR })?;
        let database = env::var(DATABASE_VAR).unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let config = Self::new(url, database)?;

        Ok(match (env::var(USER_VAR), env::var(PASSWORD_VAR)) {
            (Ok(user), Ok(password)) => config.with_credentials(user, password),
            _ => config,
        })
    }
}

/// CouchDB names start with a lowercase letter and use `[a-z0-9_$()+/-]` afterwards.
fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c))
}
