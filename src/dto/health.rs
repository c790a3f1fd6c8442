use serde::Serialize;
use utoipa::ToSchema;

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A session store is installed.
    Ok,
    /// No session store; every room operation fails with 503.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Configured storage backend (`memory`, `couch` or `mongo`).
    pub backend: String,
}

impl HealthResponse {
    pub fn new(degraded: bool, backend: impl Into<String>) -> Self {
        Self {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Ok
            },
            backend: backend.into(),
        }
    }
}
