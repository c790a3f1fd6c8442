use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the degraded flag and the active backend, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_session_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(backend = store.backend(), error = %err, "storage health check failed");
            }
            HealthResponse::new(state.is_degraded().await, store.backend())
        }
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            HealthResponse::new(true, "none")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::MemorySessionStore,
        dto::health::HealthStatus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_a_store() {
        let state = AppState::new(AppConfig::default());
        let response = health_status(&state).await;
        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.backend, "none");

        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        let response = health_status(&state).await;
        assert_eq!(response.status, HealthStatus::Ok);
        assert_eq!(response.backend, "memory");
    }
}
