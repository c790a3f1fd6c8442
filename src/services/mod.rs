/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Presence WebSocket handling and turn notifications.
pub mod presence;
/// Optimistic transition runner.
pub mod protocol;
/// Room operations.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage backend selection and connection supervision.
pub mod storage_supervisor;
