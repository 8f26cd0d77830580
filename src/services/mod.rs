/// Health check service.
pub mod health_service;
/// Notification and client enumeration ingestion.
pub mod ingest_service;
/// Player control and removal.
pub mod player_service;
/// Periodic client enumeration against the media server.
pub mod refresh;
/// Read access to the cached states.
pub mod state_service;
/// Storage backend connection supervisor.
pub mod storage_supervisor;
/// Periodic sweep of stale notification states.
pub mod sweeper;
