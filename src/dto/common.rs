use serde::Serialize;
use utoipa::ToSchema;

/// Connectivity and write-in-progress flags shown by every screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Whether the remote store is reachable.
    pub online: bool,
    /// Whether a mutation is currently being written.
    pub syncing: bool,
}
