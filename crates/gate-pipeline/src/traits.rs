use async_trait::async_trait;
use gate_types::PlayerId;
use thiserror::Error;

use crate::events::AuditEvent;

/// Failure reported by the player directory.
#[derive(Debug, Clone, Error)]
#[error("player directory: {0}")]
pub struct DirectoryError(pub String);

/// Failure reported by the audit sink.
#[derive(Debug, Clone, Error)]
#[error("audit sink: {0}")]
pub struct AuditError(pub String);

/// Player identity lookup owned by another part of the system.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn player_exists(&self, player_id: &PlayerId) -> Result<bool, DirectoryError>;

    /// Players whose name matches `term`, used to widen gate search.
    async fn search_players(&self, _term: &str) -> Result<Vec<PlayerId>, DirectoryError> {
        Ok(Vec::new())
    }
}

/// Receiver of audit events.
///
/// Called after the mutation has committed. A failure here is logged and
/// does not undo or fail the operation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_event(&self, event: &AuditEvent) -> Result<(), AuditError>;
}
