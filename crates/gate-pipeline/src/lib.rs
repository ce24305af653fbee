//! Player development gate pipeline.
//!
//! Every player passes four ordered gates (0 to 3). A gate moves
//! `Pending -> InProgress -> Completed`; completion is blocked while any
//! mandatory checklist item is open, and gate N can only be created once
//! gate N-1 is completed. A completed gate and its checklist are immutable.
//!
//! - [`PipelineOrchestrator`] creates gates and assembles read views.
//! - [`GateLifecycle`] runs transitions and checklist mutations.
//! - [`progress`] holds the pure progress math.
//!
//! Storage, player lookup and audit delivery are injected:
//!
//! ```ignore
//! let store = gate_pipeline::connect_store(&config.storage).await?;
//! let pipeline = PipelineOrchestrator::new(store, players, Arc::new(TracingAuditSink))
//!     .with_pagination(config.pagination);
//! let gate = pipeline
//!     .initialize_gate(&player_id, GateNumber::Zero, InitializeOptions::default(), &actor)
//!     .await?;
//! pipeline.lifecycle().start(&gate.gate.id, &actor, None).await?;
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod mocks;
pub mod orchestrator;
pub mod progress;
pub mod telemetry;
pub mod templates;
pub mod traits;

use std::sync::Arc;

use gate_store::{GateStore, InMemoryGateStore};

pub use config::{LoggingConfig, PaginationConfig, PipelineConfig, StorageConfig};
pub use error::{ErrorKind, GateError, GateResult};
pub use events::{AuditAction, AuditEntity, AuditEvent};
pub use lifecycle::GateLifecycle;
pub use orchestrator::{
    current_gate_number, CreateGate, GateDetail, InitializeOptions, ListGates,
    PipelineOrchestrator, PlayerPipeline,
};
pub use progress::{gate_progress, overall_progress, ChecklistSummary};
pub use traits::{AuditError, AuditSink, DirectoryError, PlayerDirectory};

/// Build the store named by `config`.
pub async fn connect_store(config: &StorageConfig) -> GateResult<Arc<dyn GateStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryGateStore::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = gate_store::PostgresGateStore::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            tracing::info!(max_connections = *max_connections, "Connected postgres gate store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(GateError::Validation(
            "postgres storage requires the `postgres` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_store::GateRepository;

    #[tokio::test]
    async fn memory_store_is_the_default() {
        let store = connect_store(&StorageConfig::default()).await.unwrap();
        let gates = store
            .list_player_gates(&gate_types::PlayerId::new("p-1"))
            .await
            .unwrap();
        assert!(gates.is_empty());
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn postgres_without_feature_is_rejected() {
        let config = StorageConfig::Postgres {
            url: "postgres://localhost/gates".into(),
            max_connections: 10,
            connect_timeout_secs: 5,
        };
        let err = connect_store(&config).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
