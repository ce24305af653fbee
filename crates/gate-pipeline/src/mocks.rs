//! In-process collaborators for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use gate_types::PlayerId;
use tracing::info;

use crate::events::AuditEvent;
use crate::traits::{AuditError, AuditSink, DirectoryError, PlayerDirectory};

/// Player directory backed by a map of id to display name.
#[derive(Default)]
pub struct InMemoryPlayerDirectory {
    players: RwLock<HashMap<PlayerId, String>>,
    unavailable: AtomicBool,
}

impl InMemoryPlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player under a display name.
    pub fn register(&self, player_id: impl Into<PlayerId>, name: impl Into<String>) {
        let mut players = self
            .players
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        players.insert(player_id.into(), name.into());
    }

    /// Make every lookup fail, to exercise collaborator errors.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError("directory unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerDirectory for InMemoryPlayerDirectory {
    async fn player_exists(&self, player_id: &PlayerId) -> Result<bool, DirectoryError> {
        self.check_available()?;
        let players = self
            .players
            .read()
            .map_err(|_| DirectoryError("lock poisoned".into()))?;
        Ok(players.contains_key(player_id))
    }

    async fn search_players(&self, term: &str) -> Result<Vec<PlayerId>, DirectoryError> {
        self.check_available()?;
        let needle = term.to_lowercase();
        let players = self
            .players
            .read()
            .map_err(|_| DirectoryError("lock poisoned".into()))?;
        let mut matches: Vec<PlayerId> = players
            .iter()
            .filter(|(_, name)| name.to_lowercase().contains(&needle))
            .map(|(id, _)| id.clone())
            .collect();
        matches.sort();
        Ok(matches)
    }
}

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent event.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of recorded events in arrival order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError("sink rejected event".into()));
        }
        self.events
            .lock()
            .map_err(|_| AuditError("lock poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}

/// Audit sink that writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let payload =
            serde_json::to_string(event).map_err(|e| AuditError(format!("encode failed: {e}")))?;
        info!(
            target: "gate_pipeline::audit",
            action = event.action.as_str(),
            entity = event.entity.as_str(),
            entity_id = %event.entity_id,
            user_id = %event.actor.user_id,
            event = %payload,
            "{}",
            event.detail
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AuditAction;
    use gate_types::{ActorContext, GateId};

    #[tokio::test]
    async fn directory_searches_names_case_insensitively() {
        let directory = InMemoryPlayerDirectory::new();
        directory.register("p-1", "Salem Al-Dawsari");
        directory.register("p-2", "Youth Prospect");

        let found = directory.search_players("salem").await.unwrap();
        assert_eq!(found, vec![PlayerId::new("p-1")]);
        assert!(directory.player_exists(&PlayerId::new("p-2")).await.unwrap());
        assert!(!directory.player_exists(&PlayerId::new("p-3")).await.unwrap());

        directory.set_unavailable(true);
        assert!(directory.player_exists(&PlayerId::new("p-1")).await.is_err());
    }

    #[tokio::test]
    async fn recording_sink_can_be_made_to_fail() {
        let sink = RecordingAuditSink::new();
        let event = AuditEvent::gate(
            AuditAction::Create,
            &GateId::new("g-1"),
            &ActorContext::new("u-1"),
            "Created Gate 0 for player p-1",
        );
        sink.record_event(&event).await.unwrap();
        sink.set_failing(true);
        assert!(sink.record_event(&event).await.is_err());
        assert_eq!(sink.events().len(), 1);
    }
}
