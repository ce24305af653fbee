//! Audit events emitted after every committed mutation.

use chrono::{DateTime, Utc};
use gate_types::{ActorContext, ChecklistItemId, GateId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::traits::AuditSink;

/// Kind of mutation recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// Which table-level entity the event concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    Gates,
    GateChecklists,
}

impl AuditEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEntity::Gates => "gates",
            AuditEntity::GateChecklists => "gate_checklists",
        }
    }
}

/// One audit record handed to the [`AuditSink`](crate::AuditSink).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    pub actor: ActorContext,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn gate(
        action: AuditAction,
        gate_id: &GateId,
        actor: &ActorContext,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity: AuditEntity::Gates,
            entity_id: gate_id.to_string(),
            actor: actor.clone(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    pub fn checklist(
        action: AuditAction,
        item_id: &ChecklistItemId,
        actor: &ActorContext,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity: AuditEntity::GateChecklists,
            entity_id: item_id.to_string(),
            actor: actor.clone(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

/// Hand an event to the sink. The mutation has already committed, so a
/// sink failure is logged and dropped.
pub(crate) async fn publish(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(err) = sink.record_event(&event).await {
        warn!(
            error = %err,
            action = event.action.as_str(),
            entity = event.entity.as_str(),
            entity_id = %event.entity_id,
            "audit event dropped"
        );
    }
}
