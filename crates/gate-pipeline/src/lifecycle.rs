use std::sync::Arc;

use chrono::Utc;
use gate_store::{ChecklistRepository, GateRepository, GateStore};
use gate_types::{
    ActorContext, AdvanceAction, ChecklistItem, ChecklistItemId, ChecklistToggle, Gate, GateId,
    GatePatch, GateStatus, GateTransition, NewChecklistItem,
};
use tracing::{debug, info, warn};

use crate::error::{GateError, GateResult};
use crate::events::{publish, AuditAction, AuditEvent};
use crate::traits::AuditSink;

/// The gate state machine: `Pending -> InProgress -> Completed`.
///
/// Every guard is checked twice: once here against a fresh read, so the
/// common rejection is cheap and precise, and again inside the store's
/// atomic write, so a concurrent change cannot slip between the two.
/// `Completed` is terminal for the gate and its checklist.
#[derive(Clone)]
pub struct GateLifecycle {
    store: Arc<dyn GateStore>,
    audit: Arc<dyn AuditSink>,
}

impl GateLifecycle {
    pub fn new(store: Arc<dyn GateStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Dispatch an advance request to [`start`](Self::start) or
    /// [`complete`](Self::complete).
    pub async fn advance(
        &self,
        gate_id: &GateId,
        action: AdvanceAction,
        actor: &ActorContext,
        notes: Option<String>,
    ) -> GateResult<Gate> {
        match action {
            AdvanceAction::Start => self.start(gate_id, actor, notes).await,
            AdvanceAction::Complete => self.complete(gate_id, actor, notes).await,
        }
    }

    /// `Pending -> InProgress`, stamping `started_at`.
    pub async fn start(
        &self,
        gate_id: &GateId,
        actor: &ActorContext,
        notes: Option<String>,
    ) -> GateResult<Gate> {
        let gate = self.load_gate(gate_id).await?;
        if gate.status != GateStatus::Pending {
            warn!(
                gate_id = %gate_id,
                status = %gate.status,
                "start rejected: gate is not pending"
            );
            return Err(GateError::InvalidTransition {
                gate_id: gate_id.clone(),
                from: gate.status,
                to: GateStatus::InProgress,
            });
        }

        let transition = GateTransition::Start {
            at: Utc::now(),
            notes,
        };
        let gate = self.store.transition_gate(gate_id, &transition).await?;

        info!(
            gate_id = %gate.id,
            player_id = %gate.player_id,
            gate_number = %gate.gate_number,
            "Gate started"
        );
        self.record(AuditEvent::gate(
            AuditAction::Update,
            &gate.id,
            actor,
            format!("Gate {} started", gate.gate_number),
        ))
        .await;
        Ok(gate)
    }

    /// `InProgress -> Completed`, attributed to `actor`.
    ///
    /// Fails with `IncompleteMandatoryItems` listing every open mandatory
    /// item. Optional items never block.
    pub async fn complete(
        &self,
        gate_id: &GateId,
        actor: &ActorContext,
        notes: Option<String>,
    ) -> GateResult<Gate> {
        let gate = self.load_gate(gate_id).await?;
        if gate.status != GateStatus::InProgress {
            warn!(
                gate_id = %gate_id,
                status = %gate.status,
                "complete rejected: gate is not in progress"
            );
            return Err(GateError::InvalidTransition {
                gate_id: gate_id.clone(),
                from: gate.status,
                to: GateStatus::Completed,
            });
        }

        let blocking: Vec<ChecklistItemId> = self
            .store
            .list_items(gate_id)
            .await?
            .into_iter()
            .filter(ChecklistItem::is_blocking)
            .map(|item| item.id)
            .collect();
        if !blocking.is_empty() {
            warn!(
                gate_id = %gate_id,
                blocking = blocking.len(),
                "complete rejected: mandatory items open"
            );
            return Err(GateError::IncompleteMandatoryItems {
                gate_id: gate_id.clone(),
                blocking,
            });
        }

        let transition = GateTransition::Complete {
            at: Utc::now(),
            approved_by: actor.user_id.clone(),
            approver_role: actor.role.clone(),
            notes,
        };
        let gate = self.store.transition_gate(gate_id, &transition).await?;

        info!(
            gate_id = %gate.id,
            player_id = %gate.player_id,
            gate_number = %gate.gate_number,
            approved_by = %actor.user_id,
            "Gate completed"
        );
        self.record(AuditEvent::gate(
            AuditAction::Update,
            &gate.id,
            actor,
            format!("Gate {} completed", gate.gate_number),
        ))
        .await;
        Ok(gate)
    }

    /// Patch notes and/or status of a gate that is not completed.
    ///
    /// Status may only move between `Pending` and `InProgress`; completion
    /// has to go through [`complete`](Self::complete).
    pub async fn update(
        &self,
        gate_id: &GateId,
        patch: GatePatch,
        actor: &ActorContext,
    ) -> GateResult<Gate> {
        let gate = self.load_gate(gate_id).await?;
        reject_if_completed(&gate)?;
        if patch.status == Some(GateStatus::Completed) {
            warn!(gate_id = %gate_id, "update rejected: completion requires the complete action");
            return Err(GateError::InvalidTransition {
                gate_id: gate_id.clone(),
                from: gate.status,
                to: GateStatus::Completed,
            });
        }

        let gate = self
            .store
            .update_gate(gate_id, &patch, Utc::now())
            .await?;

        debug!(gate_id = %gate.id, status = %gate.status, "Gate updated");
        self.record(AuditEvent::gate(
            AuditAction::Update,
            &gate.id,
            actor,
            format!("Updated Gate {}", gate.gate_number),
        ))
        .await;
        Ok(gate)
    }

    /// Delete a gate that is not completed, with its checklist.
    pub async fn delete(&self, gate_id: &GateId, actor: &ActorContext) -> GateResult<()> {
        let gate = self.load_gate(gate_id).await?;
        reject_if_completed(&gate)?;
        self.store.delete_gate(gate_id).await?;

        info!(
            gate_id = %gate_id,
            player_id = %gate.player_id,
            gate_number = %gate.gate_number,
            "Gate deleted"
        );
        self.record(AuditEvent::gate(
            AuditAction::Delete,
            gate_id,
            actor,
            "Gate deleted",
        ))
        .await;
        Ok(())
    }

    pub async fn add_checklist_item(
        &self,
        gate_id: &GateId,
        item: NewChecklistItem,
        actor: &ActorContext,
    ) -> GateResult<ChecklistItem> {
        item.validate()?;
        let gate = self.load_gate(gate_id).await?;
        reject_if_completed(&gate)?;

        let item = self
            .store
            .add_item(item.into_item(gate_id.clone(), Utc::now()))
            .await?;

        debug!(gate_id = %gate_id, item_id = %item.id, mandatory = item.is_mandatory, "Checklist item added");
        self.record(AuditEvent::checklist(
            AuditAction::Create,
            &item.id,
            actor,
            format!("Added checklist item to gate {gate_id}"),
        ))
        .await;
        Ok(item)
    }

    /// Set or clear completion of one item.
    ///
    /// Completing stamps `completed_at`/`completed_by` from `actor`;
    /// reopening clears both.
    pub async fn toggle_checklist_item(
        &self,
        item_id: &ChecklistItemId,
        toggle: ChecklistToggle,
        actor: &ActorContext,
    ) -> GateResult<ChecklistItem> {
        let item = self.load_item(item_id).await?;
        let gate = self.load_gate(&item.gate_id).await?;
        reject_if_completed(&gate)?;

        let item = self
            .store
            .toggle_item(item_id, &toggle, &actor.user_id, Utc::now())
            .await?;

        debug!(
            gate_id = %item.gate_id,
            item_id = %item.id,
            completed = item.is_completed,
            "Checklist item toggled"
        );
        let verb = if item.is_completed { "completed" } else { "unchecked" };
        self.record(AuditEvent::checklist(
            AuditAction::Update,
            &item.id,
            actor,
            format!("Checklist item {verb}: {}", item.item),
        ))
        .await;
        Ok(item)
    }

    pub async fn delete_checklist_item(
        &self,
        item_id: &ChecklistItemId,
        actor: &ActorContext,
    ) -> GateResult<()> {
        let item = self.load_item(item_id).await?;
        let gate = self.load_gate(&item.gate_id).await?;
        reject_if_completed(&gate)?;
        self.store.delete_item(item_id).await?;

        debug!(gate_id = %item.gate_id, item_id = %item_id, "Checklist item deleted");
        self.record(AuditEvent::checklist(
            AuditAction::Delete,
            item_id,
            actor,
            "Checklist item deleted",
        ))
        .await;
        Ok(())
    }

    async fn load_gate(&self, gate_id: &GateId) -> GateResult<Gate> {
        self.store
            .get_gate(gate_id)
            .await?
            .ok_or_else(|| GateError::GateNotFound(gate_id.clone()))
    }

    async fn load_item(&self, item_id: &ChecklistItemId) -> GateResult<ChecklistItem> {
        self.store
            .get_item(item_id)
            .await?
            .ok_or_else(|| GateError::ChecklistItemNotFound(item_id.clone()))
    }

    async fn record(&self, event: AuditEvent) {
        publish(self.audit.as_ref(), event).await;
    }
}

fn reject_if_completed(gate: &Gate) -> GateResult<()> {
    if gate.is_completed() {
        warn!(gate_id = %gate.id, "mutation rejected: gate is completed");
        return Err(GateError::ImmutableCompletedGate(gate.id.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingAuditSink;
    use gate_store::InMemoryGateStore;
    use gate_types::{GateNumber, PlayerId};

    async fn fixture() -> (GateLifecycle, Arc<RecordingAuditSink>, Gate) {
        let store = Arc::new(InMemoryGateStore::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let gate = Gate::new(PlayerId::new("p-1"), GateNumber::Zero, None);
        store.create_gate(gate.clone(), Vec::new()).await.unwrap();
        (GateLifecycle::new(store, audit.clone()), audit, gate)
    }

    fn actor() -> ActorContext {
        ActorContext::new("u-1").with_role("Manager")
    }

    #[tokio::test]
    async fn start_twice_is_an_invalid_transition() {
        let (lifecycle, _, gate) = fixture().await;
        let started = lifecycle.start(&gate.id, &actor(), None).await.unwrap();
        assert_eq!(started.status, GateStatus::InProgress);
        assert!(started.started_at.is_some());

        let err = lifecycle.start(&gate.id, &actor(), None).await.unwrap_err();
        assert!(matches!(
            err,
            GateError::InvalidTransition {
                from: GateStatus::InProgress,
                to: GateStatus::InProgress,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn complete_requires_in_progress() {
        let (lifecycle, _, gate) = fixture().await;
        let err = lifecycle.complete(&gate.id, &actor(), None).await.unwrap_err();
        assert!(matches!(
            err,
            GateError::InvalidTransition {
                from: GateStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn complete_stamps_approver_and_role() {
        let (lifecycle, audit, gate) = fixture().await;
        lifecycle.start(&gate.id, &actor(), None).await.unwrap();
        let done = lifecycle
            .complete(&gate.id, &actor(), Some("all clear".into()))
            .await
            .unwrap();
        assert_eq!(done.status, GateStatus::Completed);
        assert_eq!(done.approved_by.as_ref().map(|u| u.as_str()), Some("u-1"));
        assert_eq!(done.approver_role.as_deref(), Some("Manager"));
        assert_eq!(done.notes.as_deref(), Some("all clear"));

        let details: Vec<String> = audit.events().into_iter().map(|e| e.detail).collect();
        assert_eq!(details, vec!["Gate 0 started", "Gate 0 completed"]);
    }

    #[tokio::test]
    async fn update_cannot_complete_a_gate() {
        let (lifecycle, _, gate) = fixture().await;
        let err = lifecycle
            .update(&gate.id, GatePatch::status(GateStatus::Completed), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidTransition { .. }));

        let moved = lifecycle
            .update(&gate.id, GatePatch::status(GateStatus::InProgress), &actor())
            .await
            .unwrap();
        assert_eq!(moved.status, GateStatus::InProgress);
        assert!(moved.started_at.is_some());
    }

    #[tokio::test]
    async fn empty_notes_keep_the_stored_value() {
        let (lifecycle, _, gate) = fixture().await;
        lifecycle
            .update(&gate.id, GatePatch::notes("first"), &actor())
            .await
            .unwrap();
        let kept = lifecycle
            .update(&gate.id, GatePatch::notes(""), &actor())
            .await
            .unwrap();
        assert_eq!(kept.notes.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn invalid_checklist_text_is_a_validation_error() {
        let (lifecycle, _, gate) = fixture().await;
        let err = lifecycle
            .add_checklist_item(&gate.id, NewChecklistItem::mandatory("   "), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));

        let too_long = "x".repeat(501);
        let err = lifecycle
            .add_checklist_item(&gate.id, NewChecklistItem::mandatory(too_long), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_the_mutation() {
        let (lifecycle, audit, gate) = fixture().await;
        audit.set_failing(true);
        let started = lifecycle.start(&gate.id, &actor(), None).await.unwrap();
        assert_eq!(started.status, GateStatus::InProgress);
        assert!(audit.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (lifecycle, _, _) = fixture().await;
        let err = lifecycle
            .start(&GateId::new("missing"), &actor(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::GateNotFound(_)));

        let err = lifecycle
            .toggle_checklist_item(
                &ChecklistItemId::new("missing"),
                ChecklistToggle::completed(),
                &actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::ChecklistItemNotFound(_)));
    }
}
