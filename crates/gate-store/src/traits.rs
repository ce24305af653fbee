use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gate_types::{
    ChecklistItem, ChecklistItemId, ChecklistToggle, Gate, GateFilter, GateId, GateNumber,
    GatePatch, GateTransition, PageRequest, PlayerId, UserId,
};

use crate::StoreResult;

/// Storage interface for gates.
#[async_trait]
pub trait GateRepository: Send + Sync {
    /// Insert a gate and its seed checklist as one unit.
    ///
    /// Fails with `DuplicateGate` if `(player_id, gate_number)` exists, and
    /// with `PredecessorIncomplete` unless gate N-1 exists and is completed.
    async fn create_gate(&self, gate: Gate, checklist: Vec<ChecklistItem>) -> StoreResult<()>;

    async fn get_gate(&self, gate_id: &GateId) -> StoreResult<Option<Gate>>;

    async fn find_gate(
        &self,
        player_id: &PlayerId,
        gate_number: GateNumber,
    ) -> StoreResult<Option<Gate>>;

    /// All gates of one player, `gate_number` ascending.
    async fn list_player_gates(&self, player_id: &PlayerId) -> StoreResult<Vec<Gate>>;

    /// One page of matching gates plus the total match count.
    async fn query_gates(
        &self,
        filter: &GateFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Gate>, u64)>;

    /// Compare-and-set lifecycle step.
    ///
    /// The current status must equal `transition.required_status()`. A
    /// completion additionally fails while mandatory items are open; that
    /// check and the status write are serialized against checklist writes.
    async fn transition_gate(
        &self,
        gate_id: &GateId,
        transition: &GateTransition,
    ) -> StoreResult<Gate>;

    /// Patch a gate that is not completed.
    async fn update_gate(
        &self,
        gate_id: &GateId,
        patch: &GatePatch,
        at: DateTime<Utc>,
    ) -> StoreResult<Gate>;

    /// Delete a gate that is not completed, together with its checklist.
    async fn delete_gate(&self, gate_id: &GateId) -> StoreResult<()>;
}

/// Storage interface for checklist items.
///
/// Every write re-checks that the parent gate is not completed.
#[async_trait]
pub trait ChecklistRepository: Send + Sync {
    async fn add_item(&self, item: ChecklistItem) -> StoreResult<ChecklistItem>;

    async fn get_item(&self, item_id: &ChecklistItemId) -> StoreResult<Option<ChecklistItem>>;

    /// Items of one gate in display order.
    async fn list_items(&self, gate_id: &GateId) -> StoreResult<Vec<ChecklistItem>>;

    /// Items of several gates in display order, for listing views.
    async fn list_items_for_gates(&self, gate_ids: &[GateId]) -> StoreResult<Vec<ChecklistItem>>;

    async fn toggle_item(
        &self,
        item_id: &ChecklistItemId,
        toggle: &ChecklistToggle,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ChecklistItem>;

    async fn delete_item(&self, item_id: &ChecklistItemId) -> StoreResult<()>;
}

/// Unified store bundle used by the pipeline.
pub trait GateStore: GateRepository + ChecklistRepository + Send + Sync {}

impl<T> GateStore for T where T: GateRepository + ChecklistRepository + Send + Sync {}
