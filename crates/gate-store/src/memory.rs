//! In-memory reference implementation of the gate store.
//!
//! Gates and checklist items share one lock so every guarded operation sees
//! and writes a consistent snapshot of both tables. Deterministic and
//! test-friendly; production deployments use the PostgreSQL adapter.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gate_types::{
    sort_checklist, ChecklistItem, ChecklistItemId, ChecklistToggle, Gate, GateFilter, GateId,
    GateNumber, GatePatch, GateStatus, GateTransition, PageRequest, PlayerId, SortDirection,
    UserId,
};

use crate::traits::{ChecklistRepository, GateRepository};
use crate::{Missing, Precondition, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    gates: HashMap<GateId, Gate>,
    items: HashMap<ChecklistItemId, ChecklistItem>,
}

impl Tables {
    fn gate(&self, gate_id: &GateId) -> StoreResult<&Gate> {
        self.gates
            .get(gate_id)
            .ok_or_else(|| StoreError::NotFound(Missing::Gate(gate_id.clone())))
    }

    fn find(&self, player_id: &PlayerId, gate_number: GateNumber) -> Option<&Gate> {
        self.gates
            .values()
            .find(|g| g.player_id == *player_id && g.gate_number == gate_number)
    }

    fn ensure_open(&self, gate_id: &GateId) -> StoreResult<()> {
        if self.gate(gate_id)?.is_completed() {
            return Err(StoreError::Precondition(Precondition::GateCompleted(
                gate_id.clone(),
            )));
        }
        Ok(())
    }

    fn items_of(&self, gate_id: &GateId) -> Vec<ChecklistItem> {
        let mut items = self
            .items
            .values()
            .filter(|i| i.gate_id == *gate_id)
            .cloned()
            .collect::<Vec<_>>();
        sort_checklist(&mut items);
        items
    }
}

/// In-memory gate store.
#[derive(Default)]
pub struct InMemoryGateStore {
    tables: RwLock<Tables>,
}

impl InMemoryGateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("gate tables lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("gate tables lock poisoned".to_string()))
    }
}

#[async_trait]
impl GateRepository for InMemoryGateStore {
    async fn create_gate(&self, gate: Gate, checklist: Vec<ChecklistItem>) -> StoreResult<()> {
        let mut guard = self.write()?;

        if guard.find(&gate.player_id, gate.gate_number).is_some() {
            return Err(StoreError::DuplicateGate {
                player_id: gate.player_id,
                gate_number: gate.gate_number,
            });
        }

        if let Some(previous) = gate.gate_number.previous() {
            let ready = guard
                .find(&gate.player_id, previous)
                .map(Gate::is_completed)
                .unwrap_or(false);
            if !ready {
                return Err(StoreError::Precondition(
                    Precondition::PredecessorIncomplete {
                        player_id: gate.player_id,
                        gate_number: gate.gate_number,
                    },
                ));
            }
        }

        if guard.gates.contains_key(&gate.id) {
            return Err(StoreError::Conflict(format!("gate {} already exists", gate.id)));
        }

        if let Some(stray) = checklist.iter().find(|item| item.gate_id != gate.id) {
            return Err(StoreError::InvalidInput(format!(
                "checklist item {} does not belong to gate {}",
                stray.id, gate.id
            )));
        }
        for item in checklist {
            guard.items.insert(item.id.clone(), item);
        }
        guard.gates.insert(gate.id.clone(), gate);
        Ok(())
    }

    async fn get_gate(&self, gate_id: &GateId) -> StoreResult<Option<Gate>> {
        Ok(self.read()?.gates.get(gate_id).cloned())
    }

    async fn find_gate(
        &self,
        player_id: &PlayerId,
        gate_number: GateNumber,
    ) -> StoreResult<Option<Gate>> {
        Ok(self.read()?.find(player_id, gate_number).cloned())
    }

    async fn list_player_gates(&self, player_id: &PlayerId) -> StoreResult<Vec<Gate>> {
        let guard = self.read()?;
        let mut gates = guard
            .gates
            .values()
            .filter(|g| g.player_id == *player_id)
            .cloned()
            .collect::<Vec<_>>();
        gates.sort_by_key(|g| g.gate_number);
        Ok(gates)
    }

    async fn query_gates(
        &self,
        filter: &GateFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Gate>, u64)> {
        let guard = self.read()?;
        let mut gates = guard
            .gates
            .values()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect::<Vec<_>>();
        gates.sort_by(|a, b| {
            let ordering = page.sort.compare(a, b);
            match page.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = gates.len() as u64;
        let offset = usize::try_from(page.offset())
            .map_err(|_| StoreError::InvalidInput("page offset too large".to_string()))?;
        let window = gates
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .collect();
        Ok((window, total))
    }

    async fn transition_gate(
        &self,
        gate_id: &GateId,
        transition: &GateTransition,
    ) -> StoreResult<Gate> {
        let mut guard = self.write()?;
        let current = guard.gate(gate_id)?.status;

        if current != transition.required_status() {
            return Err(StoreError::Precondition(Precondition::StatusMismatch {
                gate_id: gate_id.clone(),
                expected: transition.required_status(),
                found: current,
            }));
        }

        if transition.target_status() == GateStatus::Completed {
            let blocking = guard
                .items_of(gate_id)
                .into_iter()
                .filter(ChecklistItem::is_blocking)
                .map(|i| i.id)
                .collect::<Vec<_>>();
            if !blocking.is_empty() {
                return Err(StoreError::Precondition(Precondition::MandatoryItemsOpen {
                    gate_id: gate_id.clone(),
                    blocking,
                }));
            }
        }

        let gate = guard
            .gates
            .get_mut(gate_id)
            .ok_or_else(|| StoreError::NotFound(Missing::Gate(gate_id.clone())))?;
        gate.apply_transition(transition);
        Ok(gate.clone())
    }

    async fn update_gate(
        &self,
        gate_id: &GateId,
        patch: &GatePatch,
        at: DateTime<Utc>,
    ) -> StoreResult<Gate> {
        let mut guard = self.write()?;
        guard.ensure_open(gate_id)?;
        let gate = guard
            .gates
            .get_mut(gate_id)
            .ok_or_else(|| StoreError::NotFound(Missing::Gate(gate_id.clone())))?;
        gate.apply_patch(patch, at);
        Ok(gate.clone())
    }

    async fn delete_gate(&self, gate_id: &GateId) -> StoreResult<()> {
        let mut guard = self.write()?;
        guard.ensure_open(gate_id)?;
        guard.items.retain(|_, item| item.gate_id != *gate_id);
        guard.gates.remove(gate_id);
        Ok(())
    }
}

#[async_trait]
impl ChecklistRepository for InMemoryGateStore {
    async fn add_item(&self, item: ChecklistItem) -> StoreResult<ChecklistItem> {
        let mut guard = self.write()?;
        guard.ensure_open(&item.gate_id)?;
        if guard.items.contains_key(&item.id) {
            return Err(StoreError::Conflict(format!(
                "checklist item {} already exists",
                item.id
            )));
        }
        guard.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn get_item(&self, item_id: &ChecklistItemId) -> StoreResult<Option<ChecklistItem>> {
        Ok(self.read()?.items.get(item_id).cloned())
    }

    async fn list_items(&self, gate_id: &GateId) -> StoreResult<Vec<ChecklistItem>> {
        Ok(self.read()?.items_of(gate_id))
    }

    async fn list_items_for_gates(&self, gate_ids: &[GateId]) -> StoreResult<Vec<ChecklistItem>> {
        let guard = self.read()?;
        let mut items = guard
            .items
            .values()
            .filter(|i| gate_ids.contains(&i.gate_id))
            .cloned()
            .collect::<Vec<_>>();
        sort_checklist(&mut items);
        Ok(items)
    }

    async fn toggle_item(
        &self,
        item_id: &ChecklistItemId,
        toggle: &ChecklistToggle,
        actor: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ChecklistItem> {
        let mut guard = self.write()?;
        let gate_id = guard
            .items
            .get(item_id)
            .map(|i| i.gate_id.clone())
            .ok_or_else(|| StoreError::NotFound(Missing::ChecklistItem(item_id.clone())))?;
        guard.ensure_open(&gate_id)?;

        let item = guard
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(Missing::ChecklistItem(item_id.clone())))?;
        item.apply_toggle(toggle, actor, at);
        Ok(item.clone())
    }

    async fn delete_item(&self, item_id: &ChecklistItemId) -> StoreResult<()> {
        let mut guard = self.write()?;
        let gate_id = guard
            .items
            .get(item_id)
            .map(|i| i.gate_id.clone())
            .ok_or_else(|| StoreError::NotFound(Missing::ChecklistItem(item_id.clone())))?;
        guard.ensure_open(&gate_id)?;
        guard.items.remove(item_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_types::NewChecklistItem;

    fn player() -> PlayerId {
        PlayerId::new("player-1")
    }

    async fn seeded_gate(store: &InMemoryGateStore, number: GateNumber) -> Gate {
        let gate = Gate::new(player(), number, None);
        store.create_gate(gate.clone(), Vec::new()).await.unwrap();
        gate
    }

    async fn complete(store: &InMemoryGateStore, gate_id: &GateId) {
        store
            .transition_gate(
                gate_id,
                &GateTransition::Start {
                    at: Utc::now(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        store
            .transition_gate(
                gate_id,
                &GateTransition::Complete {
                    at: Utc::now(),
                    approved_by: UserId::new("approver"),
                    approver_role: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_gate_rejected() {
        let store = InMemoryGateStore::new();
        seeded_gate(&store, GateNumber::Zero).await;
        let result = store
            .create_gate(Gate::new(player(), GateNumber::Zero, None), Vec::new())
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateGate { .. })));
    }

    #[tokio::test]
    async fn successor_requires_completed_predecessor() {
        let store = InMemoryGateStore::new();
        let zero = seeded_gate(&store, GateNumber::Zero).await;

        let early = store
            .create_gate(Gate::new(player(), GateNumber::One, None), Vec::new())
            .await;
        assert!(matches!(
            early,
            Err(StoreError::Precondition(
                Precondition::PredecessorIncomplete { .. }
            ))
        ));

        complete(&store, &zero.id).await;
        store
            .create_gate(Gate::new(player(), GateNumber::One, None), Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn transition_checks_expected_status() {
        let store = InMemoryGateStore::new();
        let gate = seeded_gate(&store, GateNumber::Zero).await;
        let result = store
            .transition_gate(
                &gate.id,
                &GateTransition::Complete {
                    at: Utc::now(),
                    approved_by: UserId::new("approver"),
                    approver_role: None,
                    notes: None,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(StoreError::Precondition(Precondition::StatusMismatch {
                expected: GateStatus::InProgress,
                found: GateStatus::Pending,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn completion_blocked_by_open_mandatory_item() {
        let store = InMemoryGateStore::new();
        let gate = Gate::new(player(), GateNumber::Zero, None);
        let item = NewChecklistItem::mandatory("Passport scan").into_item(gate.id.clone(), Utc::now());
        let item_id = item.id.clone();
        store.create_gate(gate.clone(), vec![item]).await.unwrap();
        store
            .transition_gate(
                &gate.id,
                &GateTransition::Start {
                    at: Utc::now(),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let result = store
            .transition_gate(
                &gate.id,
                &GateTransition::Complete {
                    at: Utc::now(),
                    approved_by: UserId::new("approver"),
                    approver_role: None,
                    notes: None,
                },
            )
            .await;
        match result {
            Err(StoreError::Precondition(Precondition::MandatoryItemsOpen { blocking, .. })) => {
                assert_eq!(blocking, vec![item_id]);
            }
            other => panic!("expected open mandatory items, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_gate_rejects_checklist_writes_and_delete() {
        let store = InMemoryGateStore::new();
        let gate = seeded_gate(&store, GateNumber::Zero).await;
        let item = store
            .add_item(NewChecklistItem::optional("Kit size").into_item(gate.id.clone(), Utc::now()))
            .await
            .unwrap();
        complete(&store, &gate.id).await;

        let toggle = store
            .toggle_item(
                &item.id,
                &ChecklistToggle::completed(),
                &UserId::new("u"),
                Utc::now(),
            )
            .await;
        assert!(matches!(
            toggle,
            Err(StoreError::Precondition(Precondition::GateCompleted(_)))
        ));
        assert!(store.delete_item(&item.id).await.is_err());
        assert!(store.delete_gate(&gate.id).await.is_err());
        assert!(store
            .update_gate(&gate.id, &GatePatch::notes("late"), Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_gate_cascades_to_checklist() {
        let store = InMemoryGateStore::new();
        let gate = Gate::new(player(), GateNumber::Zero, None);
        let items = vec![
            NewChecklistItem::mandatory("a").into_item(gate.id.clone(), Utc::now()),
            NewChecklistItem::optional("b").into_item(gate.id.clone(), Utc::now()),
        ];
        let first = items[0].id.clone();
        store.create_gate(gate.clone(), items).await.unwrap();

        store.delete_gate(&gate.id).await.unwrap();
        assert!(store.get_gate(&gate.id).await.unwrap().is_none());
        assert!(store.list_items(&gate.id).await.unwrap().is_empty());
        assert!(store.get_item(&first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_pages_and_counts() {
        let store = InMemoryGateStore::new();
        for idx in 0..5 {
            let gate = Gate::new(PlayerId::new(format!("p-{idx}")), GateNumber::Zero, None);
            store.create_gate(gate, Vec::new()).await.unwrap();
        }
        let (page, total) = store
            .query_gates(&GateFilter::new(), &PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (last, _) = store
            .query_gates(&GateFilter::new(), &PageRequest::new(3, 2))
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn unknown_records_report_not_found() {
        let store = InMemoryGateStore::new();
        let missing = store
            .toggle_item(
                &ChecklistItemId::new("nope"),
                &ChecklistToggle::completed(),
                &UserId::new("u"),
                Utc::now(),
            )
            .await;
        assert!(matches!(
            missing,
            Err(StoreError::NotFound(Missing::ChecklistItem(_)))
        ));
        assert!(matches!(
            store.delete_gate(&GateId::new("nope")).await,
            Err(StoreError::NotFound(Missing::Gate(_)))
        ));
    }
}
