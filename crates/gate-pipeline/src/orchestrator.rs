use std::collections::HashMap;
use std::sync::Arc;

use gate_store::{ChecklistRepository, GateRepository, GateStore};
use gate_types::{
    ActorContext, ChecklistItem, Gate, GateFilter, GateId, GateNumber, GateSearch, GateSort,
    GateStatus, NewChecklistItem, Page, PageMeta, PageRequest, PlayerId, SortDirection,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PaginationConfig;
use crate::error::{GateError, GateResult};
use crate::events::{publish, AuditAction, AuditEvent};
use crate::lifecycle::GateLifecycle;
use crate::progress::{gate_progress, overall_progress};
use crate::templates::default_checklist;
use crate::traits::{AuditSink, PlayerDirectory};

/// Gate plus its checklist and derived progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDetail {
    #[serde(flatten)]
    pub gate: Gate,
    pub checklist: Vec<ChecklistItem>,
    pub progress: u8,
}

impl GateDetail {
    fn new(gate: Gate, checklist: Vec<ChecklistItem>) -> Self {
        let progress = gate_progress(&checklist);
        Self {
            gate,
            checklist,
            progress,
        }
    }
}

/// A player's four-stage view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPipeline {
    pub player_id: PlayerId,
    /// Existing gates, `gate_number` ascending.
    pub gates: Vec<GateDetail>,
    pub overall_progress: u8,
    pub current_gate_number: GateNumber,
}

/// Request to create one gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGate {
    pub player_id: PlayerId,
    pub gate_number: GateNumber,
    #[serde(default)]
    pub notes: Option<String>,
    /// Items inserted together with the gate.
    #[serde(default)]
    pub checklist: Vec<NewChecklistItem>,
}

impl CreateGate {
    pub fn new(player_id: impl Into<PlayerId>, gate_number: GateNumber) -> Self {
        Self {
            player_id: player_id.into(),
            gate_number,
            notes: None,
            checklist: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_item(mut self, item: NewChecklistItem) -> Self {
        self.checklist.push(item);
        self
    }
}

/// Options for [`PipelineOrchestrator::initialize_gate`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeOptions {
    /// Start the gate right after creation.
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Listing query across all players.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGates {
    pub status: Option<GateStatus>,
    pub gate_number: Option<GateNumber>,
    pub player_id: Option<PlayerId>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: GateSort,
    #[serde(default)]
    pub direction: SortDirection,
}

impl ListGates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: GateStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_gate_number(mut self, number: GateNumber) -> Self {
        self.gate_number = Some(number);
        self
    }

    pub fn with_player(mut self, player_id: impl Into<PlayerId>) -> Self {
        self.player_id = Some(player_id.into());
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    pub fn sorted_by(mut self, sort: GateSort, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }
}

/// Entry point for creation and read views; lifecycle calls go through
/// [`lifecycle`](Self::lifecycle).
pub struct PipelineOrchestrator {
    store: Arc<dyn GateStore>,
    players: Arc<dyn PlayerDirectory>,
    audit: Arc<dyn AuditSink>,
    lifecycle: GateLifecycle,
    pagination: PaginationConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<dyn GateStore>,
        players: Arc<dyn PlayerDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let lifecycle = GateLifecycle::new(store.clone(), audit.clone());
        Self {
            store,
            players,
            audit,
            lifecycle,
            pagination: PaginationConfig::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn lifecycle(&self) -> &GateLifecycle {
        &self.lifecycle
    }

    /// Create a gate after checking the player, uniqueness and ordering.
    ///
    /// The store repeats the uniqueness and ordering checks atomically with
    /// the insert, so concurrent requests for the same stage cannot both
    /// succeed.
    pub async fn create_gate(
        &self,
        request: CreateGate,
        actor: &ActorContext,
    ) -> GateResult<GateDetail> {
        let detail = format!(
            "Created Gate {} for player {}",
            request.gate_number, request.player_id
        );
        self.insert_gate(request, actor, detail).await
    }

    /// Create a gate seeded with the stage's default checklist, optionally
    /// starting it.
    pub async fn initialize_gate(
        &self,
        player_id: &PlayerId,
        gate_number: GateNumber,
        options: InitializeOptions,
        actor: &ActorContext,
    ) -> GateResult<GateDetail> {
        let request = CreateGate {
            player_id: player_id.clone(),
            gate_number,
            notes: options.notes,
            checklist: default_checklist(gate_number),
        };
        let detail = format!(
            "Initialized Gate {gate_number} for player {player_id} with default checklist"
        );
        let mut created = self.insert_gate(request, actor, detail).await?;

        if options.auto_start {
            created.gate = self.lifecycle.start(&created.gate.id, actor, None).await?;
        }
        Ok(created)
    }

    async fn insert_gate(
        &self,
        request: CreateGate,
        actor: &ActorContext,
        audit_detail: String,
    ) -> GateResult<GateDetail> {
        for item in &request.checklist {
            item.validate()?;
        }
        self.ensure_player(&request.player_id).await?;

        let CreateGate {
            player_id,
            gate_number,
            notes,
            checklist,
        } = request;

        if self.store.find_gate(&player_id, gate_number).await?.is_some() {
            warn!(
                player_id = %player_id,
                gate_number = %gate_number,
                "create rejected: gate already exists"
            );
            return Err(GateError::Conflict {
                player_id,
                gate_number,
            });
        }

        if let Some(required) = gate_number.previous() {
            let ready = self
                .store
                .find_gate(&player_id, required)
                .await?
                .is_some_and(|gate| gate.is_completed());
            if !ready {
                warn!(
                    player_id = %player_id,
                    gate_number = %gate_number,
                    "create rejected: previous gate not completed"
                );
                return Err(GateError::OutOfOrder {
                    player_id,
                    gate_number,
                    required,
                });
            }
        }

        let gate = Gate::new(player_id, gate_number, notes);
        let now = gate.created_at;
        let items: Vec<ChecklistItem> = checklist
            .into_iter()
            .map(|item| item.into_item(gate.id.clone(), now))
            .collect();

        self.store.create_gate(gate.clone(), items.clone()).await?;

        info!(
            gate_id = %gate.id,
            player_id = %gate.player_id,
            gate_number = %gate.gate_number,
            items = items.len(),
            "Gate created"
        );
        publish(
            self.audit.as_ref(),
            AuditEvent::gate(AuditAction::Create, &gate.id, actor, audit_detail),
        )
        .await;

        let mut items = items;
        gate_types::sort_checklist(&mut items);
        Ok(GateDetail::new(gate, items))
    }

    /// All gates of a player with progress and the current stage.
    pub async fn get_player_pipeline(&self, player_id: &PlayerId) -> GateResult<PlayerPipeline> {
        self.ensure_player(player_id).await?;

        let gates = self.store.list_player_gates(player_id).await?;
        let gates = self.attach_checklists(gates).await?;

        let overall = overall_progress(gates.iter().map(|detail| detail.progress));
        let current = current_gate_number(gates.iter().map(|detail| &detail.gate));

        debug!(
            player_id = %player_id,
            gates = gates.len(),
            overall_progress = overall,
            current_gate = %current,
            "Player pipeline loaded"
        );
        Ok(PlayerPipeline {
            player_id: player_id.clone(),
            gates,
            overall_progress: overall,
            current_gate_number: current,
        })
    }

    pub async fn get_gate(&self, gate_id: &GateId) -> GateResult<GateDetail> {
        let gate = self
            .store
            .get_gate(gate_id)
            .await?
            .ok_or_else(|| GateError::GateNotFound(gate_id.clone()))?;
        let checklist = self.store.list_items(gate_id).await?;
        Ok(GateDetail::new(gate, checklist))
    }

    /// Paginated listing, `gate_number` ascending unless sorted otherwise.
    pub async fn list_gates(&self, query: ListGates) -> GateResult<Page<GateDetail>> {
        let mut filter = GateFilter {
            status: query.status,
            gate_number: query.gate_number,
            player_id: query.player_id,
            search: None,
        };
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let player_ids = self
                .players
                .search_players(term)
                .await
                .map_err(|e| GateError::Collaborator(e.to_string()))?;
            filter.search = Some(GateSearch {
                term: term.to_string(),
                player_ids,
            });
        }

        let page = PageRequest::new(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(self.pagination.default_limit),
        )
        .sorted_by(query.sort, query.direction)
        .clamped(self.pagination.max_limit);

        let (gates, total) = self.store.query_gates(&filter, &page).await?;
        let data = self.attach_checklists(gates).await?;

        debug!(total, page = page.page, limit = page.limit, "Gates listed");
        Ok(Page {
            data,
            meta: PageMeta::new(total, page.page, page.limit),
        })
    }

    async fn ensure_player(&self, player_id: &PlayerId) -> GateResult<()> {
        let exists = self
            .players
            .player_exists(player_id)
            .await
            .map_err(|e| GateError::Collaborator(e.to_string()))?;
        if !exists {
            return Err(GateError::PlayerNotFound(player_id.clone()));
        }
        Ok(())
    }

    async fn attach_checklists(&self, gates: Vec<Gate>) -> GateResult<Vec<GateDetail>> {
        if gates.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<GateId> = gates.iter().map(|gate| gate.id.clone()).collect();
        let mut by_gate: HashMap<GateId, Vec<ChecklistItem>> = HashMap::new();
        for item in self.store.list_items_for_gates(&ids).await? {
            by_gate.entry(item.gate_id.clone()).or_default().push(item);
        }
        Ok(gates
            .into_iter()
            .map(|gate| {
                let mut checklist = by_gate.remove(&gate.id).unwrap_or_default();
                gate_types::sort_checklist(&mut checklist);
                GateDetail::new(gate, checklist)
            })
            .collect())
    }
}

/// One past the highest completed gate, capped at the last stage; `0` when
/// nothing is completed.
pub fn current_gate_number<'a, I>(gates: I) -> GateNumber
where
    I: IntoIterator<Item = &'a Gate>,
{
    gates
        .into_iter()
        .filter(|gate| gate.is_completed())
        .map(|gate| gate.gate_number)
        .max()
        .map(|highest| highest.next().unwrap_or(GateNumber::LAST))
        .unwrap_or(GateNumber::FIRST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gate_types::GateTransition;

    fn gate(number: GateNumber, status: GateStatus) -> Gate {
        let mut gate = Gate::new(PlayerId::new("p-1"), number, None);
        if status != GateStatus::Pending {
            gate.apply_transition(&GateTransition::Start {
                at: Utc::now(),
                notes: None,
            });
        }
        if status == GateStatus::Completed {
            gate.apply_transition(&GateTransition::Complete {
                at: Utc::now(),
                approved_by: "u-1".into(),
                approver_role: None,
                notes: None,
            });
        }
        gate
    }

    #[test]
    fn current_gate_is_one_past_highest_completed() {
        assert_eq!(current_gate_number(std::iter::empty()), GateNumber::Zero);
        assert_eq!(
            current_gate_number(&[gate(GateNumber::Zero, GateStatus::InProgress)]),
            GateNumber::Zero
        );
        assert_eq!(
            current_gate_number(&[
                gate(GateNumber::Zero, GateStatus::Completed),
                gate(GateNumber::One, GateStatus::Pending),
            ]),
            GateNumber::One
        );
    }

    #[test]
    fn current_gate_is_capped_at_the_last_stage() {
        let all: Vec<Gate> = GateNumber::ALL
            .iter()
            .map(|n| gate(*n, GateStatus::Completed))
            .collect();
        assert_eq!(current_gate_number(&all), GateNumber::Three);
    }
}
