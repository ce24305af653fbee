//! Listing filters and pagination.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::gate::Gate;
use crate::ids::PlayerId;
use crate::stage::{GateNumber, GateStatus};

/// Free-text search resolved against gate notes and, optionally, a set of
/// player ids the player registry matched for the same term.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSearch {
    pub term: String,
    #[serde(default)]
    pub player_ids: Vec<PlayerId>,
}

impl GateSearch {
    pub fn matches(&self, gate: &Gate) -> bool {
        let needle = self.term.to_lowercase();
        let notes_hit = gate
            .notes
            .as_deref()
            .map(|n| n.to_lowercase().contains(&needle))
            .unwrap_or(false);
        notes_hit || self.player_ids.contains(&gate.player_id)
    }
}

/// Filter for gate listings. Empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateFilter {
    pub status: Option<GateStatus>,
    pub gate_number: Option<GateNumber>,
    pub player_id: Option<PlayerId>,
    pub search: Option<GateSearch>,
}

impl GateFilter {
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

    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_search(mut self, search: GateSearch) -> Self {
        self.search = Some(search);
        self
    }

    /// Check if a gate matches this filter.
    pub fn matches(&self, gate: &Gate) -> bool {
        if let Some(status) = self.status {
            if gate.status != status {
                return false;
            }
        }

        if let Some(number) = self.gate_number {
            if gate.gate_number != number {
                return false;
            }
        }

        if let Some(ref player_id) = self.player_id {
            if gate.player_id != *player_id {
                return false;
            }
        }

        if let Some(ref search) = self.search {
            if !search.matches(gate) {
                return false;
            }
        }

        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSort {
    #[default]
    GateNumber,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl GateSort {
    pub fn column(self) -> &'static str {
        match self {
            GateSort::GateNumber => "gate_number",
            GateSort::Status => "status",
            GateSort::CreatedAt => "created_at",
            GateSort::UpdatedAt => "updated_at",
        }
    }

    /// Compare two gates on this key. Ties fall back to creation time, then id.
    pub fn compare(self, a: &Gate, b: &Gate) -> Ordering {
        let primary = match self {
            GateSort::GateNumber => a.gate_number.cmp(&b.gate_number),
            GateSort::Status => a.status.as_str().cmp(b.status.as_str()),
            GateSort::CreatedAt => a.created_at.cmp(&b.created_at),
            GateSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        primary
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort: GateSort,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            sort: GateSort::default(),
            direction: SortDirection::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, sort: GateSort, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }

    /// Clamp page to at least 1 and limit into `[1, max_limit]`.
    pub fn clamped(self, max_limit: u32) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, max_limit.max(1)),
            ..self
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let limit_wide = u64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit_wide),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(player: &str, number: GateNumber, notes: Option<&str>) -> Gate {
        Gate::new(PlayerId::new(player), number, notes.map(str::to_string))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(GateFilter::new().matches(&gate("p-1", GateNumber::Two, None)));
    }

    #[test]
    fn filter_combines_criteria() {
        let g = gate("p-1", GateNumber::One, None);
        let filter = GateFilter::new()
            .with_player(PlayerId::new("p-1"))
            .with_gate_number(GateNumber::One)
            .with_status(GateStatus::Pending);
        assert!(filter.matches(&g));
        assert!(!filter
            .clone()
            .with_status(GateStatus::Completed)
            .matches(&g));
    }

    #[test]
    fn search_hits_notes_case_insensitively_or_player_ids() {
        let noted = gate("p-1", GateNumber::Zero, Some("Awaiting Medical"));
        let other = gate("p-2", GateNumber::Zero, None);
        let search = GateSearch {
            term: "medical".into(),
            player_ids: vec![PlayerId::new("p-2")],
        };
        assert!(search.matches(&noted));
        assert!(search.matches(&other));
        assert!(!search.matches(&gate("p-3", GateNumber::Zero, Some("visa"))));
    }

    #[test]
    fn page_request_clamps_and_offsets() {
        let req = PageRequest::new(0, 500).clamped(100);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 100);
        assert_eq!(req.offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn page_meta_rounds_total_pages_up() {
        assert_eq!(PageMeta::new(41, 1, 20).total_pages, 3);
        assert_eq!(PageMeta::new(0, 1, 20).total_pages, 0);
    }
}
