use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::ids::{ChecklistItemId, GateId, UserId};

/// Longest accepted requirement text, in characters.
pub const MAX_ITEM_LEN: usize = 500;

/// A single requirement within a gate.
///
/// `completed_at`/`completed_by` are set only while `is_completed` is true.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub gate_id: GateId,
    pub item: String,
    pub is_mandatory: bool,
    pub is_completed: bool,
    pub assigned_to: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<UserId>,
    pub evidence_url: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl ChecklistItem {
    /// Set or clear completion, then apply the optional evidence/notes fields.
    ///
    /// An empty `evidence_url` clears the stored reference.
    pub fn apply_toggle(&mut self, toggle: &ChecklistToggle, actor: &UserId, at: DateTime<Utc>) {
        self.is_completed = toggle.is_completed;
        if toggle.is_completed {
            self.completed_at = Some(at);
            self.completed_by = Some(actor.clone());
        } else {
            self.completed_at = None;
            self.completed_by = None;
        }
        if let Some(url) = &toggle.evidence_url {
            self.evidence_url = Some(url.clone()).filter(|u| !u.is_empty());
        }
        if let Some(notes) = &toggle.notes {
            self.notes = Some(notes.clone()).filter(|n| !n.is_empty());
        }
    }

    /// Mandatory and still open: blocks completion of the parent gate.
    pub fn is_blocking(&self) -> bool {
        self.is_mandatory && !self.is_completed
    }

    /// Display order: `sort_order`, then creation time, then id.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.sort_order
            .cmp(&other.sort_order)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sort a checklist into its stable display order.
pub fn sort_checklist(items: &mut [ChecklistItem]) {
    items.sort_by(ChecklistItem::display_cmp);
}

/// Input for a new checklist item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChecklistItem {
    pub item: String,
    #[serde(default = "default_mandatory")]
    pub is_mandatory: bool,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_mandatory() -> bool {
    true
}

impl NewChecklistItem {
    pub fn mandatory(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            is_mandatory: true,
            assigned_to: None,
            sort_order: 0,
            notes: None,
        }
    }

    pub fn optional(item: impl Into<String>) -> Self {
        Self {
            is_mandatory: false,
            ..Self::mandatory(item)
        }
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn assigned_to(mut self, user: impl Into<UserId>) -> Self {
        self.assigned_to = Some(user.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), InputError> {
        let text = self.item.trim();
        if text.is_empty() {
            return Err(InputError::InvalidChecklistItem(
                "item text is required".to_string(),
            ));
        }
        if text.chars().count() > MAX_ITEM_LEN {
            return Err(InputError::InvalidChecklistItem(format!(
                "item text exceeds {MAX_ITEM_LEN} characters"
            )));
        }
        if self.sort_order < 0 {
            return Err(InputError::InvalidChecklistItem(
                "sort order must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Materialize as an open item under `gate_id`.
    pub fn into_item(self, gate_id: GateId, at: DateTime<Utc>) -> ChecklistItem {
        ChecklistItem {
            id: ChecklistItemId::generate(),
            gate_id,
            item: self.item.trim().to_string(),
            is_mandatory: self.is_mandatory,
            is_completed: false,
            assigned_to: self.assigned_to,
            completed_at: None,
            completed_by: None,
            evidence_url: None,
            notes: self.notes.filter(|n| !n.is_empty()),
            sort_order: self.sort_order,
            created_at: at,
        }
    }
}

/// Completion toggle for one checklist item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistToggle {
    pub is_completed: bool,
    #[serde(default)]
    pub evidence_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ChecklistToggle {
    pub fn completed() -> Self {
        Self {
            is_completed: true,
            evidence_url: None,
            notes: None,
        }
    }

    pub fn reopened() -> Self {
        Self {
            is_completed: false,
            ..Self::completed()
        }
    }

    pub fn with_evidence(mut self, url: impl Into<String>) -> Self {
        self.evidence_url = Some(url.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(sort_order: i32) -> ChecklistItem {
        NewChecklistItem::mandatory("Medical clearance")
            .with_sort_order(sort_order)
            .into_item(GateId::new("g-1"), Utc::now())
    }

    #[test]
    fn toggle_round_trip_restores_open_state() {
        let mut entry = item(0);
        let before = entry.clone();
        let actor = UserId::new("u-1");

        entry.apply_toggle(&ChecklistToggle::completed(), &actor, Utc::now());
        assert!(entry.is_completed);
        assert_eq!(entry.completed_by, Some(actor.clone()));
        assert!(entry.completed_at.is_some());

        entry.apply_toggle(&ChecklistToggle::reopened(), &actor, Utc::now());
        assert_eq!(entry, before);
    }

    #[test]
    fn empty_evidence_clears_reference() {
        let mut entry = item(0);
        let actor = UserId::new("u-1");
        entry.apply_toggle(
            &ChecklistToggle::completed().with_evidence("s3://docs/passport.pdf"),
            &actor,
            Utc::now(),
        );
        assert_eq!(entry.evidence_url.as_deref(), Some("s3://docs/passport.pdf"));

        entry.apply_toggle(&ChecklistToggle::completed().with_evidence(""), &actor, Utc::now());
        assert!(entry.evidence_url.is_none());
    }

    #[test]
    fn display_order_uses_sort_order_then_creation() {
        let now = Utc::now();
        let mut late = item(1);
        late.created_at = now + Duration::seconds(5);
        let mut early = item(1);
        early.created_at = now;
        let first = item(0);

        let mut items = vec![late.clone(), early.clone(), first.clone()];
        sort_checklist(&mut items);
        assert_eq!(items[0].id, first.id);
        assert_eq!(items[1].id, early.id);
        assert_eq!(items[2].id, late.id);
    }

    #[test]
    fn validation_rejects_blank_and_oversized_text() {
        assert!(NewChecklistItem::mandatory("  ").validate().is_err());
        assert!(NewChecklistItem::mandatory("x".repeat(MAX_ITEM_LEN + 1))
            .validate()
            .is_err());
        assert!(NewChecklistItem::optional("Agent contract signed")
            .with_sort_order(-1)
            .validate()
            .is_err());
        assert!(NewChecklistItem::optional("Agent contract signed")
            .validate()
            .is_ok());
    }

    #[test]
    fn new_item_defaults_to_mandatory_when_deserialized() {
        let parsed: NewChecklistItem = serde_json::from_str(r#"{"item":"Passport copy"}"#).unwrap();
        assert!(parsed.is_mandatory);
        assert_eq!(parsed.sort_order, 0);
    }

    #[test]
    fn blocking_means_mandatory_and_open() {
        let mut entry = item(0);
        assert!(entry.is_blocking());
        entry.is_mandatory = false;
        assert!(!entry.is_blocking());
    }
}
