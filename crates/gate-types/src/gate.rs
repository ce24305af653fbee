use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GateId, PlayerId, UserId};
use crate::stage::{GateNumber, GateStatus};

/// One stage of one player's development pipeline.
///
/// At most one gate exists per `(player_id, gate_number)`. `gate_number` is
/// fixed at creation. Once `status` is `Completed` the gate and its checklist
/// are immutable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    pub id: GateId,
    pub player_id: PlayerId,
    pub gate_number: GateNumber,
    pub status: GateStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    pub approver_role: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gate {
    /// A fresh `Pending` gate.
    pub fn new(player_id: PlayerId, gate_number: GateNumber, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: GateId::generate(),
            player_id,
            gate_number,
            status: GateStatus::Pending,
            started_at: None,
            completed_at: None,
            approved_by: None,
            approver_role: None,
            notes: notes.filter(|n| !n.is_empty()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == GateStatus::Completed
    }

    /// Apply a lifecycle transition. Callers check `transition.required_status()`
    /// against the current status first; this only writes the fields.
    pub fn apply_transition(&mut self, transition: &GateTransition) {
        match transition {
            GateTransition::Start { at, notes } => {
                self.status = GateStatus::InProgress;
                self.started_at = Some(*at);
                overwrite_notes(&mut self.notes, notes.as_deref());
                self.updated_at = *at;
            }
            GateTransition::Complete {
                at,
                approved_by,
                approver_role,
                notes,
            } => {
                self.status = GateStatus::Completed;
                self.completed_at = Some(*at);
                self.approved_by = Some(approved_by.clone());
                self.approver_role = approver_role.clone();
                overwrite_notes(&mut self.notes, notes.as_deref());
                self.updated_at = *at;
            }
        }
    }

    /// Apply a free-form patch. Status edges are validated by the lifecycle.
    pub fn apply_patch(&mut self, patch: &GatePatch, at: DateTime<Utc>) {
        if let Some(status) = patch.status {
            if status == GateStatus::InProgress && self.started_at.is_none() {
                self.started_at = Some(at);
            }
            self.status = status;
        }
        overwrite_notes(&mut self.notes, patch.notes.as_deref());
        self.updated_at = at;
    }
}

/// A provided, non-empty note replaces the stored one; anything else keeps it.
fn overwrite_notes(current: &mut Option<String>, incoming: Option<&str>) {
    if let Some(notes) = incoming.filter(|n| !n.is_empty()) {
        *current = Some(notes.to_string());
    }
}

/// A lifecycle step with everything needed to stamp the gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GateTransition {
    Start {
        at: DateTime<Utc>,
        notes: Option<String>,
    },
    Complete {
        at: DateTime<Utc>,
        approved_by: UserId,
        approver_role: Option<String>,
        notes: Option<String>,
    },
}

impl GateTransition {
    /// Status the gate must hold for this transition to apply.
    pub fn required_status(&self) -> GateStatus {
        match self {
            GateTransition::Start { .. } => GateStatus::Pending,
            GateTransition::Complete { .. } => GateStatus::InProgress,
        }
    }

    pub fn target_status(&self) -> GateStatus {
        match self {
            GateTransition::Start { .. } => GateStatus::InProgress,
            GateTransition::Complete { .. } => GateStatus::Completed,
        }
    }
}

/// Partial update of a non-completed gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatePatch {
    #[serde(default)]
    pub status: Option<GateStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl GatePatch {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            status: None,
            notes: Some(notes.into()),
        }
    }

    pub fn status(status: GateStatus) -> Self {
        Self {
            status: Some(status),
            notes: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_gate() -> Gate {
        Gate::new(PlayerId::new("p-1"), GateNumber::Zero, Some("intake".into()))
    }

    #[test]
    fn new_gate_is_pending_and_unstamped() {
        let gate = pending_gate();
        assert_eq!(gate.status, GateStatus::Pending);
        assert!(gate.started_at.is_none());
        assert!(gate.completed_at.is_none());
        assert!(gate.approved_by.is_none());
    }

    #[test]
    fn start_stamps_started_at_and_keeps_notes_when_absent() {
        let mut gate = pending_gate();
        let at = Utc::now();
        gate.apply_transition(&GateTransition::Start { at, notes: None });
        assert_eq!(gate.status, GateStatus::InProgress);
        assert_eq!(gate.started_at, Some(at));
        assert_eq!(gate.notes.as_deref(), Some("intake"));
    }

    #[test]
    fn complete_records_approver() {
        let mut gate = pending_gate();
        gate.apply_transition(&GateTransition::Start {
            at: Utc::now(),
            notes: None,
        });
        let transition = GateTransition::Complete {
            at: Utc::now(),
            approved_by: UserId::new("u-9"),
            approver_role: Some("Manager".into()),
            notes: Some("signed off".into()),
        };
        assert_eq!(transition.required_status(), GateStatus::InProgress);
        gate.apply_transition(&transition);
        assert!(gate.is_completed());
        assert_eq!(gate.approved_by, Some(UserId::new("u-9")));
        assert_eq!(gate.approver_role.as_deref(), Some("Manager"));
        assert_eq!(gate.notes.as_deref(), Some("signed off"));
    }

    #[test]
    fn empty_notes_never_overwrite() {
        let mut gate = pending_gate();
        gate.apply_patch(&GatePatch::notes(""), Utc::now());
        assert_eq!(gate.notes.as_deref(), Some("intake"));
    }

    #[test]
    fn patch_to_in_progress_stamps_start_once() {
        let mut gate = pending_gate();
        let first = Utc::now();
        gate.apply_patch(&GatePatch::status(GateStatus::InProgress), first);
        gate.apply_patch(&GatePatch::status(GateStatus::Pending), Utc::now());
        gate.apply_patch(&GatePatch::status(GateStatus::InProgress), Utc::now());
        assert_eq!(gate.started_at, Some(first));
    }
}
