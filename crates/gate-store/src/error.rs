use gate_types::{ChecklistItemId, GateId, GateNumber, GateStatus, PlayerId};
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Which record a lookup failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Gate(GateId),
    ChecklistItem(ChecklistItemId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Gate(id) => write!(f, "gate {id}"),
            Missing::ChecklistItem(id) => write!(f, "checklist item {id}"),
        }
    }
}

/// A guard evaluated inside the store's atomic unit that did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Gate N-1 is missing or not completed.
    PredecessorIncomplete {
        player_id: PlayerId,
        gate_number: GateNumber,
    },
    /// The gate was not in the status the transition starts from.
    StatusMismatch {
        gate_id: GateId,
        expected: GateStatus,
        found: GateStatus,
    },
    /// Mandatory checklist items are still open.
    MandatoryItemsOpen {
        gate_id: GateId,
        blocking: Vec<ChecklistItemId>,
    },
    /// The gate is completed and therefore immutable.
    GateCompleted(GateId),
}

impl std::fmt::Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Precondition::PredecessorIncomplete {
                player_id,
                gate_number,
            } => write!(
                f,
                "predecessor of gate {gate_number} for player {player_id} is not completed"
            ),
            Precondition::StatusMismatch {
                gate_id,
                expected,
                found,
            } => write!(f, "gate {gate_id} is {found}, expected {expected}"),
            Precondition::MandatoryItemsOpen { gate_id, blocking } => write!(
                f,
                "gate {gate_id} has {} open mandatory item(s)",
                blocking.len()
            ),
            Precondition::GateCompleted(gate_id) => write!(f, "gate {gate_id} is completed"),
        }
    }
}

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Missing),

    #[error("gate {gate_number} already exists for player {player_id}")]
    DuplicateGate {
        player_id: PlayerId,
        gate_number: GateNumber,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    Precondition(Precondition),

    /// Lock timeout, serialization failure or deadlock. Safe to retry the
    /// whole operation; nothing was written.
    #[error("transient storage failure: {0}")]
    Retryable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}
