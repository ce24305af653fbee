use gate_store::{Missing, Precondition, StoreError};
use gate_types::{ChecklistItemId, GateId, GateNumber, GateStatus, InputError, PlayerId};
use thiserror::Error;

/// Result type for pipeline operations.
pub type GateResult<T> = Result<T, GateError>;

/// Errors from the gate pipeline.
///
/// Each variant carries enough detail for the caller to render a specific
/// message without re-reading state.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("gate not found: {0}")]
    GateNotFound(GateId),

    #[error("checklist item not found: {0}")]
    ChecklistItemNotFound(ChecklistItemId),

    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("gate {gate_number} already exists for player {player_id}")]
    Conflict {
        player_id: PlayerId,
        gate_number: GateNumber,
    },

    #[error("gate {gate_number} for player {player_id} requires gate {required} to be completed first")]
    OutOfOrder {
        player_id: PlayerId,
        gate_number: GateNumber,
        required: GateNumber,
    },

    #[error("invalid transition for gate {gate_id}: {from} -> {to}")]
    InvalidTransition {
        gate_id: GateId,
        from: GateStatus,
        to: GateStatus,
    },

    #[error(
        "gate {gate_id} cannot be completed: {} mandatory checklist item(s) incomplete",
        .blocking.len()
    )]
    IncompleteMandatoryItems {
        gate_id: GateId,
        blocking: Vec<ChecklistItemId>,
    },

    #[error("gate {0} is completed and can no longer be modified")]
    ImmutableCompletedGate(GateId),

    #[error("transient storage failure, retry the operation: {0}")]
    Retryable(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("collaborator failure: {0}")]
    Collaborator(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Coarse classification shared with the calling layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    OutOfOrder,
    InvalidTransition,
    IncompleteMandatoryItems,
    ImmutableCompletedGate,
    Retryable,
    Validation,
    Collaborator,
    Storage,
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::GateNotFound(_)
            | GateError::ChecklistItemNotFound(_)
            | GateError::PlayerNotFound(_) => ErrorKind::NotFound,
            GateError::Conflict { .. } => ErrorKind::Conflict,
            GateError::OutOfOrder { .. } => ErrorKind::OutOfOrder,
            GateError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            GateError::IncompleteMandatoryItems { .. } => ErrorKind::IncompleteMandatoryItems,
            GateError::ImmutableCompletedGate(_) => ErrorKind::ImmutableCompletedGate,
            GateError::Retryable(_) => ErrorKind::Retryable,
            GateError::Validation(_) => ErrorKind::Validation,
            GateError::Collaborator(_) => ErrorKind::Collaborator,
            GateError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether re-running the whole operation may succeed. The pipeline
    /// itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Retryable(_))
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(Missing::Gate(id)) => GateError::GateNotFound(id),
            StoreError::NotFound(Missing::ChecklistItem(id)) => GateError::ChecklistItemNotFound(id),
            StoreError::DuplicateGate {
                player_id,
                gate_number,
            } => GateError::Conflict {
                player_id,
                gate_number,
            },
            StoreError::Precondition(precondition) => precondition.into(),
            StoreError::Retryable(msg) => GateError::Retryable(msg),
            StoreError::InvalidInput(msg) => GateError::Validation(msg),
            StoreError::Conflict(msg) => GateError::Storage(format!("conflict: {msg}")),
            StoreError::Serialization(msg) | StoreError::Backend(msg) => GateError::Storage(msg),
        }
    }
}

impl From<Precondition> for GateError {
    fn from(precondition: Precondition) -> Self {
        match precondition {
            Precondition::PredecessorIncomplete {
                player_id,
                gate_number,
            } => GateError::OutOfOrder {
                player_id,
                required: gate_number.previous().unwrap_or(GateNumber::FIRST),
                gate_number,
            },
            Precondition::StatusMismatch {
                gate_id,
                expected,
                found,
            } => GateError::InvalidTransition {
                gate_id,
                from: found,
                to: successor(expected),
            },
            Precondition::MandatoryItemsOpen { gate_id, blocking } => {
                GateError::IncompleteMandatoryItems { gate_id, blocking }
            }
            Precondition::GateCompleted(gate_id) => GateError::ImmutableCompletedGate(gate_id),
        }
    }
}

impl From<InputError> for GateError {
    fn from(err: InputError) -> Self {
        GateError::Validation(err.to_string())
    }
}

/// Status a transition leads to, given the status it starts from.
fn successor(from: GateStatus) -> GateStatus {
    match from {
        GateStatus::Pending => GateStatus::InProgress,
        GateStatus::InProgress | GateStatus::Completed => GateStatus::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_guards_map_onto_domain_kinds() {
        let out_of_order: GateError = StoreError::Precondition(Precondition::PredecessorIncomplete {
            player_id: PlayerId::new("p-1"),
            gate_number: GateNumber::Two,
        })
        .into();
        match out_of_order {
            GateError::OutOfOrder { required, .. } => assert_eq!(required, GateNumber::One),
            other => panic!("unexpected: {other:?}"),
        }

        let mismatch: GateError = StoreError::Precondition(Precondition::StatusMismatch {
            gate_id: GateId::new("g-1"),
            expected: GateStatus::Pending,
            found: GateStatus::InProgress,
        })
        .into();
        match mismatch {
            GateError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, GateStatus::InProgress);
                assert_eq!(to, GateStatus::InProgress);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let completed: GateError =
            StoreError::Precondition(Precondition::GateCompleted(GateId::new("g-1"))).into();
        assert_eq!(completed.kind(), ErrorKind::ImmutableCompletedGate);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(GateError::from(StoreError::Retryable("40001".into())).is_retryable());
        assert!(!GateError::from(StoreError::Backend("down".into())).is_retryable());
        assert!(!GateError::from(StoreError::DuplicateGate {
            player_id: PlayerId::new("p-1"),
            gate_number: GateNumber::Zero,
        })
        .is_retryable());
    }

    #[test]
    fn blocking_count_is_rendered() {
        let err = GateError::IncompleteMandatoryItems {
            gate_id: GateId::new("g-1"),
            blocking: vec![ChecklistItemId::new("a"), ChecklistItemId::new("b")],
        };
        assert!(err.to_string().contains("2 mandatory checklist item(s)"));
    }
}
