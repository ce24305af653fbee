use thiserror::Error;

/// Errors raised while turning boundary input into domain types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown gate number `{0}` (expected 0, 1, 2 or 3)")]
    UnknownGateNumber(String),

    #[error("unknown gate status `{0}`")]
    UnknownStatus(String),

    #[error("unknown advance action `{0}` (expected start or complete)")]
    UnknownAction(String),

    #[error("invalid checklist item: {0}")]
    InvalidChecklistItem(String),
}
