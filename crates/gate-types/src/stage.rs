//! Closed enumerations for stages, statuses and lifecycle actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// One of the four fixed, ordered stages of a player's pipeline.
///
/// Serialized as its ordinal (`0..=3`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GateNumber {
    Zero,
    One,
    Two,
    Three,
}

impl GateNumber {
    /// Every stage, in pipeline order.
    pub const ALL: [GateNumber; 4] = [
        GateNumber::Zero,
        GateNumber::One,
        GateNumber::Two,
        GateNumber::Three,
    ];

    /// Number of stages in a pipeline.
    pub const COUNT: usize = 4;

    pub const FIRST: GateNumber = GateNumber::Zero;
    pub const LAST: GateNumber = GateNumber::Three;

    pub fn index(self) -> u8 {
        match self {
            GateNumber::Zero => 0,
            GateNumber::One => 1,
            GateNumber::Two => 2,
            GateNumber::Three => 3,
        }
    }

    /// The stage that must be completed before this one may be created.
    pub fn previous(self) -> Option<GateNumber> {
        match self {
            GateNumber::Zero => None,
            GateNumber::One => Some(GateNumber::Zero),
            GateNumber::Two => Some(GateNumber::One),
            GateNumber::Three => Some(GateNumber::Two),
        }
    }

    pub fn next(self) -> Option<GateNumber> {
        match self {
            GateNumber::Zero => Some(GateNumber::One),
            GateNumber::One => Some(GateNumber::Two),
            GateNumber::Two => Some(GateNumber::Three),
            GateNumber::Three => None,
        }
    }
}

impl TryFrom<u8> for GateNumber {
    type Error = InputError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GateNumber::Zero),
            1 => Ok(GateNumber::One),
            2 => Ok(GateNumber::Two),
            3 => Ok(GateNumber::Three),
            other => Err(InputError::UnknownGateNumber(other.to_string())),
        }
    }
}

impl From<GateNumber> for u8 {
    fn from(value: GateNumber) -> Self {
        value.index()
    }
}

impl FromStr for GateNumber {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| InputError::UnknownGateNumber(s.to_string()))
            .and_then(GateNumber::try_from)
    }
}

impl fmt::Display for GateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Lifecycle status of a gate. `Completed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateStatus {
    Pending,
    InProgress,
    Completed,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GateStatus::Pending => "Pending",
            GateStatus::InProgress => "InProgress",
            GateStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GateStatus::Completed)
    }
}

impl FromStr for GateStatus {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(GateStatus::Pending),
            "InProgress" => Ok(GateStatus::InProgress),
            "Completed" => Ok(GateStatus::Completed),
            other => Err(InputError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested lifecycle step for the advance operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceAction {
    Start,
    Complete,
}

impl AdvanceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AdvanceAction::Start => "start",
            AdvanceAction::Complete => "complete",
        }
    }
}

impl FromStr for AdvanceAction {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(AdvanceAction::Start),
            "complete" => Ok(AdvanceAction::Complete),
            other => Err(InputError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for AdvanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
