//! Progress math.
//!
//! Gate progress counts every checklist item, mandatory or optional, while
//! completion is blocked by mandatory items only. Overall progress always
//! divides by the four stages, so a missing gate contributes zero.
//!
//! Rounding is half-up on non-negative values and done in integers.

use gate_types::{ChecklistItem, GateNumber};
use serde::{Deserialize, Serialize};

/// Percentage of completed items, `0` for an empty checklist.
pub fn gate_progress(items: &[ChecklistItem]) -> u8 {
    let completed = items.iter().filter(|item| item.is_completed).count();
    percent(completed, items.len())
}

/// Average over all four stages of the given per-gate percentages.
///
/// Extra values beyond the stage count are ignored.
pub fn overall_progress<I>(gate_percentages: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let stages = GateNumber::COUNT as u32;
    let sum: u32 = gate_percentages
        .into_iter()
        .take(GateNumber::COUNT)
        .map(u32::from)
        .sum();
    // floor(sum / stages + 1/2)
    ((2 * sum + stages) / (2 * stages)) as u8
}

fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let part = part.min(total) as u64;
    let total = total as u64;
    ((200 * part + total) / (2 * total)) as u8
}

/// Counts behind a gate's progress figure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistSummary {
    pub total: usize,
    pub completed: usize,
    pub mandatory: usize,
    pub mandatory_open: usize,
    pub progress: u8,
}

impl ChecklistSummary {
    pub fn of(items: &[ChecklistItem]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            if item.is_completed {
                summary.completed += 1;
            }
            if item.is_mandatory {
                summary.mandatory += 1;
                if !item.is_completed {
                    summary.mandatory_open += 1;
                }
            }
        }
        summary.progress = percent(summary.completed, summary.total);
        summary
    }

    /// Whether completion would pass the mandatory-item check.
    pub fn ready_to_complete(&self) -> bool {
        self.mandatory_open == 0
    }
}
