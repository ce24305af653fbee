//! Domain types for the Player Development Gate Pipeline.
//!
//! An athlete moves through four fixed, ordered stages (Gates 0-3). Each gate
//! carries a checklist of mandatory and optional requirements; a gate may only
//! be completed once every mandatory item is done, and gate N may only be
//! created once gate N-1 is completed.
//!
//! This crate holds the vocabulary only: identifiers, the closed stage/status
//! enumerations, gate and checklist records, and listing/pagination inputs.
//! Storage lives in `gate-store`; transition rules live in `gate-pipeline`.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod actor;
pub mod checklist;
pub mod error;
pub mod gate;
pub mod ids;
pub mod query;
pub mod stage;

pub use actor::ActorContext;
pub use checklist::{sort_checklist, ChecklistItem, ChecklistToggle, NewChecklistItem};
pub use error::InputError;
pub use gate::{Gate, GatePatch, GateTransition};
pub use ids::{ChecklistItemId, GateId, PlayerId, UserId};
pub use query::{GateFilter, GateSearch, GateSort, Page, PageMeta, PageRequest, SortDirection};
pub use stage::{AdvanceAction, GateNumber, GateStatus};
