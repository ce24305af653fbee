//! Storage contract for the gate pipeline.
//!
//! Lifecycle and orchestration logic never touches a database directly; it
//! talks to a [`GateStore`] handle injected at construction time.
//!
//! Every mutating operation that depends on a read is guarded inside the
//! store as one atomic unit:
//! - gate creation re-checks uniqueness and predecessor completion
//! - completion re-checks open mandatory items
//! - checklist writes re-check that the parent gate is not completed
//!
//! A failed guard surfaces as [`StoreError::Precondition`] so callers see the
//! same outcome whether their own pre-check or the store's re-check tripped.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{Missing, Precondition, StoreError, StoreResult};
pub use memory::InMemoryGateStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresGateStore;
pub use traits::{ChecklistRepository, GateRepository, GateStore};
