//! Action ledger
//!
//! The append-only, step-numbered history that export tooling consumes.

pub mod record;
pub mod store;

pub use record::{Action, ActionRecord, ContainerKind, DialogKind, ElementSnapshot, MarkerKind};
pub use store::{ArtifactKind, DeliveryError, Ledger, LedgerError, LedgerPort};
