//! Knowledge-base synchronization for kbsync.
//!
//! This crate reconciles a page's knowledge-base fields with its help-center
//! article: [`snapshot`] reads and writes the page state, [`decision`] picks
//! the remote action, and [`orchestrator`] sequences the two around the
//! remote call.

pub mod decision;
pub mod orchestrator;
pub mod snapshot;

pub use decision::{RemoteEffect, SyncAction, apply_effect, decide};
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use snapshot::PageSnapshot;
