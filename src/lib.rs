//! Inspection workflow session - state manager for a guided inspection
//! report workflow.
//!
//! The crate tracks one in-progress project through its workflow steps,
//! charges a client-side credit ledger for paid features, tracks
//! supplementary uploads and the discounts they earn, follows the advanced
//! processing pipeline and keeps a bounded undo history.

pub mod config;
pub mod credits;
pub mod discount;
pub mod logging;
pub mod processing;
pub mod session;
pub mod snapshots;
pub mod state;
pub mod templates;
pub mod uploads;

pub use config::Config;
pub use session::{SessionDeps, SessionError, WorkflowSession};
pub use state::{PersistedSession, SessionStore};
