//! Approval workflow for domain record writes.
//!
//! Writes go through a [`hook::Writer`]. Changes to approvable fields are
//! captured as a pending [`approval::ApprovalRecord`] and only reach the
//! record once [`engine::ApprovalEngine::approve`] runs. Approved changes can
//! later be rolled back.

pub mod actor;
pub mod approval;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hook;
pub mod record;
pub mod snapshot;
pub(crate) mod store;
pub mod types;
pub mod utils;

pub use actor::{ActorRef, ActorResolver, Anonymous, Session};
pub use approval::{ApprovalQuery, ApprovalRecord, ApprovalState, ChangeKind};
pub use config::{ApprovalConfig, ModelConfig};
pub use engine::{ApprovalEngine, RollbackOutcome};
pub use error::ApprovalError;
pub use events::ApprovalEvent;
pub use hook::WriteOutcome;
pub use types::{FieldMap, ModelRef};
