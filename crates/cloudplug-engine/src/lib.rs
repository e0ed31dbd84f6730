//! cloudplug reconciliation engine
//!
//! Provider-neutral building blocks for turning eventually consistent cloud
//! control planes into synchronous, batch-oriented create/terminate actions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            orchestration layer / CLI            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ plugin + action + raw JSON
//! ┌─────────────────▼───────────────────────────────┐
//! │                cloudplug-engine                 │
//! │  Registry ─► Action (read/check/run)            │
//! │                 │                               │
//! │           BatchExecutor (abort | continue)      │
//! │                 │ per item                      │
//! │     ensure_state ─► mutation ─► poll_until      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │   provider crates (remote clients + handlers)   │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod batch;
pub mod error;
pub mod guard;
pub mod params;
pub mod poll;
pub mod registry;

// Re-exports
pub use action::{Action, ActionReport, BatchInput, BatchOutputs, DynAction};
pub use batch::{
    BatchExecutor, BatchOutput, BatchReport, FailurePolicy, ItemFailure, ItemStatus, ResultCode,
};
pub use error::{CloudError, Result};
pub use guard::{Desired, Guard, ensure_state};
pub use params::{ConnectionSource, ProviderParams};
pub use poll::{Observed, PollPolicy, Progress, Target, await_target, poll_until};
pub use registry::{Registry, RegistryBuilder};
