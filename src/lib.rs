//! # tabletkv coordinator
//!
//! Cluster coordinator for tabletkv, a distributed in-memory key-value
//! store built from masters (which own tablets, the key ranges of
//! tables) and backups (which hold redundant log segments).
//!
//! The coordinator:
//! - Tracks cluster membership in a versioned server list
//! - Assigns table key ranges to masters in the tablet map
//! - Streams membership updates to subscribed servers, falling back to
//!   full-list pushes when a subscriber lags
//! - Orchestrates recovery when a master is declared down
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────┐
//!                 │        Coordinator        │
//!                 │  server list · tablet map │
//!                 │  membership updater       │
//!                 └──────────┬────────────────┘
//!                            │ RPC
//!          ┌─────────────────┼─────────────────┐
//!          │                 │                 │
//!    ┌─────▼─────┐     ┌─────▼─────┐     ┌─────▼─────┐
//!    │ Master 1  │     │ Master 2  │     │ Backup 1  │
//!    │ (tablets) │     │ (tablets) │     │ (segments)│
//!    └───────────┘     └───────────┘     └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! tabletkv-coord serve --bind 0.0.0.0:5000 --log ./coord.log
//! ```

pub mod common;
pub mod coordinator;
pub mod proto;
pub mod transport;

// Re-export commonly used types
pub use common::{CoordinatorConfig, Error, Result};
pub use coordinator::{Coordinator, CoordinatorService};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
