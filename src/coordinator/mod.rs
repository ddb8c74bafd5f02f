//! Coordinator core
//!
//! The coordinator is the single authoritative process for cluster
//! metadata:
//! - Versioned server list (enlistment, crash, removal)
//! - Tablet map (key range -> master assignment)
//! - Membership update dissemination to subscribed servers
//! - Recovery orchestration when a master is declared down

pub mod ids;
pub mod master_client;
pub mod recovery;
pub mod server;
pub mod server_list;
pub mod service;
pub mod tablet_map;
pub mod tracker;
pub mod updater;

pub use server::Coordinator;
pub use service::{CoordinatorService, Responder};
