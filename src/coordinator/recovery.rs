//! Recovery engine seam
//!
//! Tablet recovery itself runs outside the coordinator. The coordinator
//! launches it with the crashed master's will and the current server
//! lists; the engine partitions the will across healthy masters and
//! eventually reports back through TabletsRecovered RPCs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::common::Result;
use crate::coordinator::ids::ServerId;
use crate::proto;

#[async_trait]
pub trait RecoveryEngine: Send + Sync {
    /// Launch recovery of a crashed master. Returns once recovery has
    /// been started, not once it has completed.
    async fn start(
        &self,
        crashed: ServerId,
        will: proto::Tablets,
        masters: proto::ServerList,
        backups: proto::ServerList,
    ) -> Result<()>;
}

/// Engine stand-in for deployments without a recovery executor attached.
/// Crashed masters' tablets stay in the recovering state until an
/// operator intervenes.
pub struct NullRecovery;

#[async_trait]
impl RecoveryEngine for NullRecovery {
    async fn start(
        &self,
        crashed: ServerId,
        will: proto::Tablets,
        _masters: proto::ServerList,
        _backups: proto::ServerList,
    ) -> Result<()> {
        tracing::warn!(
            "no recovery engine attached; {} tablets of server {} stay recovering",
            will.tablet.len(),
            crashed
        );
        Ok(())
    }
}

/// Records every launch; used by tests.
#[derive(Clone)]
pub struct RecoveryStart {
    pub crashed: ServerId,
    pub will: proto::Tablets,
    pub masters: proto::ServerList,
    pub backups: proto::ServerList,
}

#[derive(Default)]
pub struct RecordingRecovery {
    starts: Mutex<Vec<RecoveryStart>>,
}

impl RecordingRecovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn starts(&self) -> Vec<RecoveryStart> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecoveryEngine for RecordingRecovery {
    async fn start(
        &self,
        crashed: ServerId,
        will: proto::Tablets,
        masters: proto::ServerList,
        backups: proto::ServerList,
    ) -> Result<()> {
        self.starts.lock().unwrap().push(RecoveryStart {
            crashed,
            will,
            masters,
            backups,
        });
        Ok(())
    }
}
