//! Membership update dispatcher
//!
//! A single background task drains a FIFO queue of committed server list
//! deltas and pushes each one to every subscribed server. Because the
//! queue is drained strictly in order by one task, no recipient ever
//! observes a higher version before a lower one.
//!
//! Per recipient the protocol is: send the incremental delta when the
//! recipient acknowledged exactly the previous version, otherwise (first
//! contact, version gap, or a `lost_update` reply) push the full list.
//! Unreachable recipients are retried with capped exponential backoff and
//! eventually reported to the failure observer, which re-enters the
//! coordinator's server-down path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};

use crate::common::{CoordinatorConfig, Error, Result};
use crate::coordinator::ids::ServerId;
use crate::coordinator::master_client::MembershipClient;
use crate::proto;
use crate::transport::Transport;

/// A membership subscriber captured at commit time.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub server_id: ServerId,
    pub service_locator: String,
}

/// One committed delta batch, with everything the dispatcher needs:
/// the delta itself, a full snapshot at the same version for fallback
/// pushes, and the recipient set as of the commit.
#[derive(Debug, Clone)]
pub struct MembershipUpdate {
    pub version: u64,
    pub delta: proto::ServerList,
    pub full: proto::ServerList,
    pub recipients: Vec<Recipient>,
}

/// Where the server list hands committed updates. Enqueuing never blocks;
/// it is called under the dispatcher lock.
pub trait UpdateSink: Send + Sync {
    fn enqueue(&self, update: MembershipUpdate);
}

/// Notified when a recipient exhausts its retries.
pub trait FailureObserver: Send + Sync {
    fn server_unreachable(&self, server_id: ServerId, service_locator: &str);
}

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub rpc_timeout: Duration,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self::from(&CoordinatorConfig::default())
    }
}

impl From<&CoordinatorConfig> for UpdaterConfig {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            rpc_timeout: config.rpc_timeout(),
            max_retries: config.updater_max_retries,
            retry_delay: config.updater_retry_delay(),
            max_retry_delay: config.updater_max_retry_delay(),
        }
    }
}

enum Msg {
    Update(MembershipUpdate),
    Sync(oneshot::Sender<()>),
}

/// Handle to the dispatcher task.
pub struct MembershipUpdater {
    tx: mpsc::UnboundedSender<Msg>,
    halted: Arc<AtomicBool>,
    resume: Arc<Notify>,
}

impl MembershipUpdater {
    /// Spawn the dispatcher task. Must run inside a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        config: UpdaterConfig,
        observer: Arc<dyn FailureObserver>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let halted = Arc::new(AtomicBool::new(false));
        let resume = Arc::new(Notify::new());

        let task = UpdaterTask {
            transport,
            config,
            observer,
            halted: halted.clone(),
            resume: resume.clone(),
            acked: HashMap::new(),
        };
        tokio::spawn(task.run(rx));

        Arc::new(Self { tx, halted, resume })
    }

    /// Stop draining the queue. Messages keep accumulating; in-flight
    /// RPCs finish normally.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.halted.store(false, Ordering::SeqCst);
        self.resume.notify_waiters();
    }

    /// Wait until everything enqueued so far has been dispatched.
    pub async fn sync(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Msg::Sync(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl UpdateSink for MembershipUpdater {
    fn enqueue(&self, update: MembershipUpdate) {
        // Send only fails when the task is gone, i.e. at shutdown.
        let _ = self.tx.send(Msg::Update(update));
    }
}

struct UpdaterTask {
    transport: Arc<dyn Transport>,
    config: UpdaterConfig,
    observer: Arc<dyn FailureObserver>,
    halted: Arc<AtomicBool>,
    resume: Arc<Notify>,
    /// Last version each recipient acknowledged.
    acked: HashMap<ServerId, u64>,
}

impl UpdaterTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            self.wait_if_halted().await;
            match msg {
                Msg::Sync(done) => {
                    let _ = done.send(());
                }
                Msg::Update(update) => self.dispatch(update).await,
            }
        }
    }

    async fn wait_if_halted(&self) {
        loop {
            if !self.halted.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.resume.notified();
            if !self.halted.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    async fn dispatch(&mut self, update: MembershipUpdate) {
        for recipient in &update.recipients {
            self.wait_if_halted().await;
            let acked = self.acked.get(&recipient.server_id).copied();
            match Self::update_recipient(
                &self.transport,
                &self.config,
                recipient,
                &update,
                acked,
            )
            .await
            {
                Ok(()) => {
                    self.acked.insert(recipient.server_id, update.version);
                }
                Err(()) => {
                    tracing::error!(
                        "server {} unreachable after {} attempts; declaring it down",
                        recipient.server_id,
                        self.config.max_retries
                    );
                    self.observer
                        .server_unreachable(recipient.server_id, &recipient.service_locator);
                }
            }
        }
    }

    async fn update_recipient(
        transport: &Arc<dyn Transport>,
        config: &UpdaterConfig,
        recipient: &Recipient,
        update: &MembershipUpdate,
        acked: Option<u64>,
    ) -> std::result::Result<(), ()> {
        let mut delay = config.retry_delay;
        for attempt in 1..=config.max_retries {
            match Self::try_update(transport, config, recipient, update, acked).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        "membership update to {} ({}) failed on attempt {}/{}: {}",
                        recipient.server_id,
                        recipient.service_locator,
                        attempt,
                        config.max_retries,
                        e
                    );
                    if attempt == config.max_retries {
                        break;
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(config.max_retry_delay);
                }
            }
        }
        Err(())
    }

    async fn try_update(
        transport: &Arc<dyn Transport>,
        config: &UpdaterConfig,
        recipient: &Recipient,
        update: &MembershipUpdate,
        acked: Option<u64>,
    ) -> Result<()> {
        let session = transport.open_session(&recipient.service_locator).await?;
        let client = MembershipClient::new(session);

        let incremental = acked == Some(update.version - 1);
        if incremental {
            let lost = Self::with_timeout(config, client.update_server_list(&update.delta)).await?;
            if lost {
                tracing::info!(
                    "server {} lost an update; sending whole list",
                    recipient.server_id
                );
                Self::with_timeout(config, client.set_server_list(&update.full)).await?;
            } else {
                tracing::debug!(
                    "server list update {} sent to server {}",
                    update.version,
                    recipient.server_id
                );
            }
        } else {
            Self::with_timeout(config, client.set_server_list(&update.full)).await?;
            tracing::debug!(
                "full server list (version {}) sent to server {}",
                update.version,
                recipient.server_id
            );
        }
        Ok(())
    }

    async fn with_timeout<T>(
        config: &UpdaterConfig,
        future: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(config.rpc_timeout, future)
            .await
            .map_err(|_| Error::Timeout("membership update".to_string()))?
    }
}
