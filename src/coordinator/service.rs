//! Coordinator RPC service
//!
//! Owns the authoritative cluster state and implements every RPC the
//! coordinator serves. All state mutation happens under one coarse lock,
//! held only for non-suspending sections; outbound RPCs (tablet pushes,
//! recovery launch) run after the lock is released.
//!
//! Handlers reply through a [`Responder`], which lets HintServerDown
//! answer its caller before recovery starts: the hinted-down server may
//! be the only master, and recovery may synchronously need service from
//! the caller itself.

use std::sync::{Arc, Mutex, Weak};

use prost::Message;
use tokio::sync::oneshot;

use crate::common::{CoordinatorConfig, CoordinatorLog, Error, Result};
use crate::coordinator::ids::{ServerId, ServerStatus, ServiceMask, ServiceType};
use crate::coordinator::master_client::MasterClient;
use crate::coordinator::recovery::RecoveryEngine;
use crate::coordinator::server_list::ServerList;
use crate::coordinator::tablet_map::{Tablet, TabletMap, TabletState, Tables};
use crate::coordinator::updater::{
    FailureObserver, MembershipUpdater, UpdateSink, UpdaterConfig,
};
use crate::proto;
use crate::proto::{Opcode, RequestEnvelope, ResponseEnvelope, RpcStatus};
use crate::transport::Transport;

/// Single-use reply channel for one RPC. Handlers may respond before
/// returning; the dispatcher responds with the handler result otherwise.
pub struct Responder {
    tx: Option<oneshot::Sender<ResponseEnvelope>>,
}

impl Responder {
    pub fn new() -> (Self, oneshot::Receiver<ResponseEnvelope>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Send the response now. Later calls are ignored.
    pub fn respond(&mut self, response: ResponseEnvelope) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(response);
        }
    }

    pub fn responded(&self) -> bool {
        self.tx.is_none()
    }
}

fn ok_response<M: Message>(body: &M) -> ResponseEnvelope {
    ResponseEnvelope {
        status: RpcStatus::Ok as i32,
        payload: body.encode_to_vec(),
        message: String::new(),
    }
}

fn error_response(error: &Error) -> ResponseEnvelope {
    ResponseEnvelope {
        status: error.to_rpc_status() as i32,
        payload: Vec::new(),
        message: error.to_string(),
    }
}

/// Everything behind the dispatcher lock.
pub struct CoordinatorState {
    pub server_list: ServerList,
    pub tablet_map: TabletMap,
    pub tables: Tables,
}

struct RecoveryLaunch {
    crashed: ServerId,
    will: proto::Tablets,
    masters: proto::ServerList,
    backups: proto::ServerList,
}

pub struct CoordinatorService {
    state: Mutex<CoordinatorState>,
    transport: Arc<dyn Transport>,
    recovery: Arc<dyn RecoveryEngine>,
    log: Arc<dyn CoordinatorLog>,
    updater: Arc<MembershipUpdater>,
    rpc_timeout: std::time::Duration,
}

impl CoordinatorService {
    pub fn new(
        transport: Arc<dyn Transport>,
        recovery: Arc<dyn RecoveryEngine>,
        log: Arc<dyn CoordinatorLog>,
        config: &CoordinatorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<CoordinatorService>| {
            let observer = Arc::new(UnreachableEscalation {
                service: weak.clone(),
            });
            let updater =
                MembershipUpdater::spawn(transport.clone(), UpdaterConfig::from(config), observer);
            let state = CoordinatorState {
                server_list: ServerList::new(updater.clone() as Arc<dyn UpdateSink>),
                tablet_map: TabletMap::new(),
                tables: Tables::new(),
            };
            Self {
                state: Mutex::new(state),
                transport,
                recovery,
                log,
                updater,
                rpc_timeout: config.rpc_timeout(),
            }
        })
    }

    pub fn updater(&self) -> &Arc<MembershipUpdater> {
        &self.updater
    }

    /// Run a closure under the dispatcher lock; trackers registered this
    /// way see backfill and live events atomically.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut CoordinatorState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Handle one request. Always responds, through `responder`.
    pub async fn dispatch(&self, request: RequestEnvelope, mut responder: Responder) {
        let opcode = request.opcode();
        tracing::debug!("dispatching {:?}", opcode);

        let result = match opcode {
            Opcode::CreateTable => self.create_table(&request.payload).await,
            Opcode::DropTable => self.drop_table(&request.payload).await,
            Opcode::OpenTable => self.open_table(&request.payload),
            Opcode::EnlistServer => self.enlist_server(&request.payload),
            Opcode::GetServerList => self.get_server_list(&request.payload),
            Opcode::GetTabletMap => self.get_tablet_map(),
            Opcode::HintServerDown => self.hint_server_down(&request.payload, &mut responder).await,
            Opcode::TabletsRecovered => self.tablets_recovered(&request.payload),
            Opcode::Ping => Ok(proto::PingResponse::default().encode_to_vec()),
            _ => Err(Error::Unimplemented(request.opcode)),
        };

        match result {
            Ok(payload) => responder.respond(ResponseEnvelope {
                status: RpcStatus::Ok as i32,
                payload,
                message: String::new(),
            }),
            Err(e) => {
                if responder.responded() {
                    tracing::warn!("{:?} failed after its early response: {}", opcode, e);
                } else {
                    tracing::debug!("{:?} failed: {}", opcode, e);
                    responder.respond(error_response(&e));
                }
            }
        }
    }

    fn enlist_server(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let req = proto::EnlistServerRequest::decode(payload)?;
        let mut st = self.state.lock().unwrap();

        let services = ServiceMask::deserialize(req.service_mask);
        let id = st.server_list.add(
            &req.service_locator,
            services,
            req.expected_read_mbytes_per_sec,
        );

        let record = st.server_list.entry(id)?.serialize().encode_to_vec();
        match self.log.append(&record) {
            Ok(log_id) => st.server_list.set_log_id(id, log_id)?,
            Err(e) => tracing::warn!("durable log append failed for server {}: {}", id, e),
        }

        // The enlistee is excluded: first contact hands it the full list.
        st.server_list.push_updates(Some(id));

        tracing::info!("{} enlisted as server {}", req.service_locator, id);
        Ok(proto::EnlistServerResponse {
            server_id: id.as_u64(),
        }
        .encode_to_vec())
    }

    async fn create_table(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let req = proto::CreateTableRequest::decode(payload)?;
        let done = proto::CreateTableResponse::default().encode_to_vec();

        let push = {
            let mut st = self.state.lock().unwrap();
            let Some(index) = st.server_list.next_master_index(0) else {
                return Err(Error::RetryLater);
            };
            if st.tables.get(&req.name).is_some() {
                return Ok(done);
            }
            let table_id = st.tables.allocate(&req.name).expect("name checked above");

            let (master_id, locator) = {
                let entry = st
                    .server_list
                    .entry_by_index(index)
                    .expect("index from next_master_index");
                (entry.server_id, entry.service_locator.clone())
            };

            st.tablet_map.add_tablet(Tablet {
                table_id,
                start_key: 0,
                end_key: u64::MAX,
                state: TabletState::Normal,
                server_id: master_id,
                service_locator: locator.clone(),
                user_data: 0,
            });

            // The new tablet is empty, so it joins the last existing
            // partition of the master's will rather than opening a new one.
            let will = st.server_list.will_mut(master_id)?;
            let partition_id = will.tablet.last().map(|t| t.user_data).unwrap_or(0);
            will.tablet.push(proto::tablets::Tablet {
                table_id,
                start_key: 0,
                end_key: u64::MAX,
                state: proto::tablets::State::Normal as i32,
                server_id: master_id.as_u64(),
                service_locator: locator.clone(),
                user_data: partition_id,
            });

            tracing::info!("created table '{}' with id {}", req.name, table_id);
            tracing::debug!("{} tablets in the map", st.tablet_map.len());
            (locator, st.tablet_map.serialize())
        };

        self.set_tablets_on(&push.0, &push.1).await;
        Ok(done)
    }

    async fn drop_table(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let req = proto::DropTableRequest::decode(payload)?;
        let done = proto::DropTableResponse::default().encode_to_vec();

        let (locators, map) = {
            let mut st = self.state.lock().unwrap();
            let Some(table_id) = st.tables.remove(&req.name) else {
                return Ok(done);
            };

            let owners = st.tablet_map.table_owners(table_id);
            st.tablet_map.remove_table(table_id);

            // Dropped tablets also leave their owners' wills.
            let mut locators = Vec::new();
            for (id, locator) in owners {
                if let Ok(will) = st.server_list.will_mut(id) {
                    will.tablet.retain(|t| t.table_id != table_id);
                }
                let up = st
                    .server_list
                    .entry(id)
                    .map(|e| e.status == ServerStatus::Up)
                    .unwrap_or(false);
                if up {
                    locators.push(locator);
                }
            }

            tracing::info!("dropped table '{}' with id {}", req.name, table_id);
            tracing::debug!("{} tablets in the map", st.tablet_map.len());
            (locators, st.tablet_map.serialize())
        };

        for locator in &locators {
            self.set_tablets_on(locator, &map).await;
        }
        Ok(done)
    }

    fn open_table(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let req = proto::OpenTableRequest::decode(payload)?;
        let st = self.state.lock().unwrap();
        match st.tables.get(&req.name) {
            Some(table_id) => Ok(proto::OpenTableResponse { table_id }.encode_to_vec()),
            None => Err(Error::TableDoesNotExist(req.name)),
        }
    }

    fn get_server_list(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let req = proto::GetServerListRequest::decode(payload)?;
        let st = self.state.lock().unwrap();
        let filter = ServiceMask::deserialize(req.service_mask);
        Ok(proto::GetServerListResponse {
            server_list: Some(st.server_list.serialize(filter)),
        }
        .encode_to_vec())
    }

    fn get_tablet_map(&self) -> Result<Vec<u8>> {
        let st = self.state.lock().unwrap();
        Ok(proto::GetTabletMapResponse {
            tablets: Some(st.tablet_map.serialize()),
        }
        .encode_to_vec())
    }

    async fn hint_server_down(
        &self,
        payload: &[u8],
        responder: &mut Responder,
    ) -> Result<Vec<u8>> {
        let req = proto::HintServerDownRequest::decode(payload)?;

        // Respond before touching recovery: the hinted-down server may be
        // the only master, and recovery may synchronously require service
        // from the very caller waiting on this RPC.
        responder.respond(ok_response(&proto::HintServerDownResponse::default()));

        let locator = req.service_locator;
        tracing::debug!("hint server down: {}", locator);

        let launch = {
            let mut st = self.state.lock().unwrap();
            if let Some(id) = st.server_list.find_up(&locator, ServiceType::Master) {
                Some(Self::crash_master_locked(&mut st, id)?)
            } else if let Some(id) = st.server_list.find_up(&locator, ServiceType::Backup) {
                st.server_list.remove(id)?;
                st.server_list.push_updates(None);
                tracing::info!("backup {} at {} removed", id, locator);
                None
            } else {
                // Repeated hints for an already-handled server land here.
                tracing::debug!("hint for unknown locator {}; ignoring", locator);
                None
            }
        };

        if let Some(launch) = launch {
            self.launch_recovery(launch).await;
        }
        Ok(proto::HintServerDownResponse::default().encode_to_vec())
    }

    fn tablets_recovered(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let req = proto::TabletsRecoveredRequest::decode(payload)?;
        let dead = ServerId::from_u64(req.server_id);
        let recovered = req.tablets.unwrap_or_default();

        let mut st = self.state.lock().unwrap();
        st.server_list.entry(dead)?;

        // Every new owner must be an UP master.
        for t in &recovered.tablet {
            let owner = ServerId::from_u64(t.server_id);
            let entry = st.server_list.entry(owner)?;
            if entry.status != ServerStatus::Up || !entry.is_master() {
                return Err(Error::InvalidServerId(owner.to_string()));
            }
        }

        st.tablet_map.tablets_recovered(dead, &recovered)?;

        // Recovered tablets join their new owners' wills.
        for t in &recovered.tablet {
            let owner = ServerId::from_u64(t.server_id);
            let will = st.server_list.will_mut(owner)?;
            let partition_id = will.tablet.last().map(|w| w.user_data).unwrap_or(0);
            will.tablet.push(proto::tablets::Tablet {
                table_id: t.table_id,
                start_key: t.start_key,
                end_key: t.end_key,
                state: proto::tablets::State::Normal as i32,
                server_id: t.server_id,
                service_locator: t.service_locator.clone(),
                user_data: partition_id,
            });
        }

        st.server_list.remove(dead)?;
        st.server_list.push_updates(None);

        tracing::info!(
            "{} tablets recovered from server {}; slot reclaimed",
            recovered.tablet.len(),
            dead
        );
        Ok(proto::TabletsRecoveredResponse::default().encode_to_vec())
    }

    fn crash_master_locked(st: &mut CoordinatorState, id: ServerId) -> Result<RecoveryLaunch> {
        let will = st.server_list.will(id)?.clone();
        st.server_list.crashed(id)?;
        st.server_list.push_updates(None);
        let recovering = st.tablet_map.set_recovering(id);
        tracing::info!("master {} crashed; {} tablets recovering", id, recovering);
        Ok(RecoveryLaunch {
            crashed: id,
            will,
            masters: st.server_list.serialize(ServiceMask::MASTER),
            backups: st.server_list.serialize(ServiceMask::BACKUP),
        })
    }

    async fn launch_recovery(&self, launch: RecoveryLaunch) {
        tracing::debug!(
            "launching recovery of {} with {} masters and {} backups",
            launch.crashed,
            launch.masters.server.len(),
            launch.backups.server.len()
        );
        if let Err(e) = self
            .recovery
            .start(launch.crashed, launch.will, launch.masters, launch.backups)
            .await
        {
            tracing::error!("recovery launch for {} failed: {}", launch.crashed, e);
        }
    }

    /// Escalation target for the updater: an unreachable membership
    /// subscriber goes through the same path as a HintServerDown.
    async fn escalate_unreachable(&self, id: ServerId, locator: &str) {
        let launch = {
            let mut st = self.state.lock().unwrap();
            let (still_up, is_master) = match st.server_list.entry(id) {
                Ok(e) => (e.status == ServerStatus::Up, e.is_master()),
                Err(_) => return,
            };
            if !still_up {
                return;
            }
            tracing::warn!("membership subscriber {} at {} unreachable", id, locator);
            if is_master {
                match Self::crash_master_locked(&mut st, id) {
                    Ok(launch) => Some(launch),
                    Err(e) => {
                        tracing::error!("failed to crash unreachable master {}: {}", id, e);
                        None
                    }
                }
            } else {
                if let Err(e) = st.server_list.remove(id) {
                    tracing::error!("failed to remove unreachable server {}: {}", id, e);
                }
                st.server_list.push_updates(None);
                None
            }
        };

        if let Some(launch) = launch {
            self.launch_recovery(launch).await;
        }
    }

    async fn set_tablets_on(&self, locator: &str, map: &proto::Tablets) {
        let result = tokio::time::timeout(self.rpc_timeout, async {
            let session = self.transport.open_session(locator).await?;
            MasterClient::new(session).set_tablets(map).await
        })
        .await
        .unwrap_or_else(|_| Err(Error::Timeout(format!("set_tablets to {locator}"))));

        if let Err(e) = result {
            tracing::warn!("failed to push tablet map to {}: {}", locator, e);
        }
    }
}

struct UnreachableEscalation {
    service: Weak<CoordinatorService>,
}

impl FailureObserver for UnreachableEscalation {
    fn server_unreachable(&self, server_id: ServerId, service_locator: &str) {
        let Some(service) = self.service.upgrade() else {
            return;
        };
        let locator = service_locator.to_string();
        tokio::spawn(async move {
            service.escalate_unreachable(server_id, &locator).await;
        });
    }
}
