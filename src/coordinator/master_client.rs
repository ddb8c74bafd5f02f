//! Typed clients for coordinator-issued RPCs

use std::sync::Arc;

use prost::Message;

use crate::common::{Error, Result};
use crate::proto::{
    Opcode, RequestEnvelope, ResponseEnvelope, RpcStatus, SetServerListRequest, SetTabletsRequest,
    Tablets, UpdateServerListRequest, UpdateServerListResponse,
};
use crate::transport::Session;

fn call(opcode: Opcode, payload: Vec<u8>) -> RequestEnvelope {
    RequestEnvelope {
        opcode: opcode as i32,
        payload,
    }
}

fn check(response: ResponseEnvelope) -> Result<Vec<u8>> {
    match response.status() {
        RpcStatus::Ok => Ok(response.payload),
        status => Err(Error::from_rpc_status(status, &response.message)),
    }
}

/// Client side of the RPCs a master serves for the coordinator.
pub struct MasterClient {
    session: Arc<dyn Session>,
}

impl MasterClient {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    /// Replace the master's view of the tablet map.
    pub async fn set_tablets(&self, tablets: &Tablets) -> Result<()> {
        let request = call(
            Opcode::SetTablets,
            SetTabletsRequest {
                tablets: Some(tablets.clone()),
            }
            .encode_to_vec(),
        );
        check(self.session.send(request).await?)?;
        Ok(())
    }
}

/// Client side of the membership-subscriber RPCs.
pub struct MembershipClient {
    session: Arc<dyn Session>,
}

impl MembershipClient {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    /// Push an incremental delta. Returns true if the recipient reports
    /// a version gap and needs the full list instead.
    pub async fn update_server_list(&self, delta: &crate::proto::ServerList) -> Result<bool> {
        let request = call(
            Opcode::UpdateServerList,
            UpdateServerListRequest {
                server_list: Some(delta.clone()),
            }
            .encode_to_vec(),
        );
        let payload = check(self.session.send(request).await?)?;
        let response = UpdateServerListResponse::decode(payload.as_slice())?;
        Ok(response.lost_update)
    }

    /// Push the full server list.
    pub async fn set_server_list(&self, full: &crate::proto::ServerList) -> Result<()> {
        let request = call(
            Opcode::SetServerList,
            SetServerListRequest {
                server_list: Some(full.clone()),
            }
            .encode_to_vec(),
        );
        check(self.session.send(request).await?)?;
        Ok(())
    }
}
