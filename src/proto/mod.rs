//! Wire types for the coordinator protocol
//!
//! All structured payloads on the wire are length-prefixed protobuf
//! records. The message structs below are written by hand in the exact
//! shape `prost-build` generates, so they stay interoperable with any
//! peer compiled from the equivalent `.proto` definitions.

/// A snapshot or incremental update of the cluster server list.
///
/// When used as an incremental update, `server` holds only the entries
/// that changed since the previous version.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerList {
    #[prost(message, repeated, tag = "1")]
    pub server: ::prost::alloc::vec::Vec<server_list::Entry>,
    /// Version of the cluster membership this message advances to.
    #[prost(uint64, tag = "2")]
    pub version_number: u64,
}

pub mod server_list {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        /// Bitmask of the services this server runs.
        #[prost(uint32, tag = "1")]
        pub services: u32,
        /// Packed ServerId: generation in the high 32 bits, slot index low.
        #[prost(uint64, tag = "2")]
        pub server_id: u64,
        #[prost(string, tag = "3")]
        pub service_locator: ::prost::alloc::string::String,
        /// Only meaningful for servers running a backup service.
        #[prost(uint32, tag = "4")]
        pub expected_read_mbytes_per_sec: u32,
        #[prost(enumeration = "super::ServerStatus", tag = "5")]
        pub status: i32,
    }
}

/// Lifecycle state of a server entry. Numeric values are fixed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ServerStatus {
    Up = 0,
    Crashed = 1,
    Down = 2,
}

/// A set of tablets: either the cluster tablet map or a master's will.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tablets {
    #[prost(message, repeated, tag = "1")]
    pub tablet: ::prost::alloc::vec::Vec<tablets::Tablet>,
}

pub mod tablets {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Tablet {
        #[prost(uint64, tag = "1")]
        pub table_id: u64,
        #[prost(uint64, tag = "2")]
        pub start_key: u64,
        #[prost(uint64, tag = "3")]
        pub end_key: u64,
        #[prost(enumeration = "State", tag = "4")]
        pub state: i32,
        /// Packed ServerId of the owning master.
        #[prost(uint64, tag = "5")]
        pub server_id: u64,
        #[prost(string, tag = "6")]
        pub service_locator: ::prost::alloc::string::String,
        /// Opaque per-tablet payload; wills store the partition id here.
        #[prost(uint64, tag = "7")]
        pub user_data: u64,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum State {
        Normal = 0,
        Recovering = 1,
    }
}

// === RPC envelope ===

/// Frames every request: 4-byte big-endian length, then this message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestEnvelope {
    #[prost(enumeration = "Opcode", tag = "1")]
    pub opcode: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseEnvelope {
    #[prost(enumeration = "RpcStatus", tag = "1")]
    pub status: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
    /// Human-readable detail for non-OK statuses.
    #[prost(string, tag = "3")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Opcode {
    Invalid = 0,
    // Coordinator-served RPCs.
    CreateTable = 1,
    DropTable = 2,
    OpenTable = 3,
    EnlistServer = 4,
    GetServerList = 5,
    GetTabletMap = 6,
    HintServerDown = 7,
    TabletsRecovered = 8,
    Ping = 9,
    // Coordinator-issued RPCs, served by masters and membership subscribers.
    SetTablets = 16,
    UpdateServerList = 17,
    SetServerList = 18,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RpcStatus {
    Ok = 0,
    TableDoesNotExist = 1,
    InvalidServerId = 2,
    RetryLater = 3,
    Unimplemented = 4,
    RecoveryMismatch = 5,
    MalformedRequest = 6,
    Internal = 7,
}

// === Request / response bodies ===

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateTableRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateTableResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DropTableRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DropTableResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenTableRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenTableResponse {
    #[prost(uint64, tag = "1")]
    pub table_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnlistServerRequest {
    #[prost(uint32, tag = "1")]
    pub service_mask: u32,
    #[prost(uint32, tag = "2")]
    pub expected_read_mbytes_per_sec: u32,
    #[prost(string, tag = "3")]
    pub service_locator: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnlistServerResponse {
    #[prost(uint64, tag = "1")]
    pub server_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetServerListRequest {
    #[prost(uint32, tag = "1")]
    pub service_mask: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetServerListResponse {
    #[prost(message, optional, tag = "1")]
    pub server_list: ::core::option::Option<ServerList>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTabletMapRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTabletMapResponse {
    #[prost(message, optional, tag = "1")]
    pub tablets: ::core::option::Option<Tablets>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HintServerDownRequest {
    #[prost(string, tag = "1")]
    pub service_locator: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HintServerDownResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TabletsRecoveredRequest {
    /// Packed ServerId of the crashed master whose tablets were recovered.
    #[prost(uint64, tag = "1")]
    pub server_id: u64,
    #[prost(message, optional, tag = "2")]
    pub tablets: ::core::option::Option<Tablets>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TabletsRecoveredResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetTabletsRequest {
    #[prost(message, optional, tag = "1")]
    pub tablets: ::core::option::Option<Tablets>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetTabletsResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateServerListRequest {
    #[prost(message, optional, tag = "1")]
    pub server_list: ::core::option::Option<ServerList>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateServerListResponse {
    /// Set when the recipient's version did not match the incremental
    /// update; the sender must follow up with the full list.
    #[prost(bool, tag = "1")]
    pub lost_update: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetServerListRequest {
    #[prost(message, optional, tag = "1")]
    pub server_list: ::core::option::Option<ServerList>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetServerListResponse {}
