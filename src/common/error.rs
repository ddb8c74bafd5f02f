//! Error types for the tabletkv coordinator

use crate::proto::RpcStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Client errors (surface to the caller as an RPC status) ===
    #[error("Table does not exist: {0}")]
    TableDoesNotExist(String),

    #[error("Invalid server id: {0}")]
    InvalidServerId(String),

    #[error("Retry later: no masters available")]
    RetryLater,

    #[error("Unimplemented request: opcode {0}")]
    Unimplemented(i32),

    // === Consistency failures (operation fails, state unchanged) ===
    #[error("Recovered tablets do not match the recovering set: {0}")]
    RecoveryMismatch(String),

    #[error("Malformed payload: {0}")]
    Decode(#[from] prost::DecodeError),

    // === Transport failures (handled inside the updater) ===
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === I/O and config ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Durable log error: {0}")]
    Log(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RetryLater | Error::Transport(_) | Error::Timeout(_)
        )
    }

    /// Convert to a wire status for RPC responses.
    pub fn to_rpc_status(&self) -> RpcStatus {
        match self {
            Error::TableDoesNotExist(_) => RpcStatus::TableDoesNotExist,
            Error::InvalidServerId(_) => RpcStatus::InvalidServerId,
            Error::RetryLater => RpcStatus::RetryLater,
            Error::Unimplemented(_) => RpcStatus::Unimplemented,
            Error::RecoveryMismatch(_) => RpcStatus::RecoveryMismatch,
            Error::Decode(_) => RpcStatus::MalformedRequest,
            _ => RpcStatus::Internal,
        }
    }

    /// Reconstruct an error from a non-OK wire status.
    pub fn from_rpc_status(status: RpcStatus, message: &str) -> Self {
        match status {
            RpcStatus::Ok => Error::Internal("OK status is not an error".into()),
            RpcStatus::TableDoesNotExist => Error::TableDoesNotExist(message.to_string()),
            RpcStatus::InvalidServerId => Error::InvalidServerId(message.to_string()),
            RpcStatus::RetryLater => Error::RetryLater,
            RpcStatus::Unimplemented => Error::Unimplemented(0),
            RpcStatus::RecoveryMismatch => Error::RecoveryMismatch(message.to_string()),
            RpcStatus::MalformedRequest => Error::Internal(format!("malformed: {message}")),
            RpcStatus::Internal => Error::Internal(message.to_string()),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}
