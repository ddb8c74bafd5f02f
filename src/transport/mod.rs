//! Session layer for coordinator RPCs
//!
//! The coordinator both serves RPCs and issues them (tablet pushes,
//! membership updates). Both directions use the same framing: a 4-byte
//! big-endian length prefix followed by a protobuf envelope.
//!
//! `Transport` turns a service locator into a `Session`; a `Session`
//! performs one request/response exchange at a time.

pub mod mock;

pub use mock::MockTransport;

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::common::{Error, Result};
use crate::proto::{RequestEnvelope, ResponseEnvelope};

/// Upper bound on a single frame; a full tablet map for a large cluster
/// stays far below this.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// Write one length-prefixed message.
pub async fn write_frame<M, W>(writer: &mut W, message: &M) -> Result<()>
where
    M: Message,
    W: AsyncWrite + Unpin,
{
    let body = message.encode_to_vec();
    if body.len() > MAX_FRAME_LEN {
        return Err(Error::Transport(format!(
            "frame of {} bytes exceeds limit",
            body.len()
        )));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message. `None` on clean end of stream.
pub async fn read_frame<M, R>(reader: &mut R) -> Result<Option<M>>
where
    M: Message + Default,
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::Transport(format!("frame of {len} bytes exceeds limit")));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(M::decode(body.as_slice())?))
}

/// One request/response channel to a server.
#[async_trait]
pub trait Session: Send + Sync {
    async fn send(&self, request: RequestEnvelope) -> Result<ResponseEnvelope>;

    fn locator(&self) -> &str;
}

/// Resolves service locators to sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open_session(&self, service_locator: &str) -> Result<Arc<dyn Session>>;
}

/// TCP transport. Service locators are plain `host:port` addresses; each
/// send opens a fresh connection, which keeps sessions stateless at the
/// cost of a handshake per RPC.
#[derive(Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open_session(&self, service_locator: &str) -> Result<Arc<dyn Session>> {
        Ok(Arc::new(TcpSession {
            locator: service_locator.to_string(),
        }))
    }
}

struct TcpSession {
    locator: String,
}

#[async_trait]
impl Session for TcpSession {
    async fn send(&self, request: RequestEnvelope) -> Result<ResponseEnvelope> {
        let mut stream = TcpStream::connect(&self.locator)
            .await
            .map_err(|e| Error::Transport(format!("connect {}: {e}", self.locator)))?;
        write_frame(&mut stream, &request).await?;
        match read_frame(&mut stream).await? {
            Some(response) => Ok(response),
            None => Err(Error::Transport(format!(
                "connection closed by {}",
                self.locator
            ))),
        }
    }

    fn locator(&self) -> &str {
        &self.locator
    }
}
