//! Coordinator server loop

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::common::{CoordinatorConfig, CoordinatorLog, FileLog, MemoryLog, Result};
use crate::coordinator::recovery::{NullRecovery, RecoveryEngine};
use crate::coordinator::service::{CoordinatorService, Responder};
use crate::proto::{RequestEnvelope, ResponseEnvelope, RpcStatus};
use crate::transport::{read_frame, write_frame, TcpTransport, Transport};

pub struct Coordinator {
    config: CoordinatorConfig,
    recovery: Arc<dyn RecoveryEngine>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            recovery: Arc::new(NullRecovery),
        }
    }

    /// Attach a recovery engine before serving.
    pub fn with_recovery(mut self, recovery: Arc<dyn RecoveryEngine>) -> Self {
        self.recovery = recovery;
        self
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve_with(self, listener: TcpListener) -> Result<()> {
        tracing::info!("Starting coordinator");
        tracing::info!("  RPC endpoint: {}", listener.local_addr()?);
        match &self.config.log_path {
            Some(path) => tracing::info!("  Durable log: {}", path.display()),
            None => tracing::info!("  Durable log: disabled (in-memory)"),
        }

        let log: Arc<dyn CoordinatorLog> = match &self.config.log_path {
            Some(path) => Arc::new(FileLog::open(path)?),
            None => Arc::new(MemoryLog::new()),
        };
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new());
        let service = CoordinatorService::new(transport, self.recovery, log, &self.config);

        tracing::info!("Coordinator ready");

        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!("connection from {}", peer);
            let service = service.clone();
            tokio::spawn(async move {
                handle_connection(service, stream).await;
            });
        }
    }
}

async fn handle_connection(service: Arc<CoordinatorService>, stream: tokio::net::TcpStream) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let request: RequestEnvelope = match read_frame(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!("dropping connection: {}", e);
                return;
            }
        };

        // Dispatch runs detached so the response can be written as soon
        // as the handler produces it, even if the handler keeps working
        // afterwards (HintServerDown launches recovery after replying).
        let (responder, rx) = Responder::new();
        let dispatch_service = service.clone();
        tokio::spawn(async move {
            dispatch_service.dispatch(request, responder).await;
        });

        let response = rx.await.unwrap_or_else(|_| ResponseEnvelope {
            status: RpcStatus::Internal as i32,
            payload: Vec::new(),
            message: "handler dropped without responding".to_string(),
        });
        if let Err(e) = write_frame(&mut writer, &response).await {
            tracing::debug!("dropping connection: {}", e);
            return;
        }
    }
}
