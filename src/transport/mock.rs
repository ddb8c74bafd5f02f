//! Scripted transport for tests
//!
//! Records every outgoing request and answers from a queue of scripted
//! replies. An empty queue answers with a bare OK envelope, so tests only
//! script the exchanges they care about.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost::Message;

use crate::common::{Error, Result};
use crate::proto::{RequestEnvelope, ResponseEnvelope, RpcStatus};
use crate::transport::{Session, Transport};

enum MockReply {
    Reply(ResponseEnvelope),
    Failure(String),
}

/// A request captured by the mock, with the locator it was sent to.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub service_locator: String,
    pub request: RequestEnvelope,
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    sent: Mutex<Vec<SentRequest>>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next reply verbatim.
    pub fn enqueue_reply(&self, response: ResponseEnvelope) {
        self.state
            .replies
            .lock()
            .unwrap()
            .push_back(MockReply::Reply(response));
    }

    /// Script an OK reply carrying `body`.
    pub fn enqueue_ok<M: Message>(&self, body: &M) {
        self.enqueue_reply(ResponseEnvelope {
            status: RpcStatus::Ok as i32,
            payload: body.encode_to_vec(),
            message: String::new(),
        });
    }

    /// Script a transport failure for the next send.
    pub fn enqueue_failure(&self, message: &str) {
        self.state
            .replies
            .lock()
            .unwrap()
            .push_back(MockReply::Failure(message.to_string()));
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.sent.lock().unwrap().clone()
    }

    /// Drain the captured requests.
    pub fn take_sent(&self) -> Vec<SentRequest> {
        std::mem::take(&mut self.state.sent.lock().unwrap())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_session(&self, service_locator: &str) -> Result<Arc<dyn Session>> {
        Ok(Arc::new(MockSession {
            state: self.state.clone(),
            locator: service_locator.to_string(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
    locator: String,
}

#[async_trait]
impl Session for MockSession {
    async fn send(&self, request: RequestEnvelope) -> Result<ResponseEnvelope> {
        self.state.sent.lock().unwrap().push(SentRequest {
            service_locator: self.locator.clone(),
            request,
        });
        match self.state.replies.lock().unwrap().pop_front() {
            Some(MockReply::Reply(response)) => Ok(response),
            Some(MockReply::Failure(message)) => Err(Error::Transport(message)),
            None => Ok(ResponseEnvelope {
                status: RpcStatus::Ok as i32,
                payload: Vec::new(),
                message: String::new(),
            }),
        }
    }

    fn locator(&self) -> &str {
        &self.locator
    }
}
