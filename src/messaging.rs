//! Inter-worker messaging fabric (spec §6 "Inter-worker messages" / "Status
//! service protocol"), modeled as traits so the engine doesn't hard-code a
//! transport. Ships a `tokio::mpsc`-backed `LocalTransport` so the engine
//! runs single-process without a real network.

use crate::ids::{Timestamp, TrxId};
use crate::operators::Message;
use crate::txn::status::Status;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};

/// Send/receive [`Message`]s between workers, addressed by worker id.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, to_worker: u32, msg: Message) -> Result<(), crate::error::EngineError>;
    async fn recv(&self, worker_id: u32) -> Option<Message>;
}

/// The status service's four RPCs, as they'd cross a wire (spec §6): the
/// in-process [`crate::txn::TransactionStatusService`] trait already gives
/// this shape locally, so a real transport is just that trait served over
/// RDMA/TCP. This trait documents the request/response framing a remote
/// caller would use.
#[async_trait]
pub trait StatusTransport: Send + Sync {
    async fn request_trx_id(&self) -> TrxId;
    async fn request_timestamp(&self) -> Timestamp;
    async fn request_status(&self, trx_id: TrxId) -> Status;
    async fn request_ct(&self, trx_id: TrxId) -> (Status, Option<Timestamp>);
}

/// A single-process, `tokio::mpsc`-backed [`MessageTransport`] for running
/// the engine without a real network — useful for tests and single-box
/// deployments.
pub struct LocalTransport {
    inboxes: Mutex<HashMap<u32, mpsc::UnboundedSender<Message>>>,
    receivers: Mutex<HashMap<u32, mpsc::UnboundedReceiver<Message>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        LocalTransport { inboxes: Mutex::new(HashMap::new()), receivers: Mutex::new(HashMap::new()) }
    }

    pub async fn register(&self, worker_id: u32) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().await.insert(worker_id, tx);
        self.receivers.lock().await.insert(worker_id, rx);
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for LocalTransport {
    async fn send(&self, to_worker: u32, msg: Message) -> Result<(), crate::error::EngineError> {
        let inboxes = self.inboxes.lock().await;
        match inboxes.get(&to_worker) {
            Some(tx) => tx.send(msg).map_err(|_| crate::error::EngineError::ProtocolError(format!("worker {to_worker} unreachable"))),
            None => Err(crate::error::EngineError::ProtocolError(format!("worker {to_worker} not registered"))),
        }
    }

    async fn recv(&self, worker_id: u32) -> Option<Message> {
        let mut receivers = self.receivers.lock().await;
        receivers.get_mut(&worker_id)?.recv().await
    }
}
