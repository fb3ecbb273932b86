//! Timestamp & Transaction Status service (spec §4.5).
//!
//! Assumed external in the spec; this crate ships `LocalStatusService`, a
//! usable in-process implementation, so the engine runs standalone. A real
//! deployment swaps in an RDMA/TCP-backed implementation of the same trait
//! (see [`crate::messaging::StatusTransport`] for the wire-level RPC shape).

use crate::ids::{Timestamp, TrxId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-transaction lifecycle state, local view (spec §4.4 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Processing,
    Validating,
    Committed,
    Aborted,
}

/// The four RPCs the core consumes (spec §4.5 / §6 "Status service protocol").
#[async_trait]
pub trait TransactionStatusService: Send + Sync {
    async fn allocate_trx_id(&self) -> TrxId;
    async fn allocate_timestamp(&self) -> Timestamp;
    async fn read_status(&self, trx_id: TrxId) -> Status;
    /// `(status, commit_ts)`. `commit_ts` is only meaningful once the peer
    /// has entered `Validating` and published a tentative commit-ts.
    async fn read_ct(&self, trx_id: TrxId) -> (Status, Option<Timestamp>);
    async fn update_status(&self, trx_id: TrxId, status: Status);
    /// Publish a tentative commit-ts for a trx entering `Validating`.
    async fn publish_commit_ts(&self, trx_id: TrxId, commit_ts: Timestamp);
}

struct Entry {
    status: Status,
    commit_ts: Option<Timestamp>,
}

/// In-memory status service: a counter for trx ids, a counter for
/// timestamps, and a map of trx-id to lifecycle state.
pub struct LocalStatusService {
    next_trx_id: AtomicU64,
    next_ts: AtomicU64,
    table: Mutex<HashMap<TrxId, Entry>>,
}

impl LocalStatusService {
    pub fn new() -> Self {
        Self { next_trx_id: AtomicU64::new(1), next_ts: AtomicU64::new(1), table: Mutex::new(HashMap::new()) }
    }
}

impl Default for LocalStatusService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStatusService for LocalStatusService {
    async fn allocate_trx_id(&self) -> TrxId {
        let id = self.next_trx_id.fetch_add(1, Ordering::Relaxed);
        self.table.lock().insert(id, Entry { status: Status::Processing, commit_ts: None });
        id
    }

    async fn allocate_timestamp(&self) -> Timestamp {
        self.next_ts.fetch_add(1, Ordering::Relaxed)
    }

    async fn read_status(&self, trx_id: TrxId) -> Status {
        self.table.lock().get(&trx_id).map(|e| e.status).unwrap_or(Status::Aborted)
    }

    async fn read_ct(&self, trx_id: TrxId) -> (Status, Option<Timestamp>) {
        let table = self.table.lock();
        match table.get(&trx_id) {
            Some(e) => (e.status, e.commit_ts),
            None => (Status::Aborted, None),
        }
    }

    async fn update_status(&self, trx_id: TrxId, status: Status) {
        let mut table = self.table.lock();
        table.entry(trx_id).or_insert(Entry { status, commit_ts: None }).status = status;
    }

    async fn publish_commit_ts(&self, trx_id: TrxId, commit_ts: Timestamp) {
        let mut table = self.table.lock();
        let entry = table.entry(trx_id).or_insert(Entry { status: Status::Validating, commit_ts: None });
        entry.commit_ts = Some(commit_ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_roundtrip() {
        let svc = LocalStatusService::new();
        let trx = svc.allocate_trx_id().await;
        assert_eq!(svc.read_status(trx).await, Status::Processing);

        svc.update_status(trx, Status::Validating).await;
        svc.publish_commit_ts(trx, 42).await;
        assert_eq!(svc.read_ct(trx).await, (Status::Validating, Some(42)));

        svc.update_status(trx, Status::Committed).await;
        assert_eq!(svc.read_status(trx).await, Status::Committed);
    }

    #[tokio::test]
    async fn unknown_trx_reads_as_aborted() {
        let svc = LocalStatusService::new();
        assert_eq!(svc.read_status(999).await, Status::Aborted);
    }
}
