//! The engine: wires storage, the status/RCT/dependency services, and the
//! plan dispatch loop together (spec §9 "Global singletons" — one engine per
//! worker owns its own `DataStorage`/`RctTable`/`DependencyReadTable`, shares
//! a `TransactionStatusService` across workers).

use crate::config::EngineConfig;
use crate::ids::{Timestamp, TrxId, TrxType};
use crate::metrics::MetricsCollector;
use crate::operators::terminate::TerminateOperator;
use crate::operators::validation::{ValidationOperator, ValidationStep};
use crate::operators::{ExecContext, Message, MessageHeader, MessagePayload, MsgType, Operator, PerTrxCleanup, Value};
use crate::plan::statement::StatementPlan;
use crate::plan::TransactionPlan;
use crate::storage::DataStorage;
use crate::txn::status::{LocalStatusService, Status};
use crate::txn::{DependencyReadTable, RctTable, TransactionStatusService, UndoLog};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One worker's transactional core: its storage shard, a handle to the
/// (shared) status service, and its own dependency-read and RCT tables.
pub struct Engine {
    pub storage: Arc<DataStorage>,
    pub status: Arc<dyn TransactionStatusService>,
    pub dependency_reads: Arc<DependencyReadTable>,
    pub rct: Arc<RctTable>,
    pub config: EngineConfig,
    pub metrics: MetricsCollector,
}

impl Engine {
    pub fn new(worker_id: u32, config: EngineConfig) -> Self {
        Self::with_status_service(worker_id, config, Arc::new(LocalStatusService::new()))
    }

    /// Construct with an externally-owned status service, for a multi-worker
    /// deployment that shares one status/timestamp authority.
    pub fn with_status_service(worker_id: u32, config: EngineConfig, status: Arc<dyn TransactionStatusService>) -> Self {
        let dependency_reads = Arc::new(DependencyReadTable::new());
        let rct = Arc::new(RctTable::new());
        let storage = Arc::new(DataStorage::new(worker_id, status.clone(), dependency_reads.clone()));
        Engine { storage, status, dependency_reads, rct, config, metrics: MetricsCollector::new() }
    }

    /// Allocate a fresh transaction id and begin-timestamp (spec §4.5).
    pub async fn begin(&self) -> (TrxId, Timestamp) {
        let trx_id = self.status.allocate_trx_id().await;
        let begin_ts = self.status.allocate_timestamp().await;
        (trx_id, begin_ts)
    }

    /// Run a fully-built plan to completion: appends the synthetic
    /// `VALIDATION -> POST_VALIDATION -> TERMINATE` triple (spec §4.7),
    /// dispatches every statement once its dependencies resolve (threading
    /// each statement's output values into its successors), and aborts the
    /// whole transaction the moment any operator call returns an error.
    /// `TERMINATE` runs through the same dispatch loop as any other
    /// statement, so it commits (or aborts) using the very `undo` log the
    /// loop accumulated rather than a throwaway one.
    pub async fn run(
        &self,
        mut plan: TransactionPlan,
        trx_id: TrxId,
        begin_ts: Timestamp,
        kind: TrxType,
        initial_inputs: HashMap<usize, Message>,
    ) -> Result<HashMap<usize, Vec<Message>>, crate::error::EngineError> {
        let _span = tracing::debug_span!("run", trx_id, begin_ts, ?kind).entered();
        let mut undo = UndoLog::new();
        let mut steps: Vec<ValidationStep> = Vec::new();
        let mut rct_touches: Vec<(crate::ids::Primitive, u64)> = Vec::new();

        let validation_op = Arc::new(ValidationOperator::new(self.rct.clone(), self.status.clone(), self.dependency_reads.clone(), self.config.clone()));
        let cleanup: Arc<dyn PerTrxCleanup> = validation_op.clone();
        let terminate_op = Arc::new(TerminateOperator {
            storage: self.storage.clone(),
            status: self.status.clone(),
            rct: self.rct.clone(),
            cleanups: vec![cleanup],
        });
        let validation_stmt = StatementPlan::new(kind).push(validation_op as Arc<dyn Operator>);
        let post_validation_stmt = StatementPlan::new(kind);
        let terminate_stmt = StatementPlan::new(kind).push(terminate_op as Arc<dyn Operator>);
        let (validation_idx, post_idx, terminate_idx) = plan.finalize(validation_stmt, post_validation_stmt, terminate_stmt);

        let mut pending: VecDeque<usize> = plan.next_ready().into_iter().collect();
        let mut outputs: HashMap<usize, Vec<Message>> = HashMap::new();

        let outcome = loop {
            let Some(stmt_idx) = pending.pop_front() else { break Ok(()) };
            let seed = if stmt_idx == post_idx {
                outputs.get(&validation_idx).and_then(|msgs| msgs.first()).cloned()
            } else if stmt_idx == terminate_idx {
                outputs.get(&post_idx).and_then(|msgs| msgs.first()).cloned()
            } else {
                initial_inputs.get(&stmt_idx).cloned()
            }
            .unwrap_or_else(|| Message::new(default_header(trx_id, stmt_idx), MessagePayload::default()));

            let mut current = vec![seed];
            let mut failure = None;
            for op in plan.statements[stmt_idx].operators.clone() {
                let mut next = Vec::new();
                let mut ctx = ExecContext {
                    storage: &self.storage,
                    undo: &mut undo,
                    trx_id,
                    begin_ts,
                    kind,
                    steps: &mut steps,
                    rct_touches: &mut rct_touches,
                };
                for msg in current {
                    match op.execute(&mut ctx, msg).await {
                        Ok(produced) => next.extend(produced),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                if failure.is_some() {
                    break;
                }
                current = next;
            }

            if let Some(err) = failure {
                break Err(err);
            }

            let values: Vec<Value> = current.iter().flat_map(|m| m.payload.values.clone()).collect();
            outputs.insert(stmt_idx, current);
            pending.extend(plan.fill_result(stmt_idx, values));
        };

        match outcome {
            Ok(()) => {
                self.metrics.increment("transactions_dispatched");
                Ok(outputs)
            }
            Err(err) => {
                tracing::warn!(trx_id, error = %err, "aborting transaction");
                self.metrics.increment("transactions_aborted");
                plan.abort();
                self.storage.abort(trx_id, &undo);
                self.status.update_status(trx_id, Status::Aborted).await;
                Err(err)
            }
        }
    }

    /// Sweep MVCC chains whose tombstones are older than every active
    /// transaction's begin-ts (spec §4.4 GC).
    pub fn collect_garbage(&self, min_active_ts: Timestamp) {
        self.storage.collect_garbage(min_active_ts);
    }
}

fn default_header(trx_id: TrxId, stmt_idx: usize) -> MessageHeader {
    MessageHeader { trx_id, query_idx: stmt_idx, step_idx: 0, msg_type: MsgType::Init, parent_worker: 0, parent_thread: 0 }
}
