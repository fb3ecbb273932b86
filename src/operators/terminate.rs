//! Terminate operator (spec §4.9): the plan's final step, dispatching on
//! whether the transaction committed or aborted.

use crate::error::EngineError;
use crate::ids::{Timestamp, TrxId};
use crate::operators::PerTrxCleanup;
use crate::storage::DataStorage;
use crate::txn::status::Status;
use crate::txn::{RctTable, TransactionStatusService, UndoLog};
use std::sync::Arc;

pub enum Outcome {
    Commit { commit_ts: Timestamp },
    Abort,
}

pub struct TerminateOperator {
    pub storage: Arc<DataStorage>,
    pub status: Arc<dyn TransactionStatusService>,
    pub rct: Arc<RctTable>,
    pub cleanups: Vec<Arc<dyn PerTrxCleanup>>,
}

impl TerminateOperator {
    /// Finish `trx_id`: on commit, persist every touched MVCC chain and
    /// record its RCT footprint; on abort, unwind the undo log. Either way,
    /// mark the final lifecycle state and sweep per-trx scratch state.
    pub async fn finish(&self, trx_id: TrxId, outcome: Outcome, undo: &UndoLog, rct_touches: &[(crate::ids::Primitive, u64)]) -> Result<(), EngineError> {
        match outcome {
            Outcome::Commit { commit_ts } => {
                self.storage.commit(trx_id, commit_ts, undo);
                for (primitive, item) in rct_touches {
                    self.rct.insert_recent_action_set(*primitive, trx_id, [*item]);
                }
                self.status.update_status(trx_id, Status::Committed).await;
            }
            Outcome::Abort => {
                self.storage.abort(trx_id, undo);
                self.status.update_status(trx_id, Status::Aborted).await;
            }
        }
        for cleanup in &self.cleanups {
            cleanup.clean_trx_data(trx_id);
        }
        Ok(())
    }
}

/// Wires the plan's `TERMINATE` statement to [`TerminateOperator::finish`].
/// The outcome is read off the message header's [`crate::operators::MsgType`]
/// (`Commit` carries the commit-ts as the first `Value::Bytes` in the
/// payload, written there by the `VALIDATION` statement immediately before
/// this one runs); RCT footprint recording is left empty here since the
/// per-primitive item ids are plan-level bookkeeping the engine attaches,
/// not something this generic wiring can recover from a message alone.
#[async_trait::async_trait]
impl crate::operators::Operator for TerminateOperator {
    fn kind(&self) -> crate::operators::OperatorKind {
        crate::operators::OperatorKind::Terminate
    }

    async fn execute(
        &self,
        ctx: &mut crate::operators::ExecContext<'_>,
        msg: crate::operators::Message,
    ) -> Result<Vec<crate::operators::Message>, EngineError> {
        let outcome = match msg.header.msg_type {
            crate::operators::MsgType::Abort => Outcome::Abort,
            _ => {
                let commit_ts = match msg.payload.values.first() {
                    Some(crate::operators::Value::Bytes(b)) if b.len() == 8 => {
                        let mut buf = [0u8; 8];
                        buf.copy_from_slice(b);
                        Timestamp::from_le_bytes(buf)
                    }
                    _ => self.status.allocate_timestamp().await,
                };
                Outcome::Commit { commit_ts }
            }
        };
        self.finish(ctx.trx_id, outcome, ctx.undo, ctx.rct_touches.as_slice()).await?;
        Ok(vec![crate::operators::Message::new(msg.header, crate::operators::MessagePayload::default())])
    }
}
