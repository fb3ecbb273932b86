//! Property read/write operator (spec §2 operators row, §4.4 `GetVP`/`GetEP`/
//! `ProcessModifyVP`/`ProcessModifyEP`/`ProcessDropVP`/`ProcessDropEP`).
//!
//! One operator handles both vertex and edge properties: which storage call
//! it makes depends on whether the incoming value is a `Value::Vertex` or a
//! `Value::Edge`, mirroring how a single Gremlin `.values()`/`.property()`
//! step works over whatever element type reaches it.

use crate::error::{EngineError, ReadStatus};
use crate::ids::{encode_eprop_item, encode_vprop_item, eid_item_id, EPropId, Label, Primitive, VPropId};
use crate::operators::validation::{StepKind, ValidationStep};
use crate::operators::{ExecContext, HistoryEntry, Message, MessagePayload, Operator, OperatorKind, Value};
use async_trait::async_trait;

pub struct PropertyReadOperator {
    pub pkey: Option<Label>,
    pub step_key: u32,
}

#[async_trait]
impl Operator for PropertyReadOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::PropertyRead
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        let step_kind = if self.pkey.is_some() { StepKind::HasKey } else { StepKind::Has };
        ctx.steps.push(ValidationStep { operator_kind: OperatorKind::PropertyRead, step_kind, only_first: false });
        let mut history = msg.payload.history.clone();
        let mut out_values = Vec::new();
        for value in &msg.payload.values {
            match value {
                Value::Vertex(vid) => {
                    let results: Vec<(Label, Vec<u8>)> = match self.pkey {
                        Some(label) => {
                            let (status, bytes) = ctx.storage.get_vp(VPropId { vid: *vid, label }, ctx.trx_id, ctx.begin_ts, ctx.read_only()).await;
                            self.one_or_abort(status, bytes.map(|b| (label, b)))?
                        }
                        None => {
                            let (status, all) = ctx.storage.get_all_vp(*vid, ctx.trx_id, ctx.begin_ts, ctx.read_only()).await;
                            self.check_abort(status)?;
                            all
                        }
                    };
                    for (_, bytes) in results {
                        history.push(HistoryEntry { label_step_key: self.step_key, value: Value::Vertex(*vid) });
                        out_values.push(Value::Bytes(bytes));
                    }
                }
                Value::Edge(eid) => {
                    let results: Vec<(Label, Vec<u8>)> = match self.pkey {
                        Some(label) => {
                            let (status, bytes) = ctx.storage.get_ep(EPropId { eid: *eid, label }, ctx.trx_id, ctx.begin_ts, ctx.read_only()).await;
                            self.one_or_abort(status, bytes.map(|b| (label, b)))?
                        }
                        None => {
                            let (status, all) = ctx.storage.get_all_ep(*eid, ctx.trx_id, ctx.begin_ts, ctx.read_only()).await;
                            self.check_abort(status)?;
                            all
                        }
                    };
                    for (_, bytes) in results {
                        history.push(HistoryEntry { label_step_key: self.step_key, value: Value::Edge(*eid) });
                        out_values.push(Value::Bytes(bytes));
                    }
                }
                _ => {}
            }
        }
        Ok(vec![Message::new(msg.header, MessagePayload { history, values: out_values })])
    }
}

impl PropertyReadOperator {
    fn check_abort(&self, status: ReadStatus) -> Result<(), EngineError> {
        if status == ReadStatus::Abort {
            return Err(EngineError::DependencyViolation(0));
        }
        Ok(())
    }

    fn one_or_abort(&self, status: ReadStatus, found: Option<(Label, Vec<u8>)>) -> Result<Vec<(Label, Vec<u8>)>, EngineError> {
        match status {
            ReadStatus::Abort => Err(EngineError::DependencyViolation(0)),
            ReadStatus::Success => Ok(found.into_iter().collect()),
            ReadStatus::NotFound => Ok(Vec::new()),
        }
    }
}

/// Writes (or, with `drop: true`, removes) one property key on every vertex
/// or edge flowing through the message.
pub struct PropertyWriteOperator {
    pub pkey: Label,
    pub new_value: Vec<u8>,
    pub drop: bool,
}

#[async_trait]
impl Operator for PropertyWriteOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::PropertyWrite
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        let mut out_values = Vec::new();
        for value in &msg.payload.values {
            match value {
                Value::Vertex(vid) => {
                    let pid = VPropId { vid: *vid, label: self.pkey };
                    let item = encode_vprop_item(pid);
                    if self.drop {
                        ctx.storage.process_drop_vp(pid, ctx.trx_id, ctx.begin_ts, ctx.undo).await?;
                        ctx.rct_touches.push((Primitive::DVP, item));
                    } else {
                        ctx.storage.process_modify_vp(pid, &self.new_value, ctx.trx_id, ctx.begin_ts, ctx.undo).await?;
                        ctx.rct_touches.push((Primitive::MVP, item));
                    }
                    out_values.push(Value::Vertex(*vid));
                }
                Value::Edge(eid) => {
                    let pid = EPropId { eid: *eid, label: self.pkey };
                    let item = encode_eprop_item(eid_item_id(*eid), self.pkey);
                    if self.drop {
                        ctx.storage.process_drop_ep(pid, ctx.trx_id, ctx.begin_ts, ctx.undo).await?;
                        ctx.rct_touches.push((Primitive::DEP, item));
                    } else {
                        ctx.storage.process_modify_ep(pid, &self.new_value, ctx.trx_id, ctx.begin_ts, ctx.undo).await?;
                        ctx.rct_touches.push((Primitive::MEP, item));
                    }
                    out_values.push(Value::Edge(*eid));
                }
                _ => {}
            }
        }
        Ok(vec![Message::new(msg.header, MessagePayload { history: msg.payload.history.clone(), values: out_values })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TrxType;
    use crate::operators::{MessageHeader, MsgType};
    use crate::storage::DataStorage;
    use crate::txn::status::LocalStatusService;
    use crate::txn::{DependencyReadTable, UndoLog};
    use std::sync::Arc;

    fn header(trx_id: u64) -> MessageHeader {
        MessageHeader { trx_id, query_idx: 0, step_idx: 0, msg_type: MsgType::Feed, parent_worker: 0, parent_thread: 0 }
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_operators() {
        let storage = DataStorage::new(0, Arc::new(LocalStatusService::new()), Arc::new(DependencyReadTable::new()));
        let mut undo = UndoLog::new();
        let vid = storage.process_add_v(1, 1, &mut undo).await.unwrap();
        storage.commit(1, 10, &undo);

        let write_op = PropertyWriteOperator { pkey: 4, new_value: b"v".to_vec(), drop: false };
        let mut undo2 = UndoLog::new();
        let mut steps2 = Vec::new();
        let mut rct_touches2 = Vec::new();
        let mut ctx = ExecContext {
            storage: &storage,
            undo: &mut undo2,
            trx_id: 2,
            begin_ts: 20,
            kind: TrxType::Update,
            steps: &mut steps2,
            rct_touches: &mut rct_touches2,
        };
        let msg = Message::new(header(2), MessagePayload { history: Vec::new(), values: vec![Value::Vertex(vid)] });
        write_op.execute(&mut ctx, msg).await.unwrap();
        assert_eq!(rct_touches2, vec![(Primitive::MVP, encode_vprop_item(VPropId { vid, label: 4 }))]);
        storage.commit(2, 30, &undo2);

        let read_op = PropertyReadOperator { pkey: Some(4), step_key: 1 };
        let mut undo3 = UndoLog::new();
        let mut steps3 = Vec::new();
        let mut rct_touches3 = Vec::new();
        let mut ctx2 = ExecContext {
            storage: &storage,
            undo: &mut undo3,
            trx_id: 3,
            begin_ts: 40,
            kind: TrxType::ReadOnly,
            steps: &mut steps3,
            rct_touches: &mut rct_touches3,
        };
        let msg2 = Message::new(header(3), MessagePayload { history: Vec::new(), values: vec![Value::Vertex(vid)] });
        let out = read_op.execute(&mut ctx2, msg2).await.unwrap();
        match &out[0].payload.values[..] {
            [Value::Bytes(b)] => assert_eq!(b, b"v"),
            other => panic!("unexpected values: {other:?}"),
        }
        assert_eq!(steps3, vec![ValidationStep { operator_kind: OperatorKind::PropertyRead, step_kind: StepKind::HasKey, only_first: false }]);
    }
}
