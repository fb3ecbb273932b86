//! Traversal operator (spec §2 operators row), grounded on
//! `original_source/expert/traverse_expert.hpp`'s role: step from a set of
//! vertex ids to their neighbours along `direction`, optionally filtered by
//! edge label.

use crate::error::{EngineError, ReadStatus};
use crate::ids::Label;
use crate::operators::validation::{StepKind, ValidationStep};
use crate::operators::{ExecContext, HistoryEntry, Message, MessagePayload, Operator, OperatorKind, Value};
use crate::storage::row_list::Direction;
use async_trait::async_trait;

pub struct TraversalOperator {
    pub direction: Direction,
    pub label_filter: Option<Label>,
    pub step_key: u32,
}

#[async_trait]
impl Operator for TraversalOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Traversal
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        ctx.steps.push(ValidationStep { operator_kind: OperatorKind::Traversal, step_kind: StepKind::Traverse, only_first: false });
        let mut history = msg.payload.history.clone();
        let mut out_values = Vec::new();
        for value in &msg.payload.values {
            let Value::Vertex(vid) = value else { continue };
            let (status, peers) = ctx
                .storage
                .get_connected_vertex_list(*vid, self.direction, self.label_filter, ctx.trx_id, ctx.begin_ts, ctx.read_only())
                .await;
            match status {
                ReadStatus::Success => {
                    history.push(HistoryEntry { label_step_key: self.step_key, value: Value::Vertex(*vid) });
                    out_values.extend(peers.into_iter().map(Value::Vertex));
                }
                ReadStatus::Abort => return Err(EngineError::DependencyViolation(ctx.trx_id)),
                ReadStatus::NotFound => {}
            }
        }
        Ok(vec![Message::new(msg.header, MessagePayload { history, values: out_values })])
    }
}
