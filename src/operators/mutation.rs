//! Mutation operators (spec §2 operators row, §4.4 `ProcessAddV`/`ProcessAddE`/
//! `ProcessDropV`/`ProcessDropE`).

use crate::error::EngineError;
use crate::ids::{eid_item_id, Label, Primitive};
use crate::operators::{ExecContext, Message, MessagePayload, Operator, OperatorKind, Value};
use async_trait::async_trait;

/// Spawns one new vertex per input message, ignoring any input values (the
/// Gremlin analogue is `g.addV('label')` with no upstream traversal).
pub struct AddVertexOperator {
    pub label: Label,
}

#[async_trait]
impl Operator for AddVertexOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::AddVertex
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        let vid = ctx.storage.process_add_v(self.label, ctx.trx_id, ctx.undo).await?;
        ctx.rct_touches.push((Primitive::IV, vid.0));
        Ok(vec![Message::new(msg.header, MessagePayload { history: msg.payload.history, values: vec![Value::Vertex(vid)] })])
    }
}

/// Creates an edge between exactly two vertices. By the time this operator
/// runs, the plan's placeholder fill must have resolved both endpoints into
/// the message's values (spec §4.7: `ADDE` requires exactly one value per
/// placeholder param, for both the `from` and `to` params).
pub struct AddEdgeOperator {
    pub label: Label,
}

#[async_trait]
impl Operator for AddEdgeOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::AddEdge
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        if msg.payload.values.len() != 2 {
            return Err(EngineError::PlaceholderMismatch(format!(
                "AddE requires exactly 2 resolved endpoints, got {}",
                msg.payload.values.len()
            )));
        }
        let from = match msg.payload.values[0] {
            Value::Vertex(v) => v,
            _ => return Err(EngineError::PlaceholderMismatch("AddE 'from' param is not a vertex".into())),
        };
        let to = match msg.payload.values[1] {
            Value::Vertex(v) => v,
            _ => return Err(EngineError::PlaceholderMismatch("AddE 'to' param is not a vertex".into())),
        };
        let eid = crate::ids::EId::new(from, to);
        ctx.storage.process_add_e(eid, self.label, ctx.trx_id, true, ctx.undo).await?;
        ctx.storage.process_add_e(eid, self.label, ctx.trx_id, false, ctx.undo).await?;
        ctx.rct_touches.push((Primitive::IE, eid_item_id(eid)));
        Ok(vec![Message::new(msg.header, MessagePayload { history: msg.payload.history, values: vec![Value::Edge(eid)] })])
    }
}

/// Drops every vertex in the message and collects the edges it cascades
/// into, so the plan can route them to a `DropEdgeOperator` statement (spec
/// §4.4 `ProcessDropV`: "collect connected edges and return them for the
/// caller to enqueue drop_e for each").
pub struct DropVertexOperator;

#[async_trait]
impl Operator for DropVertexOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::DropVertex
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        let mut cascaded = Vec::new();
        for value in &msg.payload.values {
            if let Value::Vertex(vid) = value {
                let edges = ctx.storage.process_drop_v(*vid, ctx.trx_id, ctx.begin_ts, ctx.undo).await?;
                ctx.rct_touches.push((Primitive::DV, vid.0));
                cascaded.extend(edges.into_iter().map(Value::Edge));
            }
        }
        Ok(vec![Message::new(msg.header, MessagePayload { history: msg.payload.history, values: cascaded })])
    }
}

/// Drops every edge in the message from both its out- and in-owner.
pub struct DropEdgeOperator;

#[async_trait]
impl Operator for DropEdgeOperator {
    fn kind(&self) -> OperatorKind {
        OperatorKind::DropEdge
    }

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, EngineError> {
        let mut dropped = Vec::new();
        for value in &msg.payload.values {
            if let Value::Edge(eid) = value {
                ctx.storage.process_drop_e(*eid, ctx.trx_id, true, ctx.undo).await?;
                ctx.storage.process_drop_e(*eid, ctx.trx_id, false, ctx.undo).await?;
                ctx.rct_touches.push((Primitive::DE, eid_item_id(*eid)));
                dropped.push(Value::Edge(*eid));
            }
        }
        Ok(vec![Message::new(msg.header, MessagePayload { history: msg.payload.history, values: dropped })])
    }
}
