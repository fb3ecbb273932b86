//! Typed dataflow operators (spec §2 operators row, §6 "Inter-worker
//! messages"): units that consume one message, call into storage, and emit
//! zero or more messages.
//!
//! Grounded on the teacher's `core/block.rs::Block` trait shape
//! (`async_trait`, a `kind`/metadata accessor plus an `execute` method),
//! generalized from the teacher's port-wired dataflow blocks to this spec's
//! message-passing header.

pub mod mutation;
pub mod property;
pub mod terminate;
pub mod traversal;
pub mod validation;

use crate::ids::{EId, Label, Primitive, Timestamp, TrxId, TrxType, VId};
use crate::operators::validation::ValidationStep;
use crate::storage::DataStorage;
use crate::txn::UndoLog;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Inter-worker message kind (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Spawn,
    Feed,
    Barrier,
    Exit,
    Abort,
    Commit,
    Init,
}

/// Header carried by every inter-worker message (spec §6 verbatim field
/// list).
#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    pub trx_id: TrxId,
    pub query_idx: usize,
    pub step_idx: usize,
    pub msg_type: MsgType,
    pub parent_worker: u32,
    pub parent_thread: u32,
}

/// A value flowing through operator history/results: either a graph id or a
/// raw property byte string, tagged for `select`/`where`/`as` semantics.
#[derive(Debug, Clone)]
pub enum Value {
    Vertex(VId),
    Edge(EId),
    Bytes(Vec<u8>),
    Label(Label),
}

/// One `(label_step_key, tagged_value)` history entry (spec §6).
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub label_step_key: u32,
    pub value: Value,
}

/// A message's payload: accumulated history plus the current step's values.
#[derive(Debug, Clone, Default)]
pub struct MessagePayload {
    pub history: Vec<HistoryEntry>,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: MessagePayload,
    pub correlation_id: Uuid,
}

impl Message {
    pub fn new(header: MessageHeader, payload: MessagePayload) -> Self {
        Message { header, payload, correlation_id: Uuid::new_v4() }
    }
}

/// Which typed unit an operator is, used by the plan to stamp statements and
/// by validation's step-level conflict check to classify reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Traversal,
    PropertyRead,
    PropertyWrite,
    AddVertex,
    AddEdge,
    DropVertex,
    DropEdge,
    Validation,
    PostValidation,
    Terminate,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Everything an operator needs to execute one message: a storage handle, the
/// trx's own undo log, the trx's identity/kind, and the two accumulators the
/// plan's final `VALIDATION`/`TERMINATE` statements consult — every read
/// operator records the [`ValidationStep`] it performed into `steps`, and
/// every mutation operator records the `(Primitive, item_id)` pair it touched
/// into `rct_touches` (spec §4.8 step 4, §4.9 RCT publication).
pub struct ExecContext<'a> {
    pub storage: &'a DataStorage,
    pub undo: &'a mut UndoLog,
    pub trx_id: TrxId,
    pub begin_ts: Timestamp,
    pub kind: TrxType,
    pub steps: &'a mut Vec<ValidationStep>,
    pub rct_touches: &'a mut Vec<(Primitive, u64)>,
}

impl<'a> ExecContext<'a> {
    pub fn read_only(&self) -> bool {
        self.kind.is_read_only()
    }
}

/// A typed dataflow unit (spec §2's operators row). Grounded on
/// `core/block.rs::Block`'s `async_trait` execute method, minus the teacher's
/// UI-facing documentation/port-wiring fields (no counterpart in this spec).
#[async_trait]
pub trait Operator: Send + Sync {
    fn kind(&self) -> OperatorKind;

    async fn execute(&self, ctx: &mut ExecContext<'_>, msg: Message) -> Result<Vec<Message>, crate::error::EngineError>;
}

/// Capability implemented by operators that keep per-transaction scratch
/// state (spec §9 "Cyclic ownership between operators and the commit
/// operator" — replaces a hard-coded map of operator-kind to operator
/// instance with a capability the engine iterates at commit/abort time).
pub trait PerTrxCleanup: Send + Sync {
    fn clean_trx_data(&self, trx_id: TrxId);
}
