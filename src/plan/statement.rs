//! A single statement in a transaction plan (spec §4.7): a linear sequence
//! of typed operators ending at a synthetic sentinel, plus the placeholder
//! slots its upstream statements fill in before it runs.

use crate::operators::Operator;
use std::sync::Arc;

/// Which statement kind this is, reusing the transaction-type vocabulary
/// (spec §4.7 ties dependency rules to read-only vs. mutating statements,
/// which is exactly [`crate::ids::TrxType`]'s distinction).
pub type StatementKind = crate::ids::TrxType;

/// One placeholder a statement's operator list exposes for a later
/// statement's results to fill (spec §4.7: `{target_stmt, target_op,
/// target_param}`). Injection policy depends on the target operator: an
/// `Init`-position placeholder splices the values into the input message in
/// place; an `AddEdge` placeholder requires exactly one resolved value per
/// param, else the statement aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderTarget {
    pub target_stmt: usize,
    pub target_op: usize,
    pub target_param: usize,
}

/// A statement: a named, ordered pipeline of operators plus the
/// placeholders other statements need to fill before this one can run.
pub struct StatementPlan {
    pub kind: StatementKind,
    pub operators: Vec<Arc<dyn Operator>>,
    pub placeholders: Vec<PlaceholderTarget>,
}

impl StatementPlan {
    pub fn new(kind: StatementKind) -> Self {
        StatementPlan { kind, operators: Vec::new(), placeholders: Vec::new() }
    }

    pub fn push(mut self, op: Arc<dyn Operator>) -> Self {
        self.operators.push(op);
        self
    }

    pub fn with_placeholder(mut self, target: PlaceholderTarget) -> Self {
        self.placeholders.push(target);
        self
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
