//! Transaction plan (spec §4.7): the statement DAG, its dependency counts,
//! and inter-statement result placeholders.

use crate::operators::Value;
use crate::plan::statement::{PlaceholderTarget, StatementPlan};
use std::collections::{HashMap, HashSet};

/// A DAG of [`StatementPlan`]s. `deps[i]` is the number of not-yet-completed
/// predecessors statement `i` still waits on; `topo[i]` is the statements
/// that become one dependency closer to ready when `i` completes.
pub struct TransactionPlan {
    pub statements: Vec<StatementPlan>,
    deps: HashMap<usize, usize>,
    topo: HashMap<usize, Vec<usize>>,
    results: HashMap<usize, Vec<Value>>,
    dispatched: HashSet<usize>,
    aborted: bool,
}

impl TransactionPlan {
    pub fn new() -> Self {
        TransactionPlan {
            statements: Vec::new(),
            deps: HashMap::new(),
            topo: HashMap::new(),
            results: HashMap::new(),
            dispatched: HashSet::new(),
            aborted: false,
        }
    }

    pub fn add_statement(&mut self, stmt: StatementPlan) -> usize {
        let idx = self.statements.len();
        self.deps.insert(idx, 0);
        self.topo.insert(idx, Vec::new());
        self.statements.push(stmt);
        idx
    }

    /// `stmt_idx` gains one more predecessor: `depends_on`.
    pub fn add_dependency(&mut self, stmt_idx: usize, depends_on: usize) {
        *self.deps.entry(stmt_idx).or_insert(0) += 1;
        self.topo.entry(depends_on).or_default().push(stmt_idx);
    }

    /// Register that `producer`'s results fill one of `target`'s params, and
    /// record the placeholder on the target statement itself.
    pub fn add_placeholder(&mut self, producer: usize, target: PlaceholderTarget) {
        self.statements[target.target_stmt].placeholders.push(target);
        self.add_dependency(target.target_stmt, producer);
    }

    /// Statements with zero remaining dependencies that have not yet been
    /// dispatched.
    pub fn next_ready(&self) -> Vec<usize> {
        if self.aborted {
            return Vec::new();
        }
        (0..self.statements.len())
            .filter(|i| !self.dispatched.contains(i) && *self.deps.get(i).unwrap_or(&0) == 0)
            .collect()
    }

    pub fn mark_dispatched(&mut self, stmt_idx: usize) {
        self.dispatched.insert(stmt_idx);
    }

    /// Record `stmt_idx`'s output and return the successors this unblocks.
    pub fn fill_result(&mut self, stmt_idx: usize, values: Vec<Value>) -> Vec<usize> {
        self.results.insert(stmt_idx, values);
        self.mark_dispatched(stmt_idx);
        let mut newly_ready = Vec::new();
        if let Some(successors) = self.topo.get(&stmt_idx).cloned() {
            for succ in successors {
                let count = self.deps.entry(succ).or_insert(0);
                if *count > 0 {
                    *count -= 1;
                }
                if *count == 0 && !self.dispatched.contains(&succ) {
                    newly_ready.push(succ);
                }
            }
        }
        newly_ready
    }

    pub fn result_of(&self, stmt_idx: usize) -> Option<&[Value]> {
        self.results.get(&stmt_idx).map(|v| v.as_slice())
    }

    /// Halts the plan: `next_ready` reports nothing further, matching the
    /// first aborting statement's effect on the rest of the DAG.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Append the synthetic `VALIDATION -> POST_VALIDATION -> TERMINATE`
    /// triple every plan ends with (spec §4.7), with `VALIDATION` depending
    /// on every statement that is not itself a predecessor of another (the
    /// DAG's leaves).
    pub fn finalize(&mut self, validation: StatementPlan, post_validation: StatementPlan, terminate: StatementPlan) -> (usize, usize, usize) {
        let leaves: Vec<usize> = (0..self.statements.len()).filter(|i| self.topo.get(i).map_or(true, |s| s.is_empty())).collect();
        let validation_idx = self.add_statement(validation);
        for leaf in leaves {
            self.add_dependency(validation_idx, leaf);
        }
        let post_idx = self.add_statement(post_validation);
        self.add_dependency(post_idx, validation_idx);
        let terminate_idx = self.add_statement(terminate);
        self.add_dependency(terminate_idx, post_idx);
        (validation_idx, post_idx, terminate_idx)
    }
}

impl Default for TransactionPlan {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TrxType;
    use crate::operators::mutation::AddVertexOperator;
    use crate::operators::terminate::TerminateOperator;
    use crate::operators::validation::ValidationOperator;
    use std::sync::Arc;

    fn stmt() -> StatementPlan {
        StatementPlan::new(TrxType::Add).push(Arc::new(AddVertexOperator { label: 1 }))
    }

    #[test]
    fn independent_statements_are_ready_immediately() {
        let mut plan = TransactionPlan::new();
        let a = plan.add_statement(stmt());
        let b = plan.add_statement(stmt());
        let mut ready = plan.next_ready();
        ready.sort();
        assert_eq!(ready, vec![a, b]);
    }

    #[test]
    fn dependent_statement_waits_then_unblocks() {
        let mut plan = TransactionPlan::new();
        let a = plan.add_statement(stmt());
        let b = plan.add_statement(stmt());
        plan.add_dependency(b, a);

        assert_eq!(plan.next_ready(), vec![a]);
        let unblocked = plan.fill_result(a, vec![]);
        assert_eq!(unblocked, vec![b]);
        assert_eq!(plan.next_ready(), vec![b]);
    }

    #[test]
    fn abort_empties_next_ready() {
        let mut plan = TransactionPlan::new();
        plan.add_statement(stmt());
        plan.abort();
        assert!(plan.next_ready().is_empty());
    }

    #[tokio::test]
    async fn finalize_chains_validation_post_validation_terminate_after_leaves() {
        use crate::config::EngineConfig;
        use crate::storage::DataStorage;
        use crate::txn::status::LocalStatusService;
        use crate::txn::{DependencyReadTable, RctTable};

        let mut plan = TransactionPlan::new();
        let a = plan.add_statement(stmt());
        let b = plan.add_statement(stmt());

        let status = Arc::new(LocalStatusService::new());
        let deps = Arc::new(DependencyReadTable::new());
        let rct = Arc::new(RctTable::new());
        let storage = Arc::new(DataStorage::new(0, status.clone(), deps.clone()));
        let validation_op = Arc::new(ValidationOperator::new(rct.clone(), status.clone(), deps, EngineConfig::default()));
        let cleanup: Arc<dyn crate::operators::PerTrxCleanup> = validation_op.clone();
        let terminate_op = Arc::new(TerminateOperator { storage, status, rct, cleanups: vec![cleanup] });

        let validation_stmt = StatementPlan::new(TrxType::Update).push(validation_op as Arc<dyn crate::operators::Operator>);
        let post_validation_stmt = StatementPlan::new(TrxType::Update);
        let terminate_stmt = StatementPlan::new(TrxType::Update).push(terminate_op as Arc<dyn crate::operators::Operator>);

        let (v, p, t) = plan.finalize(validation_stmt, post_validation_stmt, terminate_stmt);

        let mut ready = plan.next_ready();
        ready.sort();
        assert_eq!(ready, vec![a, b]);

        plan.fill_result(a, vec![]);
        assert!(plan.next_ready().is_empty());
        let unblocked = plan.fill_result(b, vec![]);
        assert_eq!(unblocked, vec![v]);

        plan.fill_result(v, vec![]);
        assert_eq!(plan.next_ready(), vec![p]);
        plan.fill_result(p, vec![]);
        assert_eq!(plan.next_ready(), vec![t]);
    }
}
