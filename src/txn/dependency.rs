//! Dependency-read table (spec §4.2 / §4.8 step 3).
//!
//! When a reader observes another transaction's uncommitted tail it records
//! a homogeneous or heterogeneous dependency, keyed by the reader's trx id.
//! Validation drains these sets and resolves each against the writer's
//! published status.

use crate::ids::TrxId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Deps {
    homogeneous: HashSet<TrxId>,
    heterogeneous: HashSet<TrxId>,
}

/// Per-reader-trx sets of writers whose uncommitted state the reader
/// observed.
pub struct DependencyReadTable {
    table: Mutex<HashMap<TrxId, Deps>>,
}

impl DependencyReadTable {
    pub fn new() -> Self {
        Self { table: Mutex::new(HashMap::new()) }
    }

    /// Reader saw writer's uncommitted write whose planned commit-ts is
    /// after the reader's snapshot (spec: "ct_W > begin_ts_reader").
    pub fn record_homogeneous(&self, reader: TrxId, writer: TrxId) {
        self.table.lock().entry(reader).or_default().homogeneous.insert(writer);
    }

    /// Reader saw writer's uncommitted write whose planned commit-ts is
    /// before the reader's snapshot (spec: "ct_W < begin_ts_reader").
    pub fn record_heterogeneous(&self, reader: TrxId, writer: TrxId) {
        self.table.lock().entry(reader).or_default().heterogeneous.insert(writer);
    }

    /// Drain the homogeneous dependency set for `reader`, leaving the
    /// heterogeneous set (if any) untouched.
    pub fn take_homogeneous(&self, reader: TrxId) -> Vec<TrxId> {
        let mut table = self.table.lock();
        match table.get_mut(&reader) {
            Some(deps) => std::mem::take(&mut deps.homogeneous).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Drain the heterogeneous dependency set for `reader`, leaving the
    /// homogeneous set (if any) untouched.
    pub fn take_heterogeneous(&self, reader: TrxId) -> Vec<TrxId> {
        let mut table = self.table.lock();
        match table.get_mut(&reader) {
            Some(deps) => std::mem::take(&mut deps.heterogeneous).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Drop all recorded dependencies for `reader` once validation has fully
    /// resolved them.
    pub fn clear(&self, reader: TrxId) {
        self.table.lock().remove(&reader);
    }
}

impl Default for DependencyReadTable {
    fn default() -> Self {
        Self::new()
    }
}
