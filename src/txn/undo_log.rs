//! Undo log and MVCC-list slab (spec §4.4 commit/abort, §9 "MVCC version
//! ownership").
//!
//! The spec's redesign note replaces raw pointers-to-MVCC-nodes in the undo
//! log with a stable slab index + generation counter. `MvccSlab` owns that
//! indirection; `VersionedChain` type-erases `MvccList<T>` for any `T` so the
//! undo log can hold one homogeneous list of entries regardless of which
//! typed chain (vertex label, property, edge version) each entry refers to.

use crate::ids::{EId, EPropId, Label, Timestamp, TrxId, VId, VPropId};
use crate::storage::mvcc_list::MvccList;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;

/// Type-erased commit/abort surface over `MvccList<T>`.
pub trait VersionedChain: Send + Sync {
    fn commit(&self, trx_id: TrxId, commit_ts: Timestamp);
    fn abort(&self, trx_id: TrxId);
}

impl<T: Clone + Send + Sync + 'static> VersionedChain for MvccList<T> {
    fn commit(&self, trx_id: TrxId, commit_ts: Timestamp) {
        MvccList::commit(self, trx_id, commit_ts);
    }

    fn abort(&self, trx_id: TrxId) {
        MvccList::abort(self, trx_id);
    }
}

/// A stable handle to a slot in an [`MvccSlab`]. Using the generation to
/// detect a reused slot makes accidental use-after-free of a freed slot
/// into a `None` return rather than silently resolving a stranger's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MvccRef {
    index: u32,
    generation: u32,
}

struct Slot {
    chain: Option<Arc<dyn VersionedChain>>,
    generation: u32,
}

/// Arena of type-erased MVCC chains, indexed by [`MvccRef`].
pub struct MvccSlab {
    slots: RwLock<Vec<Slot>>,
    free: Mutex<Vec<u32>>,
}

impl MvccSlab {
    pub fn new() -> Self {
        Self { slots: RwLock::new(Vec::new()), free: Mutex::new(Vec::new()) }
    }

    pub fn insert(&self, chain: Arc<dyn VersionedChain>) -> MvccRef {
        let mut free = self.free.lock();
        if let Some(idx) = free.pop() {
            let mut slots = self.slots.write();
            let slot = &mut slots[idx as usize];
            slot.chain = Some(chain);
            return MvccRef { index: idx, generation: slot.generation };
        }
        let mut slots = self.slots.write();
        slots.push(Slot { chain: Some(chain), generation: 0 });
        MvccRef { index: (slots.len() - 1) as u32, generation: 0 }
    }

    pub fn get(&self, r: MvccRef) -> Option<Arc<dyn VersionedChain>> {
        let slots = self.slots.read();
        let slot = slots.get(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.chain.clone()
    }

    /// Retire a slot: the chain stays reachable for GC via the caller's own
    /// reference (we never drop MVCC chains out from under a GC pass), but
    /// the slab's handle to it is freed for reuse with a bumped generation.
    pub fn retire(&self, r: MvccRef) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(r.index as usize) {
            if slot.generation == r.generation {
                slot.chain = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.lock().push(r.index);
            }
        }
    }
}

impl Default for MvccSlab {
    fn default() -> Self {
        Self::new()
    }
}

/// What an undo entry is reverting, carrying enough identity for
/// `DataStorage::abort` to do primitive-specific cleanup (e.g. freeing a
/// dropped `AddV`'s row lists).
#[derive(Debug, Clone, Copy)]
pub enum UndoKind {
    AddV { vid: VId },
    DropV { vid: VId },
    AddE { eid: EId, is_out: bool },
    DropE { eid: EId, is_out: bool },
    AddVp { pid: VPropId },
    ModifyVp { pid: VPropId },
    DropVp { pid: VPropId },
    AddEp { pid: EPropId },
    ModifyEp { pid: EPropId },
    DropEp { pid: EPropId },
    /// A vertex label write (from `AddV`'s own existence/label append).
    VertexLabel { vid: VId, label: Label },
}

#[derive(Clone, Copy)]
pub struct UndoEntry {
    pub mvcc_ref: MvccRef,
    pub kind: UndoKind,
}

/// Per-transaction undo log: one entry per mutation, in the order it was
/// applied.
#[derive(Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Commit every distinct MVCC chain touched by this trx, deduped by
    /// slab identity (two property writes to the same key produce two undo
    /// entries against the same chain; it must only be committed once).
    pub fn commit_all(&self, slab: &MvccSlab, trx_id: TrxId, commit_ts: Timestamp) {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if seen.insert(entry.mvcc_ref) {
                if let Some(chain) = slab.get(entry.mvcc_ref) {
                    chain.commit(trx_id, commit_ts);
                }
            }
        }
    }

    /// Abort every chain touched, in reverse order so a dependent write
    /// (e.g. a property set on a vertex added earlier in the same trx) is
    /// unwound before its parent. Returns the kinds in the order aborted, so
    /// the caller can perform primitive-specific cleanup (free row lists,
    /// enqueue edge GC).
    pub fn abort_all(&self, slab: &MvccSlab, trx_id: TrxId) -> Vec<UndoKind> {
        let mut seen = HashSet::new();
        let mut kinds = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter().rev() {
            if seen.insert(entry.mvcc_ref) {
                if let Some(chain) = slab.get(entry.mvcc_ref) {
                    chain.abort(trx_id);
                }
            }
            kinds.push(entry.kind);
        }
        kinds
    }
}
