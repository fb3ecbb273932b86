//! Vertex records (spec §3): a vertex is its own label MVCC chain plus a
//! property row list and the two topology row lists (out/in adjacency).
//!
//! Edges have no standalone record — an edge's existence is the pair of
//! topology cells held on its two endpoints (spec §3 "an edge's existence is
//! recorded symmetrically on both endpoints' adjacency lists"); its
//! properties live on the out-direction cell's [`EdgeVersion::ep`].

use crate::ids::{Label, Timestamp, TrxId, VId};
use crate::storage::mvcc_list::MvccList;
use crate::storage::row_list::{Direction, PropertyRowList, TopologyRowList};
use crate::txn::VersionedChain;

pub struct Vertex {
    pub vid: VId,
    /// `0` once dropped, never removed from the map (spec §3 "a dropped
    /// vertex's id is retired, not reused or erased").
    pub label: MvccList<Label>,
    pub vp: PropertyRowList,
    pub out_adj: TopologyRowList,
    pub in_adj: TopologyRowList,
}

impl Vertex {
    /// Construct a fresh vertex whose label chain has a single committed
    /// version starting at `begin_ts` (bulk load) or as an uncommitted tail
    /// owned by `trx_id` (online `AddV`); callers pick the right helper.
    pub fn new_bulk(vid: VId, label: Label) -> Self {
        let labels = MvccList::new();
        labels.append_initial(label);
        Vertex { vid, label: labels, vp: PropertyRowList::new(), out_adj: TopologyRowList::new(), in_adj: TopologyRowList::new() }
    }

    pub fn new_uncommitted(vid: VId, label: Label, trx_id: u64) -> Self {
        let labels = MvccList::new();
        labels
            .append_uncommitted(trx_id, label)
            .expect("fresh label chain cannot conflict");
        Vertex { vid, label: labels, vp: PropertyRowList::new(), out_adj: TopologyRowList::new(), in_adj: TopologyRowList::new() }
    }

    pub fn adj(&self, direction: Direction) -> &TopologyRowList {
        match direction {
            Direction::Out => &self.out_adj,
            Direction::In => &self.in_adj,
        }
    }
}

/// Lets a vertex's existence/label chain be registered in the undo log's
/// slab like any other MVCC chain.
impl VersionedChain for Vertex {
    fn commit(&self, trx_id: TrxId, commit_ts: Timestamp) {
        self.label.commit(trx_id, commit_ts);
    }

    fn abort(&self, trx_id: TrxId) {
        self.label.abort(trx_id);
    }
}
