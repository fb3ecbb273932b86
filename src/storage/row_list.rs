//! Row Lists (spec §4.3): arena-backed segmented rows holding MVCC lists for
//! a vertex's properties, an edge's properties, or a vertex's topology
//! (adjacency).
//!
//! Segment capacities are resolved per DESIGN.md Open Question 3 (no target
//! architecture is named, so these are not cache-line-derived): `VP_ROW`,
//! `EP_ROW`, `VE_ROW` all default to 8 cells per segment.

use crate::ids::{Label, VId};
use crate::storage::mvcc_list::{AppendConflict, MvccList};
use crate::storage::value_store::ValueOffset;
use parking_lot::RwLock;
use std::sync::Arc;

pub const VP_ROW: usize = 8;
pub const EP_ROW: usize = 8;
pub const VE_ROW: usize = 8;

/// A reference to a property's payload in the value store, or the
/// value-less tombstone a drop writes (spec §3 "drops are modelled as a
/// version with an empty payload").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyValueRef(pub Option<ValueOffset>);

impl PropertyValueRef {
    pub fn present(offset: ValueOffset) -> Self {
        PropertyValueRef(Some(offset))
    }

    pub fn dropped() -> Self {
        PropertyValueRef(None)
    }

    pub fn is_dropped(&self) -> bool {
        self.0.is_none()
    }
}

struct PropertyCell {
    pkey: Label,
    versions: Arc<MvccList<PropertyValueRef>>,
}

/// A chain of fixed-capacity row segments holding one MVCC list per
/// property key.
pub struct PropertyRowList {
    row_capacity: usize,
    segments: RwLock<Vec<Vec<PropertyCell>>>,
}

impl PropertyRowList {
    pub fn new() -> Self {
        Self::with_capacity(VP_ROW)
    }

    pub fn with_capacity(row_capacity: usize) -> Self {
        Self { row_capacity, segments: RwLock::new(Vec::new()) }
    }

    /// The MVCC list for `pkey`, if a cell for it has ever been created.
    pub fn find(&self, pkey: Label) -> Option<Arc<MvccList<PropertyValueRef>>> {
        let segments = self.segments.read();
        segments.iter().flatten().find(|c| c.pkey == pkey).map(|c| c.versions.clone())
    }

    fn push_cell(segments: &mut Vec<Vec<PropertyCell>>, row_capacity: usize, cell: PropertyCell) {
        match segments.last_mut() {
            Some(seg) if seg.len() < row_capacity => seg.push(cell),
            _ => segments.push(vec![cell]),
        }
    }

    /// Insert the first version of a property during bulk load.
    pub fn insert_initial(&self, pkey: Label, value: PropertyValueRef) {
        let mvcc = Arc::new(MvccList::new());
        mvcc.append_initial(value);
        let mut segments = self.segments.write();
        Self::push_cell(&mut segments, self.row_capacity, PropertyCell { pkey, versions: mvcc });
    }

    /// The MVCC list for `pkey`, if the property has ever existed.
    pub fn read(&self, pkey: Label) -> Option<Arc<MvccList<PropertyValueRef>>> {
        self.find(pkey)
    }

    /// All `(pkey, mvcc_list)` pairs, in arena order.
    pub fn read_all(&self) -> Vec<(Label, Arc<MvccList<PropertyValueRef>>)> {
        let segments = self.segments.read();
        segments.iter().flatten().map(|c| (c.pkey, c.versions.clone())).collect()
    }

    /// MVCC lists for exactly the requested keys, skipping keys that don't
    /// exist.
    pub fn read_by_pkey_list(&self, pkeys: &[Label]) -> Vec<(Label, Arc<MvccList<PropertyValueRef>>)> {
        let segments = self.segments.read();
        segments
            .iter()
            .flatten()
            .filter(|c| pkeys.contains(&c.pkey))
            .map(|c| (c.pkey, c.versions.clone()))
            .collect()
    }

    /// Every property key that has ever existed on this element.
    pub fn read_pkey_list(&self) -> Vec<Label> {
        let segments = self.segments.read();
        segments.iter().flatten().map(|c| c.pkey).collect()
    }

    /// Create a cell for `pkey` if new, else append a version to the
    /// existing MVCC list. Returns whether the key already existed and the
    /// list a caller should commit/abort.
    pub fn process_modify(
        &self,
        pkey: Label,
        trx_id: u64,
        new_value: PropertyValueRef,
    ) -> Result<(bool, Arc<MvccList<PropertyValueRef>>), AppendConflict> {
        if let Some(mvcc) = self.find(pkey) {
            mvcc.append_uncommitted(trx_id, new_value)?;
            return Ok((true, mvcc));
        }

        let mut segments = self.segments.write();
        if let Some(existing) = segments.iter().flatten().find(|c| c.pkey == pkey) {
            existing.versions.append_uncommitted(trx_id, new_value)?;
            return Ok((true, existing.versions.clone()));
        }

        let mvcc = Arc::new(MvccList::new());
        mvcc.append_uncommitted(trx_id, new_value).expect("fresh mvcc list cannot conflict");
        Self::push_cell(&mut segments, self.row_capacity, PropertyCell { pkey, versions: mvcc.clone() });
        Ok((false, mvcc))
    }

    /// Append a value-less (tombstone) version for `pkey`. `None` if the key
    /// never existed.
    pub fn process_drop(
        &self,
        pkey: Label,
        trx_id: u64,
    ) -> Result<Option<Arc<MvccList<PropertyValueRef>>>, AppendConflict> {
        match self.find(pkey) {
            None => Ok(None),
            Some(mvcc) => {
                mvcc.append_uncommitted(trx_id, PropertyValueRef::dropped())?;
                Ok(Some(mvcc))
            }
        }
    }
}

impl Default for PropertyRowList {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Topology row list (vertex adjacency)
// ---------------------------------------------------------------------------

/// Direction of an adjacency entry relative to the vertex that owns the row
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Out,
    In,
}

/// One version of an edge's existence/label, as seen from the topology row
/// list's perspective. `label == 0` is the tombstone (spec §3). `ep` is
/// `Some` only on the out-direction cell — edge properties are stored once,
/// canonically on the source vertex's adjacency entry; `DataStorage` always
/// resolves edge properties through the source side.
#[derive(Clone)]
pub struct EdgeVersion {
    pub label: Label,
    pub ep: Option<Arc<PropertyRowList>>,
}

impl EdgeVersion {
    pub fn tombstone() -> Self {
        EdgeVersion { label: 0, ep: None }
    }

    pub fn is_tombstone(&self) -> bool {
        self.label == 0
    }
}

struct TopologyCell {
    direction: Direction,
    peer: VId,
    versions: Arc<MvccList<EdgeVersion>>,
}

/// A chain of fixed-capacity row segments holding one MVCC list per
/// `(direction, peer)` adjacency entry.
pub struct TopologyRowList {
    row_capacity: usize,
    segments: RwLock<Vec<Vec<TopologyCell>>>,
}

impl TopologyRowList {
    pub fn new() -> Self {
        Self::with_capacity(VE_ROW)
    }

    pub fn with_capacity(row_capacity: usize) -> Self {
        Self { row_capacity, segments: RwLock::new(Vec::new()) }
    }

    /// The MVCC list for the `(direction, peer)` cell, if one exists.
    pub fn find(&self, direction: Direction, peer: VId) -> Option<Arc<MvccList<EdgeVersion>>> {
        let segments = self.segments.read();
        segments
            .iter()
            .flatten()
            .find(|c| c.direction == direction && c.peer == peer)
            .map(|c| c.versions.clone())
    }

    fn push_cell(segments: &mut Vec<Vec<TopologyCell>>, row_capacity: usize, cell: TopologyCell) {
        match segments.last_mut() {
            Some(seg) if seg.len() < row_capacity => seg.push(cell),
            _ => segments.push(vec![cell]),
        }
    }

    pub fn insert_initial(&self, direction: Direction, peer: VId, version: EdgeVersion) {
        let mvcc = Arc::new(MvccList::new());
        mvcc.append_initial(version);
        let mut segments = self.segments.write();
        Self::push_cell(&mut segments, self.row_capacity, TopologyCell { direction, peer, versions: mvcc });
    }

    /// Create a cell for `(direction, peer)` if new (or tombstoned), else
    /// append a version to the existing MVCC list.
    pub fn process_add_edge(
        &self,
        direction: Direction,
        peer: VId,
        trx_id: u64,
        version: EdgeVersion,
    ) -> Result<Arc<MvccList<EdgeVersion>>, AppendConflict> {
        if let Some(mvcc) = self.find(direction, peer) {
            mvcc.append_uncommitted(trx_id, version)?;
            return Ok(mvcc);
        }
        let mut segments = self.segments.write();
        if let Some(existing) = segments.iter().flatten().find(|c| c.direction == direction && c.peer == peer) {
            existing.versions.append_uncommitted(trx_id, version)?;
            return Ok(existing.versions.clone());
        }
        let mvcc = Arc::new(MvccList::new());
        mvcc.append_uncommitted(trx_id, version).expect("fresh mvcc list cannot conflict");
        Self::push_cell(&mut segments, self.row_capacity, TopologyCell { direction, peer, versions: mvcc.clone() });
        Ok(mvcc)
    }

    pub fn process_drop_edge(
        &self,
        direction: Direction,
        peer: VId,
        trx_id: u64,
    ) -> Result<Option<Arc<MvccList<EdgeVersion>>>, AppendConflict> {
        match self.find(direction, peer) {
            None => Ok(None),
            Some(mvcc) => {
                mvcc.append_uncommitted(trx_id, EdgeVersion::tombstone())?;
                Ok(Some(mvcc))
            }
        }
    }

    /// All `(peer, mvcc_list)` entries matching `direction`, unfiltered by
    /// visibility (callers apply visibility + label filtering).
    pub fn scan(&self, direction: Direction) -> Vec<(VId, Arc<MvccList<EdgeVersion>>)> {
        let segments = self.segments.read();
        segments
            .iter()
            .flatten()
            .filter(|c| c.direction == direction)
            .map(|c| (c.peer, c.versions.clone()))
            .collect()
    }
}

impl Default for TopologyRowList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mvcc_list::Visibility;

    #[test]
    fn property_row_list_creates_then_appends() {
        let rl = PropertyRowList::new();
        let (was_existing, mvcc) = rl.process_modify(1, 10, PropertyValueRef::present(ValueOffset(0))).unwrap();
        assert!(!was_existing);
        mvcc.commit(10, 5);

        let (was_existing2, mvcc2) = rl.process_modify(1, 20, PropertyValueRef::present(ValueOffset(1))).unwrap();
        assert!(was_existing2);
        mvcc2.commit(20, 15);

        match mvcc2.visible_version(99, 20) {
            Visibility::Committed(v) => assert_eq!(v, PropertyValueRef::present(ValueOffset(1))),
            _ => panic!("expected committed"),
        }
    }

    #[test]
    fn property_drop_on_missing_key_is_none() {
        let rl = PropertyRowList::new();
        assert!(rl.process_drop(5, 1).unwrap().is_none());
    }

    #[test]
    fn read_pkey_list_reports_all_keys() {
        let rl = PropertyRowList::new();
        rl.process_modify(1, 1, PropertyValueRef::present(ValueOffset(0))).unwrap();
        rl.process_modify(2, 1, PropertyValueRef::present(ValueOffset(1))).unwrap();
        let mut keys = rl.read_pkey_list();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn topology_row_list_tombstones_and_reopens() {
        let rl = TopologyRowList::new();
        let peer = VId::new(0, 7);
        let mvcc = rl
            .process_add_edge(Direction::Out, peer, 1, EdgeVersion { label: 3, ep: Some(Arc::new(PropertyRowList::new())) })
            .unwrap();
        mvcc.commit(1, 10);

        let mvcc2 = rl.process_drop_edge(Direction::Out, peer, 2).unwrap().unwrap();
        mvcc2.commit(2, 20);
        match mvcc2.visible_version(99, 25) {
            Visibility::Committed(v) => assert!(v.is_tombstone()),
            _ => panic!("expected committed tombstone"),
        }

        // Re-open with a new edge of the same peer.
        let mvcc3 = rl
            .process_add_edge(Direction::Out, peer, 3, EdgeVersion { label: 9, ep: Some(Arc::new(PropertyRowList::new())) })
            .unwrap();
        assert!(Arc::ptr_eq(&mvcc2, &mvcc3));
    }
}
