//! Bulk loader (spec §6 "Persisted state" / initial-load path): feeds a
//! [`DataStorage`] directly through its `bulk_insert_*` methods, bypassing
//! MVCC versioning and the undo log entirely since the data is, by
//! definition, already committed.

use crate::ids::{EId, EPropId, Label, VId, VPropId};
use crate::storage::DataStorage;

/// One item the bulk loader can feed into storage.
pub enum LoadItem {
    Vertex { vid: VId, label: Label },
    OutEdge { eid: EId, label: Label },
    InEdge { eid: EId, label: Label },
    VertexProperty { pid: VPropId, bytes: Vec<u8> },
    EdgeProperty { pid: EPropId, bytes: Vec<u8> },
}

/// A source of bulk-load items, e.g. a CSV/Parquet reader. Vertices must be
/// yielded (and loaded) before any edge or property referencing them.
pub trait BulkLoadSource {
    fn items(&mut self) -> Box<dyn Iterator<Item = LoadItem> + '_>;
}

/// An in-memory `BulkLoadSource`, mainly for tests and small fixtures.
pub struct VecLoadSource {
    items: Vec<LoadItem>,
}

impl VecLoadSource {
    pub fn new(items: Vec<LoadItem>) -> Self {
        VecLoadSource { items }
    }
}

impl BulkLoadSource for VecLoadSource {
    fn items(&mut self) -> Box<dyn Iterator<Item = LoadItem> + '_> {
        Box::new(self.items.drain(..))
    }
}

/// Drain `source` into `storage`, dispatching each item to the matching
/// `bulk_insert_*` method.
pub fn load_into(storage: &DataStorage, source: &mut dyn BulkLoadSource) {
    for item in source.items() {
        match item {
            LoadItem::Vertex { vid, label } => storage.bulk_insert_vertex(vid, label),
            LoadItem::OutEdge { eid, label } => storage.bulk_insert_out_edge(eid, label),
            LoadItem::InEdge { eid, label } => storage.bulk_insert_in_edge(eid, label),
            LoadItem::VertexProperty { pid, bytes } => storage.bulk_insert_vp(pid, &bytes),
            LoadItem::EdgeProperty { pid, bytes } => storage.bulk_insert_ep(pid, &bytes),
        }
    }
}
