//! Data Storage (spec §4.4): vertex/out-edge/in-edge maps, typed read/write
//! operations, and commit/abort over the per-transaction undo log.
//!
//! Grounded on `original_source/layout/data_storage.hpp`'s method names
//! (`GetVP`/`ProcessAddV`/...), mapped to `snake_case`. Edge existence is
//! modeled symmetrically: an `AddE` touches two vertices — the out-owner
//! (holding properties) and the in-owner (a property-less mirror) — matching
//! spec §3's "exactly one OutEdge instance... exactly one InEdge instance."

use crate::error::{EngineError, ReadStatus};
use crate::ids::{EId, EPropId, Label, Timestamp, TrxId, VId, VPropId};
use crate::storage::entities::Vertex;
use crate::storage::mvcc_list::{MvccList, Visibility};
use crate::storage::row_list::{Direction, EdgeVersion, PropertyRowList, PropertyValueRef};
use crate::storage::value_store::ValueStore;
use crate::txn::undo_log::{UndoEntry, UndoKind, UndoLog, VersionedChain};
use crate::txn::{MvccSlab, TransactionStatusService};
use crate::txn::dependency::DependencyReadTable;
use crate::txn::status::Status;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct DataStorage {
    worker_id: u32,
    next_local_vid: AtomicU64,
    vertices: RwLock<HashMap<VId, Arc<Vertex>>>,
    vp_values: ValueStore,
    ep_values: ValueStore,
    slab: MvccSlab,
    dependency_reads: Arc<DependencyReadTable>,
    status: Arc<dyn TransactionStatusService>,
}

impl DataStorage {
    pub fn new(worker_id: u32, status: Arc<dyn TransactionStatusService>, dependency_reads: Arc<DependencyReadTable>) -> Self {
        Self {
            worker_id,
            next_local_vid: AtomicU64::new(1),
            vertices: RwLock::new(HashMap::new()),
            vp_values: ValueStore::new(),
            ep_values: ValueStore::new(),
            slab: MvccSlab::new(),
            dependency_reads,
            status,
        }
    }

    fn get_vertex(&self, vid: VId) -> Result<Arc<Vertex>, EngineError> {
        self.vertices.read().get(&vid).cloned().ok_or(EngineError::NotFound)
    }

    /// Resolve a raw MVCC visibility lookup into spec §4.2's dependency-read
    /// policy. The only error this produces is `WriteConflict`, raised when
    /// a writer-context reader observes a peer planning to commit in its
    /// future (spec: "if the reader is a writer and ct_W > begin_ts_reader,
    /// abort").
    async fn resolve<T: Clone + Send + Sync>(
        &self,
        mvcc: &MvccList<T>,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> Result<Option<T>, EngineError> {
        match mvcc.visible_version(trx_id, begin_ts) {
            Visibility::Committed(v) => Ok(Some(v)),
            Visibility::OwnTail(v) => Ok(Some(v)),
            Visibility::OtherTail { writer, value } => {
                let (status, ct) = self.status.read_ct(writer).await;
                match status {
                    // The writer already resolved; its tail should have
                    // been converted to committed or cleared. Treat as
                    // transiently invisible rather than panicking on the
                    // race.
                    Status::Aborted | Status::Committed => Ok(mvcc.previous_committed()),
                    Status::Processing | Status::Validating => {
                        let ct_w = ct.unwrap_or(Timestamp::MAX);
                        if ct_w > begin_ts {
                            if read_only {
                                self.dependency_reads.record_homogeneous(trx_id, writer);
                                Ok(mvcc.previous_committed())
                            } else {
                                Err(EngineError::WriteConflict { conflicting_trx: writer })
                            }
                        } else {
                            // Heterogeneous case: the writer plans to commit
                            // in the reader's past. Spec §9 flags this as
                            // intentionally asymmetric with the homogeneous
                            // branch above; preserved as specified.
                            self.dependency_reads.record_heterogeneous(trx_id, writer);
                            Ok(Some(value))
                        }
                    }
                }
            }
            Visibility::None => Ok(None),
        }
    }

    async fn check_vertex_visible(
        &self,
        vertex: &Vertex,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> Result<(), EngineError> {
        match self.resolve(&vertex.label, trx_id, begin_ts, read_only).await? {
            Some(label) if label != 0 => Ok(()),
            _ => Err(EngineError::InvisibleInput(vertex.vid)),
        }
    }

    async fn visible_adjacency(
        &self,
        vertex: &Vertex,
        direction: Direction,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
        label_filter: Option<Label>,
    ) -> Result<Vec<(VId, Label)>, EngineError> {
        let mut out = Vec::new();
        for (peer, mvcc) in vertex.adj(direction).scan(direction) {
            match self.resolve(&mvcc, trx_id, begin_ts, read_only).await? {
                Some(version) if !version.is_tombstone() => {
                    if label_filter.map_or(true, |l| l == version.label) {
                        out.push((peer, version.label));
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    // -- reads ---------------------------------------------------------

    pub async fn get_v_label(&self, vid: VId, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> (ReadStatus, Option<Label>) {
        let vertex = match self.get_vertex(vid) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, None),
        };
        match self.resolve(&vertex.label, trx_id, begin_ts, read_only).await {
            Ok(Some(label)) if label != 0 => (ReadStatus::Success, Some(label)),
            Ok(_) => (ReadStatus::NotFound, None),
            Err(EngineError::WriteConflict { .. }) => (ReadStatus::Abort, None),
            Err(_) => (ReadStatus::NotFound, None),
        }
    }

    pub async fn get_vp(&self, pid: VPropId, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> (ReadStatus, Option<Vec<u8>>) {
        let vertex = match self.get_vertex(pid.vid) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, None),
        };
        if let Err(e) = self.check_vertex_visible(&vertex, trx_id, begin_ts, read_only).await {
            return match e {
                EngineError::WriteConflict { .. } => (ReadStatus::Abort, None),
                _ => (ReadStatus::NotFound, None),
            };
        }
        let mvcc = match vertex.vp.find(pid.label) {
            Some(m) => m,
            None => return (ReadStatus::NotFound, None),
        };
        self.resolve_property(&mvcc, &self.vp_values, trx_id, begin_ts, read_only).await
    }

    async fn resolve_property(
        &self,
        mvcc: &MvccList<PropertyValueRef>,
        values: &ValueStore,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> (ReadStatus, Option<Vec<u8>>) {
        match self.resolve(mvcc, trx_id, begin_ts, read_only).await {
            Ok(Some(v)) if !v.is_dropped() => (ReadStatus::Success, values.read(v.0.unwrap())),
            Ok(_) => (ReadStatus::NotFound, None),
            Err(EngineError::WriteConflict { .. }) => (ReadStatus::Abort, None),
            Err(_) => (ReadStatus::NotFound, None),
        }
    }

    pub async fn get_all_vp(&self, vid: VId, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> (ReadStatus, Vec<(Label, Vec<u8>)>) {
        let vertex = match self.get_vertex(vid) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, Vec::new()),
        };
        if let Err(e) = self.check_vertex_visible(&vertex, trx_id, begin_ts, read_only).await {
            return match e {
                EngineError::WriteConflict { .. } => (ReadStatus::Abort, Vec::new()),
                _ => (ReadStatus::NotFound, Vec::new()),
            };
        }
        let mut out = Vec::new();
        for (pkey, mvcc) in vertex.vp.read_all() {
            if let (ReadStatus::Success, Some(bytes)) = self.resolve_property(&mvcc, &self.vp_values, trx_id, begin_ts, read_only).await {
                out.push((pkey, bytes));
            }
        }
        (ReadStatus::Success, out)
    }

    pub async fn get_vp_list(
        &self,
        vid: VId,
        pkeys: &[Label],
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> (ReadStatus, Vec<(Label, Vec<u8>)>) {
        let vertex = match self.get_vertex(vid) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, Vec::new()),
        };
        if let Err(e) = self.check_vertex_visible(&vertex, trx_id, begin_ts, read_only).await {
            return match e {
                EngineError::WriteConflict { .. } => (ReadStatus::Abort, Vec::new()),
                _ => (ReadStatus::NotFound, Vec::new()),
            };
        }
        let mut out = Vec::new();
        for (pkey, mvcc) in vertex.vp.read_by_pkey_list(pkeys) {
            if let (ReadStatus::Success, Some(bytes)) = self.resolve_property(&mvcc, &self.vp_values, trx_id, begin_ts, read_only).await {
                out.push((pkey, bytes));
            }
        }
        (ReadStatus::Success, out)
    }

    async fn resolve_out_edge_version(
        &self,
        eid: EId,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> (ReadStatus, Option<EdgeVersion>) {
        let vertex = match self.get_vertex(eid.src) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, None),
        };
        let mvcc = match vertex.out_adj.find(Direction::Out, eid.dst) {
            Some(m) => m,
            None => return (ReadStatus::NotFound, None),
        };
        match self.resolve(&mvcc, trx_id, begin_ts, read_only).await {
            Ok(Some(v)) if !v.is_tombstone() => (ReadStatus::Success, Some(v)),
            Ok(_) => (ReadStatus::NotFound, None),
            Err(EngineError::WriteConflict { .. }) => (ReadStatus::Abort, None),
            Err(_) => (ReadStatus::NotFound, None),
        }
    }

    pub async fn get_e_label(&self, eid: EId, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> (ReadStatus, Option<Label>) {
        let (status, version) = self.resolve_out_edge_version(eid, trx_id, begin_ts, read_only).await;
        (status, version.map(|v| v.label))
    }

    pub async fn get_ep(&self, pid: EPropId, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> (ReadStatus, Option<Vec<u8>>) {
        let (status, version) = self.resolve_out_edge_version(pid.eid, trx_id, begin_ts, read_only).await;
        if status != ReadStatus::Success {
            return (status, None);
        }
        let ep = match version.and_then(|v| v.ep) {
            Some(ep) => ep,
            None => return (ReadStatus::NotFound, None),
        };
        let mvcc = match ep.find(pid.label) {
            Some(m) => m,
            None => return (ReadStatus::NotFound, None),
        };
        self.resolve_property(&mvcc, &self.ep_values, trx_id, begin_ts, read_only).await
    }

    pub async fn get_all_ep(&self, eid: EId, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> (ReadStatus, Vec<(Label, Vec<u8>)>) {
        let (status, version) = self.resolve_out_edge_version(eid, trx_id, begin_ts, read_only).await;
        if status != ReadStatus::Success {
            return (status, Vec::new());
        }
        let ep = match version.and_then(|v| v.ep) {
            Some(ep) => ep,
            None => return (ReadStatus::NotFound, Vec::new()),
        };
        let mut out = Vec::new();
        for (pkey, mvcc) in ep.read_all() {
            if let (ReadStatus::Success, Some(bytes)) = self.resolve_property(&mvcc, &self.ep_values, trx_id, begin_ts, read_only).await {
                out.push((pkey, bytes));
            }
        }
        (ReadStatus::Success, out)
    }

    pub async fn get_ep_list(
        &self,
        eid: EId,
        pkeys: &[Label],
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> (ReadStatus, Vec<(Label, Vec<u8>)>) {
        let (status, version) = self.resolve_out_edge_version(eid, trx_id, begin_ts, read_only).await;
        if status != ReadStatus::Success {
            return (status, Vec::new());
        }
        let ep = match version.and_then(|v| v.ep) {
            Some(ep) => ep,
            None => return (ReadStatus::NotFound, Vec::new()),
        };
        let mut out = Vec::new();
        for (pkey, mvcc) in ep.read_by_pkey_list(pkeys) {
            if let (ReadStatus::Success, Some(bytes)) = self.resolve_property(&mvcc, &self.ep_values, trx_id, begin_ts, read_only).await {
                out.push((pkey, bytes));
            }
        }
        (ReadStatus::Success, out)
    }

    pub async fn get_connected_vertex_list(
        &self,
        vid: VId,
        direction: Direction,
        label_filter: Option<Label>,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> (ReadStatus, Vec<VId>) {
        let vertex = match self.get_vertex(vid) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, Vec::new()),
        };
        if let Err(e) = self.check_vertex_visible(&vertex, trx_id, begin_ts, read_only).await {
            return match e {
                EngineError::WriteConflict { .. } => (ReadStatus::Abort, Vec::new()),
                _ => (ReadStatus::NotFound, Vec::new()),
            };
        }
        match self.visible_adjacency(&vertex, direction, trx_id, begin_ts, read_only, label_filter).await {
            Ok(pairs) => (ReadStatus::Success, pairs.into_iter().map(|(peer, _)| peer).collect()),
            Err(_) => (ReadStatus::Abort, Vec::new()),
        }
    }

    pub async fn get_connected_edge_list(
        &self,
        vid: VId,
        direction: Direction,
        label_filter: Option<Label>,
        trx_id: TrxId,
        begin_ts: Timestamp,
        read_only: bool,
    ) -> (ReadStatus, Vec<EId>) {
        let vertex = match self.get_vertex(vid) {
            Ok(v) => v,
            Err(_) => return (ReadStatus::NotFound, Vec::new()),
        };
        if let Err(e) = self.check_vertex_visible(&vertex, trx_id, begin_ts, read_only).await {
            return match e {
                EngineError::WriteConflict { .. } => (ReadStatus::Abort, Vec::new()),
                _ => (ReadStatus::NotFound, Vec::new()),
            };
        }
        match self.visible_adjacency(&vertex, direction, trx_id, begin_ts, read_only, label_filter).await {
            Ok(pairs) => {
                let eids = pairs
                    .into_iter()
                    .map(|(peer, _)| match direction {
                        Direction::Out => EId::new(vid, peer),
                        Direction::In => EId::new(peer, vid),
                    })
                    .collect();
                (ReadStatus::Success, eids)
            }
            Err(_) => (ReadStatus::Abort, Vec::new()),
        }
    }

    pub async fn get_all_vertices(&self, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> Vec<VId> {
        let snapshot: Vec<Arc<Vertex>> = self.vertices.read().values().cloned().collect();
        let mut out = Vec::new();
        for vertex in snapshot {
            if let Ok(Some(label)) = self.resolve(&vertex.label, trx_id, begin_ts, read_only).await {
                if label != 0 {
                    out.push(vertex.vid);
                }
            }
        }
        out
    }

    pub async fn get_all_edges(&self, trx_id: TrxId, begin_ts: Timestamp, read_only: bool) -> Vec<EId> {
        let snapshot: Vec<Arc<Vertex>> = self.vertices.read().values().cloned().collect();
        let mut out = Vec::new();
        for vertex in snapshot {
            if let Ok(pairs) = self.visible_adjacency(&vertex, Direction::Out, trx_id, begin_ts, read_only, None).await {
                out.extend(pairs.into_iter().map(|(peer, _)| EId::new(vertex.vid, peer)));
            }
        }
        out
    }

    // -- writes ----------------------------------------------------------

    pub async fn process_add_v(&self, label: Label, trx_id: TrxId, undo: &mut UndoLog) -> Result<VId, EngineError> {
        let local = self.next_local_vid.fetch_add(1, Ordering::Relaxed);
        let vid = VId::new(self.worker_id, local);
        let vertex = Arc::new(Vertex::new_uncommitted(vid, label, trx_id));
        let mvcc_ref = self.slab.insert(vertex.clone() as Arc<dyn VersionedChain>);
        self.vertices.write().insert(vid, vertex);
        undo.push(UndoEntry { mvcc_ref, kind: UndoKind::AddV { vid } });
        Ok(vid)
    }

    pub async fn process_drop_v(
        &self,
        vid: VId,
        trx_id: TrxId,
        begin_ts: Timestamp,
        undo: &mut UndoLog,
    ) -> Result<Vec<EId>, EngineError> {
        let vertex = self.get_vertex(vid)?;
        self.check_vertex_visible(&vertex, trx_id, begin_ts, false).await?;
        vertex
            .label
            .append_uncommitted(trx_id, 0)
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?;
        let mvcc_ref = self.slab.insert(vertex.clone() as Arc<dyn VersionedChain>);
        undo.push(UndoEntry { mvcc_ref, kind: UndoKind::DropV { vid } });

        let mut connected = Vec::new();
        for (peer, _) in self.visible_adjacency(&vertex, Direction::Out, trx_id, begin_ts, false, None).await? {
            connected.push(EId::new(vid, peer));
        }
        for (peer, _) in self.visible_adjacency(&vertex, Direction::In, trx_id, begin_ts, false, None).await? {
            connected.push(EId::new(peer, vid));
        }
        Ok(connected)
    }

    pub async fn process_add_e(&self, eid: EId, label: Label, trx_id: TrxId, is_out: bool, undo: &mut UndoLog) -> Result<(), EngineError> {
        let (owner_vid, peer_vid, direction, ep): (VId, VId, Direction, Option<Arc<PropertyRowList>>) = if is_out {
            (eid.src, eid.dst, Direction::Out, Some(Arc::new(PropertyRowList::new())))
        } else {
            (eid.dst, eid.src, Direction::In, None)
        };
        let vertex = self.get_vertex(owner_vid).map_err(|_| EngineError::InvisibleEdgeInput(eid))?;
        let mvcc = vertex
            .adj(direction)
            .process_add_edge(direction, peer_vid, trx_id, EdgeVersion { label, ep })
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?;
        let mvcc_ref = self.slab.insert(mvcc);
        undo.push(UndoEntry { mvcc_ref, kind: UndoKind::AddE { eid, is_out } });
        Ok(())
    }

    pub async fn process_drop_e(&self, eid: EId, trx_id: TrxId, is_out: bool, undo: &mut UndoLog) -> Result<(), EngineError> {
        let (owner_vid, peer_vid, direction) = if is_out { (eid.src, eid.dst, Direction::Out) } else { (eid.dst, eid.src, Direction::In) };
        let vertex = self.get_vertex(owner_vid).map_err(|_| EngineError::InvisibleEdgeInput(eid))?;
        let mvcc = vertex
            .adj(direction)
            .process_drop_edge(direction, peer_vid, trx_id)
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?
            .ok_or(EngineError::InvisibleEdgeInput(eid))?;
        let mvcc_ref = self.slab.insert(mvcc);
        undo.push(UndoEntry { mvcc_ref, kind: UndoKind::DropE { eid, is_out } });
        Ok(())
    }

    pub async fn process_modify_vp(
        &self,
        pid: VPropId,
        bytes: &[u8],
        trx_id: TrxId,
        begin_ts: Timestamp,
        undo: &mut UndoLog,
    ) -> Result<(), EngineError> {
        let vertex = self.get_vertex(pid.vid)?;
        self.check_vertex_visible(&vertex, trx_id, begin_ts, false).await?;
        let offset = self.vp_values.write(bytes);
        let (was_existing, mvcc) = vertex
            .vp
            .process_modify(pid.label, trx_id, PropertyValueRef::present(offset))
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?;
        let mvcc_ref = self.slab.insert(mvcc);
        let kind = if was_existing { UndoKind::ModifyVp { pid } } else { UndoKind::AddVp { pid } };
        undo.push(UndoEntry { mvcc_ref, kind });
        Ok(())
    }

    pub async fn process_drop_vp(
        &self,
        pid: VPropId,
        trx_id: TrxId,
        begin_ts: Timestamp,
        undo: &mut UndoLog,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let vertex = self.get_vertex(pid.vid)?;
        self.check_vertex_visible(&vertex, trx_id, begin_ts, false).await?;
        let (_, old) = self.get_vp(pid, trx_id, begin_ts, false).await;
        let mvcc = vertex
            .vp
            .process_drop(pid.label, trx_id)
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?
            .ok_or(EngineError::NotFound)?;
        let mvcc_ref = self.slab.insert(mvcc);
        undo.push(UndoEntry { mvcc_ref, kind: UndoKind::DropVp { pid } });
        Ok(old)
    }

    pub async fn process_modify_ep(
        &self,
        pid: EPropId,
        bytes: &[u8],
        trx_id: TrxId,
        begin_ts: Timestamp,
        undo: &mut UndoLog,
    ) -> Result<(), EngineError> {
        let (status, version) = self.resolve_out_edge_version(pid.eid, trx_id, begin_ts, false).await;
        if status != ReadStatus::Success {
            return Err(EngineError::InvisibleEdgeInput(pid.eid));
        }
        let ep = version.and_then(|v| v.ep).ok_or(EngineError::InvisibleEdgeInput(pid.eid))?;
        let offset = self.ep_values.write(bytes);
        let (was_existing, mvcc) = ep
            .process_modify(pid.label, trx_id, PropertyValueRef::present(offset))
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?;
        let mvcc_ref = self.slab.insert(mvcc);
        let kind = if was_existing { UndoKind::ModifyEp { pid } } else { UndoKind::AddEp { pid } };
        undo.push(UndoEntry { mvcc_ref, kind });
        Ok(())
    }

    pub async fn process_drop_ep(
        &self,
        pid: EPropId,
        trx_id: TrxId,
        begin_ts: Timestamp,
        undo: &mut UndoLog,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let (status, version) = self.resolve_out_edge_version(pid.eid, trx_id, begin_ts, false).await;
        if status != ReadStatus::Success {
            return Err(EngineError::InvisibleEdgeInput(pid.eid));
        }
        let ep = version.and_then(|v| v.ep).ok_or(EngineError::InvisibleEdgeInput(pid.eid))?;
        let (_, old) = self.get_ep(pid, trx_id, begin_ts, false).await;
        let mvcc = ep
            .process_drop(pid.label, trx_id)
            .map_err(|c| EngineError::WriteConflict { conflicting_trx: c.holder })?
            .ok_or(EngineError::NotFound)?;
        let mvcc_ref = self.slab.insert(mvcc);
        undo.push(UndoEntry { mvcc_ref, kind: UndoKind::DropEp { pid } });
        Ok(old)
    }

    /// For every distinct MVCC chain this trx touched, commit it (spec §4.4
    /// commit bullet).
    pub fn commit(&self, trx_id: TrxId, commit_ts: Timestamp, undo: &UndoLog) {
        undo.commit_all(&self.slab, trx_id, commit_ts);
        tracing::debug!(trx_id, commit_ts, touched = undo.len(), "transaction committed");
    }

    /// Unwind every chain this trx touched, in reverse order. An aborted
    /// `AddV` additionally frees the vertex's row lists immediately rather
    /// than waiting for `collect_garbage`'s next sweep, and enqueues whatever
    /// edges it had accumulated in the same transaction for GC (spec §4.4
    /// abort bullet).
    pub fn abort(&self, trx_id: TrxId, undo: &UndoLog) {
        let unwound = undo.abort_all(&self.slab, trx_id);
        for kind in &unwound {
            if let UndoKind::AddV { vid } = kind {
                self.free_aborted_vertex(*vid);
            }
        }
        tracing::debug!(trx_id, unwound = unwound.len(), "transaction aborted");
    }

    /// Frees a vertex's row lists outright: an aborted `AddV` never had a
    /// visible existence, so its property/adjacency cells are pure garbage.
    /// Edges it had accumulated in the same aborted transaction still have
    /// the peer's mirror cell left dangling; `collect_garbage` reclaims those
    /// on its next pass once the peer side no longer resolves to anything.
    fn free_aborted_vertex(&self, vid: VId) {
        let Some(vertex) = self.vertices.write().remove(&vid) else { return };
        let attached_edges = vertex.out_adj.scan(Direction::Out).len() + vertex.in_adj.scan(Direction::In).len();
        if attached_edges > 0 {
            tracing::debug!(?vid, attached_edges, "aborted AddV freed row lists, enqueued attached edges for GC");
        }
    }

    /// Drop vertex map entries whose existence chain is tombstoned as of
    /// `min_active_ts` and which no in-flight transaction still holds
    /// (spec §4.4 "GC for dropped vertices/edges").
    pub fn collect_garbage(&self, min_active_ts: Timestamp) {
        let mut vertices = self.vertices.write();
        let before = vertices.len();
        vertices.retain(|_, v| {
            if v.label.tail_holder().is_some() {
                return true;
            }
            !matches!(v.label.visible_version(0, min_active_ts), Visibility::Committed(0))
        });
        let reclaimed = before - vertices.len();
        if reclaimed > 0 {
            tracing::debug!(min_active_ts, reclaimed, "garbage collection reclaimed tombstoned vertices");
        }
    }

    // -- bulk load ---------------------------------------------------------

    pub fn bulk_insert_vertex(&self, vid: VId, label: Label) {
        self.vertices.write().insert(vid, Arc::new(Vertex::new_bulk(vid, label)));
    }

    pub fn bulk_insert_out_edge(&self, eid: EId, label: Label) {
        if let Ok(vertex) = self.get_vertex(eid.src) {
            vertex.out_adj.insert_initial(Direction::Out, eid.dst, EdgeVersion { label, ep: Some(Arc::new(PropertyRowList::new())) });
        }
    }

    pub fn bulk_insert_in_edge(&self, eid: EId, label: Label) {
        if let Ok(vertex) = self.get_vertex(eid.dst) {
            vertex.in_adj.insert_initial(Direction::In, eid.src, EdgeVersion { label, ep: None });
        }
    }

    pub fn bulk_insert_vp(&self, pid: VPropId, bytes: &[u8]) {
        if let Ok(vertex) = self.get_vertex(pid.vid) {
            let offset = self.vp_values.write(bytes);
            vertex.vp.insert_initial(pid.label, PropertyValueRef::present(offset));
        }
    }

    pub fn bulk_insert_ep(&self, pid: EPropId, bytes: &[u8]) {
        if let Ok(vertex) = self.get_vertex(pid.eid.src) {
            if let Some(mvcc) = vertex.out_adj.find(Direction::Out, pid.eid.dst) {
                if let Visibility::Committed(version) = mvcc.visible_version(0, Timestamp::MAX) {
                    if let Some(ep) = version.ep {
                        let offset = self.ep_values.write(bytes);
                        ep.insert_initial(pid.label, PropertyValueRef::present(offset));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::status::LocalStatusService;

    fn storage() -> DataStorage {
        DataStorage::new(0, Arc::new(LocalStatusService::new()), Arc::new(DependencyReadTable::new()))
    }

    #[tokio::test]
    async fn add_v_then_commit_is_visible_to_later_reader() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let vid = ds.process_add_v(7, 1, &mut undo).await.unwrap();
        ds.commit(1, 100, &undo);

        let (status, label) = ds.get_v_label(vid, 2, 100, true).await;
        assert_eq!(status, ReadStatus::Success);
        assert_eq!(label, Some(7));

        let (status_past, _) = ds.get_v_label(vid, 2, 50, true).await;
        assert_eq!(status_past, ReadStatus::NotFound);
    }

    #[tokio::test]
    async fn add_v_then_abort_leaves_nothing_visible() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let vid = ds.process_add_v(3, 1, &mut undo).await.unwrap();
        ds.abort(1, &undo);

        let (status, _) = ds.get_v_label(vid, 2, 1000, true).await;
        assert_eq!(status, ReadStatus::NotFound);
    }

    #[tokio::test]
    async fn add_v_then_abort_frees_the_vertex_row_lists() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let vid = ds.process_add_v(3, 1, &mut undo).await.unwrap();
        assert!(ds.vertices.read().contains_key(&vid));

        ds.abort(1, &undo);

        assert!(!ds.vertices.read().contains_key(&vid));
    }

    #[tokio::test]
    async fn modify_vp_is_read_your_writes() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let vid = ds.process_add_v(1, 1, &mut undo).await.unwrap();
        ds.commit(1, 10, &undo);

        let mut undo2 = UndoLog::new();
        let pid = VPropId { vid, label: 9 };
        ds.process_modify_vp(pid, b"hello", 2, 20, &mut undo2).await.unwrap();
        let (status, value) = ds.get_vp(pid, 2, 20, false).await;
        assert_eq!(status, ReadStatus::Success);
        assert_eq!(value, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn second_writer_on_same_vp_aborts() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let vid = ds.process_add_v(1, 1, &mut undo).await.unwrap();
        ds.commit(1, 10, &undo);

        let pid = VPropId { vid, label: 9 };
        let mut undo_a = UndoLog::new();
        ds.process_modify_vp(pid, b"from-a", 2, 20, &mut undo_a).await.unwrap();

        let mut undo_b = UndoLog::new();
        let err = ds.process_modify_vp(pid, b"from-b", 3, 25, &mut undo_b).await.unwrap_err();
        assert!(matches!(err, EngineError::WriteConflict { conflicting_trx: 2 }));
    }

    #[tokio::test]
    async fn add_e_is_visible_from_both_owners() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let v1 = ds.process_add_v(1, 1, &mut undo).await.unwrap();
        let v2 = ds.process_add_v(1, 1, &mut undo).await.unwrap();
        ds.commit(1, 10, &undo);

        let eid = EId::new(v1, v2);
        let mut undo2 = UndoLog::new();
        ds.process_add_e(eid, 5, 2, true, &mut undo2).await.unwrap();
        ds.process_add_e(eid, 5, 2, false, &mut undo2).await.unwrap();
        ds.commit(2, 20, &undo2);

        let (status, out_list) = ds.get_connected_vertex_list(v1, Direction::Out, None, 3, 30, true).await;
        assert_eq!(status, ReadStatus::Success);
        assert_eq!(out_list, vec![v2]);

        let (status_in, in_list) = ds.get_connected_vertex_list(v2, Direction::In, None, 3, 30, true).await;
        assert_eq!(status_in, ReadStatus::Success);
        assert_eq!(in_list, vec![v1]);
    }

    #[tokio::test]
    async fn drop_v_cascades_connected_edges() {
        let ds = storage();
        let mut undo = UndoLog::new();
        let v1 = ds.process_add_v(1, 1, &mut undo).await.unwrap();
        let v2 = ds.process_add_v(1, 1, &mut undo).await.unwrap();
        ds.commit(1, 10, &undo);

        let eid = EId::new(v1, v2);
        let mut undo2 = UndoLog::new();
        ds.process_add_e(eid, 5, 2, true, &mut undo2).await.unwrap();
        ds.process_add_e(eid, 5, 2, false, &mut undo2).await.unwrap();
        ds.commit(2, 20, &undo2);

        let mut undo3 = UndoLog::new();
        let connected = ds.process_drop_v(v1, 3, 30, &mut undo3).await.unwrap();
        assert_eq!(connected, vec![eid]);
    }

    // Spec §8 invariant 4: a read-only trx sees exactly the version whose
    // committed interval contains its begin-ts, regardless of any later
    // commit's timestamp.
    proptest::proptest! {
        #[test]
        fn snapshot_visibility_never_sees_a_commit_after_begin_ts(
            commit_ts in 1u64..1000,
            reader_begin_ts in 0u64..1000,
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let ds = storage();
                let mut undo = UndoLog::new();
                let vid = ds.process_add_v(1, 1, &mut undo).await.unwrap();
                ds.commit(1, commit_ts, &undo);

                let (status, label) = ds.get_v_label(vid, 2, reader_begin_ts, true).await;
                if reader_begin_ts >= commit_ts {
                    prop_assert_eq!(status, ReadStatus::Success);
                    prop_assert_eq!(label, Some(1));
                } else {
                    prop_assert_eq!(status, ReadStatus::NotFound);
                }
                Ok(())
            })?;
        }
    }

    // Spec §8 invariant 5: an aborted AddV leaves no visible vertex map
    // entry at all, no matter how far in the future the reader's begin-ts is.
    proptest::proptest! {
        #[test]
        fn abort_leaves_vertex_invisible_at_any_later_begin_ts(
            later_begin_ts in 0u64..1_000_000,
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let ds = storage();
                let mut undo = UndoLog::new();
                let vid = ds.process_add_v(1, 1, &mut undo).await.unwrap();
                ds.abort(1, &undo);

                let (status, _) = ds.get_v_label(vid, 2, later_begin_ts, true).await;
                prop_assert_eq!(status, ReadStatus::NotFound);
                Ok(())
            })?;
        }
    }
}
