//! Identifier types and the ten modification primitives.
//!
//! `VId` packs the owning worker id into its low bits so that routing a
//! vertex to its owning machine is a mask-and-shift, matching the spec's
//! shard-routing invariant. We use a `u64` (wider than the spec's literal
//! "32-bit") to leave headroom for large graphs; see DESIGN.md Open Question 1.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bits of a [`VId`] reserved for the owning worker id.
pub const WORKER_ID_BITS: u32 = 10;
const WORKER_ID_MASK: u64 = (1 << WORKER_ID_BITS) - 1;

/// A globally-routable vertex id: `(local_counter << WORKER_ID_BITS) | worker_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VId(pub u64);

impl VId {
    pub fn new(worker_id: u32, local_counter: u64) -> Self {
        debug_assert!((worker_id as u64) <= WORKER_ID_MASK);
        VId((local_counter << WORKER_ID_BITS) | (worker_id as u64 & WORKER_ID_MASK))
    }

    /// The worker that owns this vertex.
    pub fn owner_worker(&self) -> u32 {
        (self.0 & WORKER_ID_MASK) as u32
    }
}

impl fmt::Display for VId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An edge id: its endpoints. Not interned — edges are addressed by the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EId {
    pub src: VId,
    pub dst: VId,
}

impl EId {
    pub fn new(src: VId, dst: VId) -> Self {
        EId { src, dst }
    }
}

impl fmt::Display for EId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e({}->{})", self.src, self.dst)
    }
}

/// A small integer label assigned by the string dictionary. `0` is reserved
/// as the tombstone sentinel for edge versions (spec §3).
pub type Label = u16;

/// A vertex-property id: the vertex plus the property's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VPropId {
    pub vid: VId,
    pub label: Label,
}

/// An edge-property id: the edge plus the property's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EPropId {
    pub eid: EId,
    pub label: Label,
}

/// Transaction id, assigned by the timestamp/status service.
pub type TrxId = u64;

/// A monotone (not necessarily gap-free) logical timestamp.
pub type Timestamp = u64;

/// The ten modification primitives tracked by the RCT table (spec glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Primitive {
    /// Insert vertex
    IV,
    /// Drop vertex
    DV,
    /// Insert edge
    IE,
    /// Drop edge
    DE,
    /// Insert vertex property
    IVP,
    /// Modify vertex property
    MVP,
    /// Drop vertex property
    DVP,
    /// Insert edge property
    IEP,
    /// Modify edge property
    MEP,
    /// Drop edge property
    DEP,
}

impl Primitive {
    pub const ALL: [Primitive; 10] = [
        Primitive::IV,
        Primitive::DV,
        Primitive::IE,
        Primitive::DE,
        Primitive::IVP,
        Primitive::MVP,
        Primitive::DVP,
        Primitive::IEP,
        Primitive::MEP,
        Primitive::DEP,
    ];

    /// Whether this primitive mutates a topology item (vertex/edge) rather
    /// than a property.
    pub fn is_topology(&self) -> bool {
        matches!(self, Primitive::IV | Primitive::DV | Primitive::IE | Primitive::DE)
    }
}

/// Encode a vertex-property id into the flat `u64` item-id used by the RCT
/// table, matching `original_source/layout/pmt_rct_table.cpp`'s
/// `id >> PID_BITS` packing.
pub const PID_BITS: u32 = 16;

pub fn encode_vprop_item(id: VPropId) -> u64 {
    (id.vid.0 << PID_BITS) | id.label as u64
}

pub fn decode_vprop_item(item: u64) -> (VId, Label) {
    (VId(item >> PID_BITS), (item & ((1 << PID_BITS) - 1)) as Label)
}

pub fn encode_eprop_item(eid_index: u64, label: Label) -> u64 {
    (eid_index << PID_BITS) | label as u64
}

/// Flattens an edge id into the `u64` item-id space the RCT table uses for
/// the topology primitives (`IE`/`DE`) and as the `eid_index` input to
/// [`encode_eprop_item`]. The RCT table itself is agnostic to how an id was
/// packed (see `txn::rct`), so endpoints are simply folded together.
pub fn eid_item_id(eid: EId) -> u64 {
    eid.src.0 ^ eid.dst.0
}

/// What kind of transaction this is, used to decide dependency rules in the
/// execution plan (spec §4.7) and to fix the `is_trx_update`/`is_trx_add`
/// precedence bug flagged in spec §9 by using a plain enum instead of bit
/// flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrxType {
    ReadOnly,
    Update,
    Add,
    Delete,
}

impl TrxType {
    pub fn is_read_only(&self) -> bool {
        matches!(self, TrxType::ReadOnly)
    }

    pub fn is_mutation(&self) -> bool {
        !self.is_read_only()
    }
}
