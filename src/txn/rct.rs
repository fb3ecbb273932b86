//! Recently-Committed-Transactions table (spec §4.6), grounded on
//! `original_source/layout/pmt_rct_table.{hpp,cpp}`: one map per
//! [`Primitive`], from committed trx-id to the set of item-ids it touched.
//!
//! Item ids are the flat `u64` encoding produced by [`crate::ids`]
//! (`encode_vprop_item`/`encode_eprop_item` for properties, the raw `VId`/an
//! edge index for topology primitives) — the RCT table itself is agnostic to
//! how an id was packed.

use crate::ids::{Primitive, TrxId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Per-primitive `trx_id -> {item_id}` map, matching the original's
/// `tbb::concurrent_hash_map<uint64_t, concurrent_unordered_set<uint64_t>>`.
struct PrimitiveTable {
    entries: RwLock<HashMap<TrxId, HashSet<u64>>>,
}

impl PrimitiveTable {
    fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }
}

/// One table per modification primitive, consulted by validation's
/// step-level conflict check (spec §4.8 step 4).
pub struct RctTable {
    tables: HashMap<Primitive, PrimitiveTable>,
}

impl RctTable {
    pub fn new() -> Self {
        let tables = Primitive::ALL.iter().map(|p| (*p, PrimitiveTable::new())).collect();
        Self { tables }
    }

    fn table(&self, primitive: Primitive) -> &PrimitiveTable {
        self.tables.get(&primitive).expect("RctTable is pre-populated for every Primitive variant")
    }

    /// Record that `trx_id` (now committed) touched `items` under
    /// `primitive` (`InsertRecentActionSet` in the original).
    pub fn insert_recent_action_set(&self, primitive: Primitive, trx_id: TrxId, items: impl IntoIterator<Item = u64>) {
        let mut entries = self.table(primitive).entries.write();
        entries.entry(trx_id).or_default().extend(items);
    }

    /// The item set committed trx `trx_id` touched under `primitive`, if any
    /// (`GetRecentActionSet`).
    pub fn get_recent_action_set(&self, primitive: Primitive, trx_id: TrxId) -> Option<HashSet<u64>> {
        self.table(primitive).entries.read().get(&trx_id).cloned()
    }

    /// Evict entries for transactions no validating peer can still need
    /// (`EraseRecentActionSet`).
    pub fn evict(&self, trx_ids: &[TrxId]) {
        for primitive in Primitive::ALL {
            let mut entries = self.table(primitive).entries.write();
            for trx_id in trx_ids {
                entries.remove(trx_id);
            }
        }
    }
}

impl Default for RctTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_per_primitive_independently() {
        let rct = RctTable::new();
        rct.insert_recent_action_set(Primitive::MVP, 10, [100, 101]);
        rct.insert_recent_action_set(Primitive::IV, 10, [200]);

        assert_eq!(rct.get_recent_action_set(Primitive::MVP, 10), Some([100, 101].into_iter().collect()));
        assert_eq!(rct.get_recent_action_set(Primitive::IV, 10), Some([200].into_iter().collect()));
        assert_eq!(rct.get_recent_action_set(Primitive::DV, 10), None);
    }

    #[test]
    fn evict_clears_across_all_primitives() {
        let rct = RctTable::new();
        rct.insert_recent_action_set(Primitive::MVP, 5, [1]);
        rct.insert_recent_action_set(Primitive::IE, 5, [2]);
        rct.evict(&[5]);
        assert!(rct.get_recent_action_set(Primitive::MVP, 5).is_none());
        assert!(rct.get_recent_action_set(Primitive::IE, 5).is_none());
    }
}
