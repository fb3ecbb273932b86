//! Engine configuration (spec §6 "Configuration").

/// Isolation level a transaction validates under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Skip step-level conflict checking (spec §4.8 step 2 short-circuit).
    Snapshot,
    /// Full step-level conflict checking against the RCT table.
    Serializable,
}

/// Recognised engine-wide options, matching spec §6 verbatim.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub isolation_level: IsolationLevel,
    /// If false, a conflict with a VALIDATING peer is treated as an
    /// immediate abort rather than entering the optimistic wait loop.
    pub enable_opt_validation: bool,
    /// Gates secondary-index buffer usage (out of scope to actually
    /// maintain an index; this only controls whether the buffer-promotion
    /// step in validation/terminate runs).
    pub enable_indexing: bool,
    /// Arena/value-store pool sizing, in cells per pool shard.
    pub pool_shard_capacity: usize,
    /// Bound on the optimistic-wait poll loop (spec §4.8 step 6).
    pub opt_valid_timeout_iters: u32,
    /// Sleep between optimistic-wait polls, in microseconds.
    pub opt_valid_sleep_us: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            isolation_level: IsolationLevel::Serializable,
            enable_opt_validation: true,
            enable_indexing: false,
            pool_shard_capacity: 4096,
            opt_valid_timeout_iters: 50,
            opt_valid_sleep_us: 100,
        }
    }
}
