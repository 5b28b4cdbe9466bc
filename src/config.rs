//! Runtime-tunable knobs for the forwarding core.
//!
//! Unlike the pointer-coloring scheme, the marking algorithm, or relocation
//! set selection, the knobs here genuinely belong to this crate: they affect
//! only the data structures this crate owns (the entry table, the
//! relocation-stall statistic). They are plain fields with defaults rather
//! than a registry, since the set of options is small and fixed at the
//! crate's scope.

use std::env;
use std::str::FromStr;

/// Default fixed load factor for a [`crate::ForwardingEntryTable`]: the table
/// is allocated with `object_max_count / DEFAULT_LOAD_FACTOR_DENOM *
/// DEFAULT_LOAD_FACTOR_NUM` slots, rounded up, which keeps linear probing
/// chains short without over-allocating for regions that relocate only a
/// fraction of their live objects.
const DEFAULT_LOAD_FACTOR_NUM: usize = 10;
const DEFAULT_LOAD_FACTOR_DENOM: usize = 6;

/// Configuration for a [`crate::Forwarding`] and its owning
/// [`crate::ForwardingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Numerator of the entry-table load factor (see
    /// [`DEFAULT_LOAD_FACTOR_NUM`]).
    pub entry_table_load_factor_num: usize,
    /// Denominator of the entry-table load factor (see
    /// [`DEFAULT_LOAD_FACTOR_DENOM`]).
    pub entry_table_load_factor_denom: usize,
    /// Whether `wait_page_released` should record time spent blocked into the
    /// relocation-stall statistic. Disabling this removes the `Instant::now`
    /// call on the blocking path, which matters for workloads that stall
    /// often but briefly.
    pub track_relocation_stall: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entry_table_load_factor_num: DEFAULT_LOAD_FACTOR_NUM,
            entry_table_load_factor_denom: DEFAULT_LOAD_FACTOR_DENOM,
            track_relocation_stall: true,
        }
    }
}

impl Config {
    /// Compute the capacity an entry table should be allocated with for a
    /// region holding up to `object_max_count` objects.
    pub fn entry_table_capacity(&self, object_max_count: usize) -> usize {
        object_max_count
            .saturating_mul(self.entry_table_load_factor_num)
            .div_ceil(self.entry_table_load_factor_denom.max(1))
            .max(1)
    }

    /// Build a `Config` from the process environment, falling back to
    /// [`Default::default`] for any variable that is unset or fails to
    /// parse. Recognized variables:
    ///
    /// * `GC_FORWARDING_TRACK_RELOCATION_STALL` (`"true"`/`"false"`)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_bool("GC_FORWARDING_TRACK_RELOCATION_STALL") {
            config.track_relocation_stall = v;
        }
        config
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| bool::from_str(&v).ok())
}
