//! Maps region-base addresses to their [`crate::Forwarding`] (component C1).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::forwarding::Forwarding;
use crate::platform::{AddressSpace, Platform};

/// Read-mostly registry of the regions currently undergoing relocation.
///
/// The table is only ever mutated at relocation-set boundaries: once when a
/// region is selected into the relocation set (`insert`) and once when its
/// `Forwarding` is fully released and the region detached (`remove`). Both
/// events are rare relative to the `lookup` traffic from mutators and
/// collector helpers, so an `RwLock` is effectively uncontended: lookups
/// during a relocation phase never race with a write, because no region is
/// inserted or removed mid-phase.
pub struct ForwardingTable<P: Platform> {
    by_base: RwLock<HashMap<<P::AddressSpace as AddressSpace>::Addr, Arc<Forwarding<P>>>>,
}

impl<P: Platform> Default for ForwardingTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> ForwardingTable<P> {
    pub fn new() -> Self {
        Self {
            by_base: RwLock::new(HashMap::new()),
        }
    }

    /// Register `forwarding` under its region's base address. Called once
    /// per region, when the relocation set is selected.
    pub fn insert(&self, base: <P::AddressSpace as AddressSpace>::Addr, forwarding: Arc<Forwarding<P>>) {
        let mut map = self.by_base.write().unwrap();
        let prior = map.insert(base, forwarding);
        debug_assert!(
            prior.is_none(),
            "ForwardingTable already had an entry for this region base"
        );
    }

    /// Look up the `Forwarding` for the region based at `base`, if one is
    /// currently registered. Safe to call concurrently with any number of
    /// other `lookup` calls.
    pub fn lookup(&self, base: <P::AddressSpace as AddressSpace>::Addr) -> Option<Arc<Forwarding<P>>> {
        self.by_base.read().unwrap().get(&base).cloned()
    }

    /// Deregister the region based at `base`. Called once its `Forwarding`
    /// has reached ref_count 0 and its page has been detached.
    pub fn remove(&self, base: <P::AddressSpace as AddressSpace>::Addr) -> Option<Arc<Forwarding<P>>> {
        self.by_base.write().unwrap().remove(&base)
    }

    /// Number of regions currently registered.
    pub fn len(&self) -> usize {
        self.by_base.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
