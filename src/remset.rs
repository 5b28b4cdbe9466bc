//! The relocated-remembered-fields handshake between the Old Collector (OC)
//! and the Young Collector (YC) (component C4).
//!
//! Applies only to forwardings whose `from_age` is old. See
//! [`crate::Forwarding`] for the state machine diagram and the rationale,
//! reproduced from spec.md §4.5 in the module-level docs of `forwarding.rs`.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::platform::{AddressSpace, Generation};

/// The four (plus one internal sentinel) states of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[repr(u8)]
pub enum RemsetState {
    /// Neither OC nor YC has acted yet.
    Initial = 0,
    /// The OC has published its collected array of to-space fields.
    Published = 1,
    /// A YC has rejected (or will reject) whatever the OC publishes; the YC
    /// is authoritative for this forwarding's remembered fields.
    Rejected = 2,
    /// The page was relocated before the current YC started and no YC ever
    /// retained it; the current YC does not need to look at it.
    PreYcTerminal = 3,
    /// A pre-YC-terminal observer found the array already published and has
    /// consumed it. Distinct from `PreYcTerminal` only so that a second
    /// observer can tell the array was already taken.
    Consumed = 4,
}

impl RemsetState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Initial,
            1 => Self::Published,
            2 => Self::Rejected,
            3 => Self::PreYcTerminal,
            4 => Self::Consumed,
            other => unreachable!("invalid RemsetHandshake state {other}"),
        }
    }
}

/// The OC/YC remembered-fields handshake for a single old-generation region
/// undergoing relocation.
pub struct RemsetHandshake<A: AddressSpace> {
    state: AtomicU8,
    /// Owned by the OC up until the 0->1 CAS in `publish` succeeds; after
    /// that, ownership follows the state machine as documented on each
    /// method below.
    array: Mutex<Vec<A::Addr>>,
    publish_young_seqnum: AtomicU32,
}

impl<A: AddressSpace> Default for RemsetHandshake<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AddressSpace> RemsetHandshake<A> {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RemsetState::Initial as u8),
            array: Mutex::new(Vec::new()),
            publish_young_seqnum: AtomicU32::new(0),
        }
    }

    /// Current state, for diagnostics and tests.
    pub fn state(&self) -> RemsetState {
        RemsetState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The YC sequence number captured by the last `after_relocate` call.
    pub fn publish_young_seqnum(&self) -> u32 {
        self.publish_young_seqnum.load(Ordering::Relaxed)
    }

    /// Record a to-space field address that used to have a remembered-set
    /// entry. Called repeatedly by the OC while it relocates objects out of
    /// this region, strictly before it calls `publish` (or, transitively,
    /// `after_relocate`).
    pub fn push_field(&self, addr: A::Addr) {
        self.array.lock().unwrap().push(addr);
    }

    /// Called by the OC once it finishes relocating this region.
    pub fn after_relocate(&self, young: &impl Generation, start: usize, end: usize) {
        // Plain store: happens-before the CAS in `publish`, which is all the
        // ordering spec.md §4.5 requires of this snapshot.
        self.publish_young_seqnum
            .store(young.seqnum(), Ordering::Relaxed);

        if young.is_phase_mark() {
            self.publish(start, end);
        }
    }

    /// OC side: publish the collected remset fields to the YC.
    pub fn publish(&self, start: usize, end: usize) {
        match self.state.compare_exchange(
            RemsetState::Initial as u8,
            RemsetState::Published as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                debug!(target: "forwarding::remset", "Forwarding remset published       : {start:#x} {end:#x}");
            }
            Err(observed) if observed == RemsetState::Rejected as u8 => {
                self.array.lock().unwrap().clear();
                debug!(target: "forwarding::remset", "Forwarding remset discarded       : {start:#x} {end:#x}");
            }
            Err(observed) => {
                panic!(
                    "RemsetHandshake::publish observed impossible state {:?}",
                    RemsetState::from_u8(observed)
                );
            }
        }
    }

    /// YC side: called while the YC has successfully retained the
    /// forwarding's page, i.e. relocation is not yet complete. The YC is in
    /// its mark phase whenever this is called.
    pub fn notify_concurrent_scan_of(&self, young: &impl Generation, start: usize, end: usize) {
        debug_assert!(
            young.is_phase_mark(),
            "notify_concurrent_scan_of called outside the YC mark phase"
        );

        match self.state.compare_exchange(
            RemsetState::Initial as u8,
            RemsetState::Rejected as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                debug!(target: "forwarding::remset", "Forwarding remset eager           : {start:#x} {end:#x}");
            }
            Err(observed) if observed == RemsetState::Published as u8 => {
                let second = self.state.compare_exchange(
                    RemsetState::Published as u8,
                    RemsetState::Rejected as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                assert_eq!(
                    second,
                    Ok(RemsetState::Published as u8),
                    "notify_concurrent_scan_of: second CAS 1->2 must not fail"
                );
                self.array.lock().unwrap().clear();
                debug!(target: "forwarding::remset", "Forwarding remset eager and reject: {start:#x} {end:#x}");
            }
            Err(observed) if observed == RemsetState::Rejected as u8 => {
                debug!(target: "forwarding::remset", "Forwarding remset redundant       : {start:#x} {end:#x}");
            }
            Err(observed) => {
                panic!(
                    "notify_concurrent_scan_of observed impossible state {:?}",
                    RemsetState::from_u8(observed)
                );
            }
        }
    }

    /// Called by code outside this crate that determined relocation of this
    /// region completed before the current YC started, and the YC was
    /// therefore never able to retain the page. Returns the published array
    /// if this call is the one that consumes it, or an empty vec otherwise.
    pub fn mark_pre_yc_terminal(&self) -> Vec<A::Addr> {
        loop {
            let current = self.state.load(Ordering::Acquire);
            if current == RemsetState::Initial as u8 {
                if self
                    .state
                    .compare_exchange(
                        RemsetState::Initial as u8,
                        RemsetState::PreYcTerminal as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return Vec::new();
                }
                continue;
            }
            if current == RemsetState::Published as u8 {
                if self
                    .state
                    .compare_exchange(
                        RemsetState::Published as u8,
                        RemsetState::Consumed as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return std::mem::take(&mut *self.array.lock().unwrap());
                }
                continue;
            }
            // Rejected, PreYcTerminal, or Consumed: a previous YC (or a
            // previous call to this very function) already handled it.
            return Vec::new();
        }
    }
}
