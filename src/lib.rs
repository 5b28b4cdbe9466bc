//! `gc-forwarding` is the synchronization substrate of a generational,
//! region-based, concurrent relocating garbage collector.
//!
//! It coordinates an Old Collector (OC) and a Young Collector (YC) while they
//! concurrently evacuate ("relocate") live objects out of a region, and
//! arbitrates the OC/YC handshake over cross-generational remembered fields
//! that used to live in that region. Concretely, this crate provides:
//!
//! * The [`Forwarding`](forwarding::Forwarding) lifecycle lock: a
//!   reference-count-based rendezvous protocol that lets many readers retain a
//!   region while it is being relocated, lets exactly one writer claim it for
//!   in-place relocation, and lets a detacher wait until the region is
//!   quiescent.
//! * The in-place relocation marker: a thread-identity handshake that lets one
//!   thread treat a region as simultaneously holding "from-space" and
//!   "to-space" objects.
//! * The [`RemsetHandshake`](remset::RemsetHandshake): a four-state CAS
//!   protocol that arbitrates whether the OC's published list of surviving
//!   cross-generational fields is used, or whether a concurrent YC rejects
//!   that list and re-discovers the fields itself.
//!
//! This crate does not perform object copying, does not decide which regions
//! to relocate, does not implement a pointer color scheme, and does not
//! define a marking algorithm. Those concerns, along with the region
//! allocator and remembered-set bitmap storage, are modeled only as the
//! capability traits in [`platform`] that a binding implements.

#[macro_use]
extern crate log;

mod access;
mod config;
mod entry;
mod error;
pub mod logger;
pub mod platform;
mod remset;
mod stats;
mod table;

#[cfg(test)]
mod test_support;

pub mod forwarding;

pub use access::{ClaimedPage, RetainedPage};
pub use config::Config;
pub use entry::{ForwardingEntryTable, FromIndex, ToOffset};
pub use error::{AccessOutcome, ClaimOutcome, WaitOutcome};
pub use forwarding::Forwarding;
pub use remset::{RemsetHandshake, RemsetState};
pub use table::ForwardingTable;
