//! Capability traits this crate consumes from the surrounding collector.
//!
//! This crate does not implement object layout, pointer coloring, marking
//! bitmaps, the page allocator, or the address-remap table. It treats them as
//! external collaborators, reached only through the traits below, the same
//! way `mmtk-core` reaches the host VM only through `VMBinding` and its
//! sub-traits (`ObjectModel`, `ActivePlan`, `Collection`, ...). A binding
//! implements these traits once for its region/page type and its thread
//! model, and every other type in this crate is generic over the
//! implementation.

/// The region ("page") being relocated.
///
/// A region is a fixed-size contiguous span of the managed heap that is the
/// unit of relocation. This crate only ever asks a region about its own
/// bookkeeping; it never walks region contents itself.
pub trait Region: Send + Sync {
    /// The region's start address, as an opaque integer. Used only to print
    /// the stable, test-matchable remset-handshake log lines of spec.md §6
    /// ("Forwarding remset published/discarded/eager/...").
    fn start(&self) -> usize;

    /// The region's end address (exclusive), as an opaque integer. See
    /// [`Region::start`].
    fn end(&self) -> usize;

    /// The region's current allocation cursor, as an offset from a
    /// convenient zero point chosen by the binding (e.g. the region's own
    /// base address).
    fn top(&self) -> usize;

    /// Upper bound on the number of distinct object slots the region can
    /// hold. Used to size a [`crate::ForwardingEntryTable`] and to bounds-check
    /// `from_index` during [`crate::Forwarding::verify`].
    fn object_max_count(&self) -> usize;

    /// The alignment, in bytes, that object sizes must be rounded up to
    /// within this region.
    fn object_alignment(&self) -> usize;

    /// Called once in-place relocation of this region has finished, so the
    /// region can drop whatever live-object bitmap it used to distinguish
    /// from-space objects during relocation.
    fn finalize_reset_for_in_place_relocation(&self);

    /// Emit a region-scoped diagnostic message. Bindings typically route
    /// this through their own logging, prefixed with the region's bounds.
    fn log_msg(&self, msg: &str);

    /// Called at the end of [`crate::Forwarding::verify`] with the number of
    /// live objects found and their total aligned size, so the region can
    /// cross-check against its own bookkeeping (e.g. a mark count produced
    /// by the marking phase this crate does not implement).
    fn verify_live(&self, object_count: usize, live_bytes: usize, in_place: bool);

    /// Whether this region belongs to the young generation.
    fn is_young(&self) -> bool;
}

/// Address arithmetic the binding performs on our behalf.
///
/// This crate stores and compares addresses opaquely (as `AddressSpace::Addr`)
/// and never interprets their bit pattern; all arithmetic happens through
/// this trait so the binding remains free to choose its own address
/// representation (raw pointers, compressed oops, an offset type, ...).
pub trait AddressSpace {
    /// The address type used for to-space field addresses and forwarding
    /// entry targets.
    type Addr: Copy + Eq + std::hash::Hash + Send + Sync + std::fmt::Debug;

    /// Translate a region-local offset into an address in this address
    /// space.
    fn offset_to_address(&self, offset: usize) -> Self::Addr;

    /// Size, in bytes, of the (already relocated, to-space) object whose
    /// first byte is at `addr`.
    fn object_size(&self, addr: Self::Addr) -> usize;

    /// Round `size` up to a multiple of `alignment`.
    fn align_up(size: usize, alignment: usize) -> usize {
        debug_assert!(alignment.is_power_of_two());
        (size + alignment - 1) & !(alignment - 1)
    }
}

/// The young generation, consulted by the OC/YC remembered-fields handshake.
pub trait Generation {
    /// A monotonically increasing sequence number, bumped once per young
    /// collection. `Forwarding::after_relocate` snapshots this so a later
    /// reader can tell whether its own young collection started before or
    /// after the snapshot was taken.
    fn seqnum(&self) -> u32;

    /// Whether the young generation is currently in its concurrent mark
    /// phase (i.e. the phase during which it scans remembered fields).
    fn is_phase_mark(&self) -> bool;
}

/// An opaque, comparable handle to "the currently running thread".
///
/// This crate uses this only to answer "is the calling thread the one
/// performing in-place relocation of this region?" -- it never schedules,
/// parks, or joins threads itself.
pub trait ThreadIdentity: Copy + Eq + std::fmt::Debug {
    /// The identity of the calling thread.
    fn current() -> Self;

    /// Project this identity to a `u64` suitable for storing in an
    /// `AtomicU64` slot. `0` is reserved to mean "no thread"; implementations
    /// must never return `0` for a real thread.
    fn as_u64(self) -> u64;
}

/// Bundles a binding's concrete `Region`, `AddressSpace`, `Generation`, and
/// `ThreadIdentity` implementations behind a single generic parameter, the
/// way `mmtk-core`'s `VMBinding` bundles `ObjectModel`, `ActivePlan`, and
/// `Collection` for a given VM. Every type in this crate that needs more than
/// one of these capabilities is generic over a single `P: Platform` rather
/// than over each capability separately.
pub trait Platform: Sized + 'static {
    type Region: Region;
    type AddressSpace: AddressSpace;
    type Generation: Generation;
    type Thread: ThreadIdentity;
}
