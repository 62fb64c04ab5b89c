//! Transfer state shared by the interrupt handler and callers
//!
//! Each pipe owns a [`Handoff`] word that says who may touch the rest of the
//! pipe's state. A caller claims a free pipe, fills in the descriptor, and
//! arms it with a `Release` store. The interrupt handler observes the armed
//! pipe with an `Acquire` load, does its bookkeeping, and frees the pipe
//! with a `Release` store as its last write. Nothing else synchronizes the
//! descriptor fields, so every access to them follows this order.

#![allow(clippy::declare_interior_mutable_const)] // Usage is legit in this module.

use core::sync::atomic::{AtomicPtr, AtomicU8, AtomicUsize, Ordering};

use usb_device::endpoint::EndpointAddress;

/// Sixteen endpoints in each direction.
pub const ENDPOINT_COUNT: usize = 16;

/// Ownership of a pipe.
pub struct Handoff(AtomicU8);

impl Handoff {
    /// No transfer; a caller may claim the pipe.
    const FREE: u8 = 0;
    /// A caller is filling in the descriptor.
    const CLAIMED: u8 = 1;
    /// The descriptor is complete and belongs to the interrupt handler.
    const ARMED: u8 = 2;

    pub const fn new() -> Self {
        Self(AtomicU8::new(Self::FREE))
    }

    /// Atomically claim a free pipe.
    ///
    /// Returns `false` if the pipe is claimed or armed.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(Self::FREE, Self::CLAIMED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Publish the descriptor of a claimed pipe.
    pub fn arm(&self) {
        debug_assert_eq!(self.0.load(Ordering::Relaxed), Self::CLAIMED);
        self.0.store(Self::ARMED, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::Acquire) == Self::ARMED
    }

    /// Atomically retire an armed pipe.
    ///
    /// Returns `false` if the pipe wasn't armed.
    pub fn try_retire(&self) -> bool {
        self.0
            .compare_exchange(Self::ARMED, Self::FREE, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    pub fn is_free(&self) -> bool {
        self.0.load(Ordering::Acquire) == Self::FREE
    }
}

/// OUT transfer descriptor.
///
/// `buffer` and `capacity` are only written while the handoff is claimed,
/// and only meaningful while it's armed. `received` is written by the RX
/// engine while the handoff is armed.
pub struct OutTransfer {
    pub handoff: Handoff,
    pub buffer: AtomicPtr<u8>,
    pub received: AtomicUsize,
    pub capacity: AtomicUsize,
}

impl OutTransfer {
    pub const fn new() -> Self {
        Self {
            handoff: Handoff::new(),
            buffer: AtomicPtr::new(core::ptr::null_mut()),
            received: AtomicUsize::new(0),
            capacity: AtomicUsize::new(0),
        }
    }

    /// Install the destination of a claimed descriptor, then arm it.
    pub fn install(&self, buffer: *mut u8, capacity: usize) {
        self.buffer.store(buffer, Ordering::Relaxed);
        self.capacity.store(capacity, Ordering::Relaxed);
        self.received.store(0, Ordering::Relaxed);
        self.handoff.arm();
    }

    /// Free the armed descriptor. This is the last write of a completion.
    ///
    /// Returns `false` if the descriptor wasn't armed; a bus reset already
    /// dropped the transfer, and the descriptor may belong to a new caller.
    pub fn try_complete(&self) -> bool {
        self.handoff.try_retire()
    }
}

/// State of the single IN datapath.
pub struct InTransfer {
    pub handoff: Handoff,
    pub ep_addr: AtomicU8,
    pub len: AtomicUsize,
}

impl InTransfer {
    pub const fn new() -> Self {
        Self {
            handoff: Handoff::new(),
            ep_addr: AtomicU8::new(0),
            len: AtomicUsize::new(0),
        }
    }

    /// Record the transfer of a claimed IN pipe.
    pub fn record(&self, ep_addr: EndpointAddress, len: usize) {
        self.ep_addr.store(ep_addr.into(), Ordering::Relaxed);
        self.len.store(len, Ordering::Relaxed);
    }

    /// Returns the recorded endpoint and length.
    ///
    /// Only meaningful once the pipe is observed armed.
    pub fn recorded(&self) -> (EndpointAddress, usize) {
        (
            EndpointAddress::from(self.ep_addr.load(Ordering::Relaxed)),
            self.len.load(Ordering::Relaxed),
        )
    }
}

/// All transfer state owned by one driver.
pub struct EndpointState {
    out: [OutTransfer; ENDPOINT_COUNT],
    tx: InTransfer,
}

impl EndpointState {
    pub const fn new() -> Self {
        const OUT: OutTransfer = OutTransfer::new();
        Self {
            out: [OUT; ENDPOINT_COUNT],
            tx: InTransfer::new(),
        }
    }

    /// Acquire the OUT descriptor for endpoint `index`.
    ///
    /// Returns `None` if the endpoint doesn't exist.
    pub fn out(&self, index: usize) -> Option<&OutTransfer> {
        self.out.get(index)
    }

    /// Acquire the IN state.
    pub fn tx(&self) -> &InTransfer {
        &self.tx
    }

    /// Drop every armed transfer without signaling completion.
    ///
    /// Used when the bus resets; nothing in flight survives a reset. A pipe
    /// that a caller is still filling in stays claimed, and that caller arms
    /// it after the reset.
    pub fn reset(&self) {
        for out in &self.out {
            out.handoff.try_retire();
        }
        self.tx.handoff.try_retire();
    }
}
