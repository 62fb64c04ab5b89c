//! Register access layer for the eptri USB core
//!
//! The register block follows the `ral-registers` conventions, so the
//! `read_reg!` and `write_reg!` macros work with it. Field
//! modules double as the bit definitions used by the driver when it works
//! with raw register values, and their `read` and `write` helpers do the
//! shifting and masking.

pub use ral_registers::{read_reg, write_reg, RORegister, RWRegister, WORegister};

/// Register block and field definitions for the USB core
#[allow(non_snake_case, non_upper_case_globals)]
pub mod eptri {
    use super::{RORegister, RWRegister, WORegister};

    #[repr(C)]
    pub struct RegisterBlock {
        /// Drives the external D+ pull-up
        pub PULLUP_OUT: RWRegister<u32>,
        /// Device address; the core answers tokens only for this address
        pub ADDRESS: RWRegister<u32>,
        /// Indicates which pipe the core expects to service next
        pub NEXT_EV: RORegister<u32>,
        /// Pops one byte from the SETUP FIFO
        pub SETUP_DATA: RORegister<u32>,
        pub SETUP_CTRL: WORegister<u32>,
        pub SETUP_STATUS: RORegister<u32>,
        pub SETUP_EV_STATUS: RORegister<u32>,
        pub SETUP_EV_PENDING: RWRegister<u32>,
        pub SETUP_EV_ENABLE: RWRegister<u32>,
        /// Pushes one byte into the IN FIFO
        pub IN_DATA: WORegister<u32>,
        pub IN_CTRL: WORegister<u32>,
        pub IN_STATUS: RORegister<u32>,
        pub IN_EV_STATUS: RORegister<u32>,
        pub IN_EV_PENDING: RWRegister<u32>,
        pub IN_EV_ENABLE: RWRegister<u32>,
        /// Pops one byte from the OUT FIFO
        pub OUT_DATA: RORegister<u32>,
        pub OUT_CTRL: WORegister<u32>,
        pub OUT_STATUS: RORegister<u32>,
        pub OUT_STALL: WORegister<u32>,
        pub OUT_EV_STATUS: RORegister<u32>,
        pub OUT_EV_PENDING: RWRegister<u32>,
        pub OUT_EV_ENABLE: RWRegister<u32>,
    }

    macro_rules! field {
        ($(#[$attr:meta])* $name:ident, $offset:expr, $width:expr) => {
            $(#[$attr])*
            pub mod $name {
                pub const offset: u32 = $offset;
                pub const mask: u32 = ((1 << $width) - 1) << offset;

                /// Extract this field from a raw register value
                pub const fn read(reg: u32) -> u32 {
                    (reg & mask) >> offset
                }

                /// Place `value` in this field, dropping bits that don't fit
                pub const fn write(value: u32) -> u32 {
                    (value << offset) & mask
                }
            }
        };
    }

    pub mod PULLUP_OUT {
        field!(PULLUP, 0, 1);
    }

    pub mod ADDRESS {
        field!(ADDRESS, 0, 7);
    }

    pub mod NEXT_EV {
        field!(IN, 0, 1);
        field!(OUT, 1, 1);
        field!(SETUP, 2, 1);
        field!(RESET, 3, 1);
    }

    pub mod SETUP_DATA {
        field!(DATA, 0, 8);
    }

    pub mod SETUP_CTRL {
        field!(
            /// Acknowledge the SETUP transaction, completing the status stage
            ACK, 1, 1
        );
        field!(
            /// Reset the SETUP engine and drain its FIFO
            RESET, 2, 1
        );
    }

    pub mod SETUP_STATUS {
        field!(
            /// The SETUP FIFO holds at least one byte
            HAVE, 0, 1
        );
        field!(IS_IN, 1, 1);
        field!(EPNO, 2, 4);
    }

    /// Shared by SETUP_EV_STATUS, SETUP_EV_PENDING and SETUP_EV_ENABLE
    pub mod SETUP_EV_PENDING {
        field!(
            /// A complete SETUP packet is waiting in the FIFO
            READY, 0, 1
        );
        field!(
            /// The host drove a bus reset
            RESET, 1, 1
        );
    }

    pub mod IN_DATA {
        field!(DATA, 0, 8);
    }

    pub mod IN_CTRL {
        field!(
            /// Writing the endpoint number queues the IN FIFO for that endpoint
            EPNO, 0, 4
        );
        field!(RESET, 5, 1);
        field!(STALL, 6, 1);
    }

    pub mod IN_STATUS {
        field!(IDLE, 0, 1);
        field!(HAVE, 1, 1);
        field!(PEND, 2, 1);
    }

    /// Shared by IN_EV_STATUS, IN_EV_PENDING and IN_EV_ENABLE
    pub mod IN_EV_PENDING {
        field!(
            /// The queued IN packet was sent and acknowledged
            DONE, 0, 1
        );
    }

    pub mod OUT_DATA {
        field!(DATA, 0, 8);
    }

    pub mod OUT_CTRL {
        field!(
            /// Accept the next OUT packet into the FIFO
            ENABLE, 1, 1
        );
        field!(RESET, 2, 1);
    }

    pub mod OUT_STATUS {
        field!(
            /// The OUT FIFO holds at least one byte
            HAVE, 0, 1
        );
        field!(IDLE, 1, 1);
        field!(
            /// Endpoint of the packet currently in the FIFO
            EPNO, 2, 4
        );
    }

    pub mod OUT_STALL {
        field!(EPNO, 0, 4);
        field!(STALL, 4, 1);
    }

    /// Shared by OUT_EV_STATUS, OUT_EV_PENDING and OUT_EV_ENABLE
    pub mod OUT_EV_PENDING {
        field!(
            /// An OUT packet landed in the FIFO
            DONE, 0, 1
        );
    }
}

/// A memory-mapped eptri register block
pub struct Instance {
    ptr: *const eptri::RegisterBlock,
}

// Safety: the register block is only touched through volatile accesses,
// and a `Peripherals` implementation guarantees a unique owner.
unsafe impl Send for Instance {}
unsafe impl Sync for Instance {}

impl core::ops::Deref for Instance {
    type Target = eptri::RegisterBlock;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer validity is guaranteed by the `Peripherals`
        // implementation that produced this instance.
        unsafe { &*self.ptr }
    }
}

impl Instance {
    /// Create an instance from the register block's address
    ///
    /// Usable in a `const` context, so that a driver can live in a `static`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to the eptri register block, and nothing else may
    /// access that block while this instance exists.
    pub const unsafe fn new(ptr: *const eptri::RegisterBlock) -> Self {
        Self { ptr }
    }
}

/// Convert the user's peripheral into a register block instance
pub fn instance<P: crate::Peripherals>(peripherals: P) -> Instance {
    let ptr = peripherals.eptri().cast();
    // Never hand the owner back; the driver keeps the block for good.
    core::mem::forget(peripherals);
    Instance { ptr }
}


const _: () = assert!(core::mem::size_of::<eptri::RegisterBlock>() == 22 * 4);
