//! A USB device driver for the eptri full-speed core
//!
//! `eptri-usbd` drives the FIFO-based SETUP / IN / OUT USB core found in
//! LiteX-based FPGA SoCs, like the Fomu. It's the link layer beneath a USB
//! device stack: it moves packets between the core's FIFOs and your
//! buffers, and it reports bus resets, SETUP packets, and completed
//! transfers through a [`DeviceStack`]. Types and errors come from
//! [`usb-device`].
//!
//! To interface the library, you must define a safe implementation of
//! [`Peripherals`], or construct a register [`Instance`](ral::Instance)
//! yourself. See the [`Driver`] documentation for the lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use eptri_usbd::{timeout::Polls, DeviceStack, Driver, Event, Peripherals};
//! use usb_device::{endpoint::EndpointAddress, UsbDirection};
//!
//! struct Usb;
//! unsafe impl Peripherals for Usb {
//!     fn eptri(&self) -> *const () {
//!         0xE000_4800 as *const ()
//!     }
//! }
//!
//! struct Stack;
//! impl DeviceStack for Stack {
//!     fn event(&mut self, port: u8, event: Event, in_isr: bool) {
//!         // Hand the event to your USB device stack...
//!         # let _ = (port, event, in_isr);
//!     }
//! }
//!
//! let usb = Driver::new(Usb);
//! usb.init(&mut Stack);
//!
//! // From the USB interrupt handler:
//! usb.isr(&mut Stack);
//!
//! // Queue a packet on EP1 IN, giving up if the IN pipe stays busy.
//! let ep1_in = EndpointAddress::from_parts(1, UsbDirection::In);
//! usb.transmit(ep1_in, b"hello", Polls::new(10_000)).ok();
//! ```
//!
//! [`usb-device`]: https://crates.io/crates/usb-device

#![no_std]

#[macro_use]
mod log;

mod csr;
mod driver;
mod endpoint;
mod event;
mod isr;
mod pipe;
mod setup;
mod state;

#[cfg(test)]
mod sim;

pub mod ral;
pub mod timeout;

pub use csr::{InEvents, OutEvents, Reg, Registers, SetupEvents};
pub use driver::Driver;
pub use event::{DeviceStack, Event, TransferStatus};
pub use setup::SetupPacket;
pub use state::ENDPOINT_COUNT;

/// A type that owns the USB register block
///
/// An implementation of `Peripherals` is expected to own the eptri core's
/// control and status registers.
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that owns the
/// register block required for all USB operation. The pointer returned by
/// the method is assumed to be valid, and will be cast to a register
/// definition.
///
/// # Example
///
/// A safe implementation of `Peripherals` for a SoC that exposes the core
/// at a fixed address, and hands out a single owner.
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use eptri_usbd::Peripherals;
///
/// const USB_BASE: usize = 0xE000_4800;
///
/// pub struct Usb(());
///
/// impl Usb {
///     /// Returns `None` if the registers are already taken
///     pub fn take() -> Option<Usb> {
///         static TAKEN: AtomicBool = AtomicBool::new(false);
///         (!TAKEN.swap(true, Ordering::SeqCst)).then(|| Usb(()))
///     }
/// }
///
/// unsafe impl Peripherals for Usb {
///     fn eptri(&self) -> *const () {
///         USB_BASE as *const ()
///     }
/// }
///
/// let usb = Usb::take().unwrap();
/// assert_eq!(usb.eptri(), 0xE000_4800 as *const ());
/// assert!(Usb::take().is_none());
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the eptri register block
    fn eptri(&self) -> *const ();
}
