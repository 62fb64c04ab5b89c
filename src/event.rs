//! Events delivered to the USB device stack

use core::panic::Location;

use usb_device::endpoint::EndpointAddress;

use crate::setup::SetupPacket;

/// Outcome of a completed transfer
///
/// The core doesn't report wire-level errors to software, so every
/// completion is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransferStatus {
    Success,
}

/// Something the device stack needs to know about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The host reset the bus, or the driver initialized the core.
    ///
    /// All in-flight transfers were dropped without completing.
    BusReset,
    /// A transfer finished.
    ///
    /// For an OUT transfer, the buffer you supplied now holds `len` bytes,
    /// and you own it again.
    TransferComplete {
        ep_addr: EndpointAddress,
        len: usize,
        status: TransferStatus,
    },
    /// The host sent a SETUP packet.
    SetupReceived(SetupPacket),
}

/// The USB device stack that sits above the driver
///
/// The driver calls into the stack from the interrupt handler and from
/// transfer submissions. `in_isr` tells you which: when it's `true`, you're
/// in interrupt context and should defer any heavy work.
pub trait DeviceStack {
    /// Handle an event from USB `port`.
    fn event(&mut self, port: u8, event: Event, in_isr: bool);

    /// Handle an unrecoverable driver error.
    ///
    /// `location` identifies the code that detected the error. The driver
    /// doesn't attempt to recover after calling this; you're expected to halt
    /// or reset the system. The default implementation panics.
    fn fatal_error(&mut self, location: &'static Location<'static>) {
        panic!("USB fatal error at {}", location);
    }
}

impl<S: DeviceStack + ?Sized> DeviceStack for &mut S {
    fn event(&mut self, port: u8, event: Event, in_isr: bool) {
        (**self).event(port, event, in_isr)
    }
    fn fatal_error(&mut self, location: &'static Location<'static>) {
        (**self).fatal_error(location)
    }
}
