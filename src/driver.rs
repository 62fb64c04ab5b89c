//! The USB driver
//!
//! [`Driver`] owns the eptri register block and the transfer state of one
//! USB port. Every method takes `&self`: the interrupt handler and your
//! code share one `Driver`, usually in a `static`, and coordinate through
//! atomics in the transfer state.

use core::sync::atomic::AtomicBool;

use usb_device::{endpoint::EndpointAddress, UsbDirection, UsbError};

use crate::{
    csr::{InEvents, OutEvents, Reg, Registers, SetupEvents},
    event::{DeviceStack, Event, TransferStatus},
    ral::{self, eptri},
    state::{EndpointState, ENDPOINT_COUNT},
    timeout::{self, Deadline},
};

/// A USB driver for the eptri core
///
/// After you create a `Driver`, call [`init()`](Driver::init) once, then
/// call [`isr()`](Driver::isr) from the USB interrupt handler. Submit
/// transfers with [`xfer()`](Driver::xfer) or
/// [`transmit()`](Driver::transmit); the driver reports their completion
/// through your [`DeviceStack`].
///
/// # Example
///
/// A driver that lives in a `static`, given the register block's address.
///
/// ```
/// use eptri_usbd::{ral, Driver};
///
/// static USB: Driver = Driver::from_registers(unsafe {
///     ral::Instance::new(0xE000_4800 as *const _)
/// });
///
/// assert_eq!(USB.port(), 0);
/// ```
pub struct Driver<R = ral::Instance> {
    pub(crate) regs: R,
    pub(crate) state: EndpointState,
    /// Held by whichever context is draining the OUT FIFO.
    pub(crate) rx_busy: AtomicBool,
    /// Another drain was requested while `rx_busy` was held.
    pub(crate) rx_pending: AtomicBool,
    pub(crate) port: u8,
}

impl Driver<ral::Instance> {
    /// Create a driver that owns the USB registers in `peripherals`
    ///
    /// Creation doesn't touch the hardware. Call [`init()`](Driver::init)
    /// before anything else.
    pub fn new<P: crate::Peripherals>(peripherals: P) -> Self {
        Self::from_registers(ral::instance(peripherals))
    }
}

impl<R> Driver<R> {
    /// Create a driver that accesses the core through `regs`
    pub const fn from_registers(regs: R) -> Self {
        Self {
            regs,
            state: EndpointState::new(),
            rx_busy: AtomicBool::new(false),
            rx_pending: AtomicBool::new(false),
            port: 0,
        }
    }

    /// Set the port number that's reported with every event
    ///
    /// The default port is 0.
    pub const fn with_port(mut self, port: u8) -> Self {
        self.port = port;
        self
    }

    /// Returns the port number reported with every event.
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Returns the register access used by this driver.
    pub fn registers(&self) -> &R {
        &self.regs
    }
}

impl<R: Registers> Driver<R> {
    /// Initialize the USB core, and connect to the bus
    ///
    /// Disconnects, resets every engine, acknowledges stale interrupts,
    /// and enables all interrupt sources before enabling the D+ pull-up.
    /// All in-flight transfers are dropped. Signals
    /// [`Event::BusReset`] from thread context when the core is ready.
    ///
    /// Assumes that the USB clocks are already running.
    pub fn init(&self, stack: &mut impl DeviceStack) {
        self.regs.write(Reg::PullupOut, 0);
        self.regs.write(Reg::Address, 0);
        self.regs.write(Reg::OutCtrl, 0);
        self.interrupt_disable();

        self.reset_engines();

        // Acknowledge anything left over from a previous session.
        for pending in [Reg::SetupEvPending, Reg::InEvPending, Reg::OutEvPending] {
            let stale = self.regs.read(pending);
            self.regs.write(pending, stale);
        }

        self.interrupt_enable();
        self.regs.write(Reg::OutCtrl, eptri::OUT_CTRL::ENABLE::mask);
        self.state.reset();

        self.regs.write(Reg::PullupOut, eptri::PULLUP_OUT::PULLUP::mask);
        debug!("INIT");

        stack.event(self.port, Event::BusReset, false);
    }

    /// Enable all USB interrupt sources
    pub fn interrupt_enable(&self) {
        self.regs.write(
            Reg::SetupEvEnable,
            (SetupEvents::READY | SetupEvents::RESET).bits(),
        );
        self.regs.write(Reg::InEvEnable, InEvents::DONE.bits());
        self.regs.write(Reg::OutEvEnable, OutEvents::DONE.bits());
    }

    /// Mask all USB interrupt sources
    ///
    /// Events that occur while masked stay pending, and interrupt once
    /// you [`interrupt_enable()`](Driver::interrupt_enable).
    pub fn interrupt_disable(&self) {
        self.regs.write(Reg::SetupEvEnable, 0);
        self.regs.write(Reg::InEvEnable, 0);
        self.regs.write(Reg::OutEvEnable, 0);
    }

    /// Assign the USB device address, and complete the SET_ADDRESS request
    ///
    /// The driver doesn't acknowledge a SET_ADDRESS SETUP packet on its own.
    /// Call this once the device stack has decoded the request; the address
    /// is written before the acknowledgment, so the status stage finishes at
    /// the new address.
    pub fn set_address(&self, address: u8) {
        self.regs.write(
            Reg::Address,
            eptri::ADDRESS::ADDRESS::write(u32::from(address)),
        );
        self.regs.write(Reg::SetupCtrl, eptri::SETUP_CTRL::ACK::mask);
        debug!("ADDRESS {}", address);
    }

    /// The device stack selected a configuration
    ///
    /// The core needs nothing; endpoints are always live.
    pub fn set_config(&self, config: u8) {
        let _ = config;
        trace!("CONFIG {}", config);
    }

    /// Signal remote wakeup to the host
    ///
    /// The core can't drive resume signaling, so this does nothing.
    pub fn remote_wakeup(&self) {
        trace!("WAKEUP unsupported");
    }

    /// Submit a transfer
    ///
    /// For an IN endpoint, the driver copies `len` bytes from `buffer` into
    /// the IN FIFO and queues them for the host. The call returns as soon as
    /// the bytes are queued; [`Event::TransferComplete`] follows from the
    /// interrupt handler once the host acknowledges them. A zero-length
    /// submission on EP0 IN with a null `buffer` is the status stage of a
    /// control transfer, and completes before this call returns.
    ///
    /// For an OUT endpoint, the driver receives packets into `buffer` until
    /// it holds `len` bytes, then signals [`Event::TransferComplete`]. Any
    /// packet that's already waiting in the OUT FIFO is drained before this
    /// call returns, so the completion may be signaled from this call.
    ///
    /// There's one IN datapath, and one OUT descriptor per endpoint. If the
    /// previous transfer hasn't retired, the call waits until it does, or
    /// until `deadline` expires.
    ///
    /// # Errors
    ///
    /// - [`UsbError::InvalidEndpoint`] if the endpoint number isn't below
    ///   [`ENDPOINT_COUNT`](crate::ENDPOINT_COUNT).
    /// - [`UsbError::WouldBlock`] if `deadline` expired before the pipe was
    ///   free. Nothing was submitted.
    ///
    /// # Safety
    ///
    /// For an IN endpoint, `buffer` must be valid for `len` reads for the
    /// duration of this call.
    ///
    /// For an OUT endpoint, `buffer` must be valid for `len` writes, and
    /// nothing else may access it, until the driver signals completion or a
    /// bus reset. The driver writes into it from interrupt context.
    pub unsafe fn xfer(
        &self,
        ep_addr: EndpointAddress,
        buffer: *mut u8,
        len: usize,
        deadline: impl Deadline,
        stack: &mut impl DeviceStack,
    ) -> Result<(), UsbError> {
        let index = ep_addr.index();
        if index >= ENDPOINT_COUNT {
            return Err(UsbError::InvalidEndpoint);
        }

        match ep_addr.direction() {
            UsbDirection::In if index == 0 && len == 0 && buffer.is_null() => {
                // The core answers the status stage by itself.
                debug!("EP0 IN STATUS");
                stack.event(
                    self.port,
                    Event::TransferComplete {
                        ep_addr,
                        len: 0,
                        status: TransferStatus::Success,
                    },
                    false,
                );
                Ok(())
            }
            UsbDirection::In => {
                let data = if len == 0 {
                    &[][..]
                } else {
                    // Safety: caller guarantees `len` readable bytes.
                    unsafe { core::slice::from_raw_parts(buffer, len) }
                };
                self.start_in(ep_addr, data, deadline)
            }
            UsbDirection::Out => self.start_out(ep_addr, buffer, len, deadline, stack),
        }
    }

    /// Queue `data` for the host on an IN endpoint
    ///
    /// A safe form of [`xfer()`](Driver::xfer) for IN transfers. The bytes
    /// are copied into the FIFO before this returns. An empty `data` sends a
    /// zero-length packet on any endpoint, EP0 included.
    ///
    /// # Errors
    ///
    /// [`UsbError::InvalidEndpoint`] if `ep_addr` isn't an IN endpoint
    /// below [`ENDPOINT_COUNT`](crate::ENDPOINT_COUNT). Otherwise, the same
    /// as `xfer()`.
    pub fn transmit(
        &self,
        ep_addr: EndpointAddress,
        data: &[u8],
        deadline: impl Deadline,
    ) -> Result<(), UsbError> {
        if ep_addr.index() >= ENDPOINT_COUNT || ep_addr.direction() != UsbDirection::In {
            return Err(UsbError::InvalidEndpoint);
        }
        self.start_in(ep_addr, data, deadline)
    }

    /// Returns `true` if an IN transfer is queued, or being queued.
    pub fn is_in_busy(&self) -> bool {
        !self.state.tx().handoff.is_free()
    }

    /// Returns `true` if endpoint `index` has an OUT transfer waiting for
    /// data.
    pub fn is_out_armed(&self, index: usize) -> bool {
        self.state
            .out(index)
            .map_or(false, |out| out.handoff.is_armed())
    }

    /// Returns the bytes received so far by the OUT transfer on endpoint
    /// `index`.
    ///
    /// Returns `None` if there's no OUT transfer in progress.
    pub fn out_received(&self, index: usize) -> Option<usize> {
        let out = self.state.out(index)?;
        out.handoff
            .is_armed()
            .then(|| out.received.load(core::sync::atomic::Ordering::Relaxed))
    }

    /// Copy `data` into the IN FIFO, and hand the IN pipe to the interrupt
    /// handler.
    fn start_in(
        &self,
        ep_addr: EndpointAddress,
        data: &[u8],
        deadline: impl Deadline,
    ) -> Result<(), UsbError> {
        let tx = self.state.tx();
        if !timeout::wait_until(|| tx.handoff.try_claim(), deadline) {
            warn!("EP{} IN BUSY", ep_addr.index());
            return Err(UsbError::WouldBlock);
        }

        tx.record(ep_addr, data.len());
        for &byte in data {
            self.regs.write(Reg::InData, u32::from(byte));
        }
        // Armed before the core can finish; the completion interrupt
        // must see the recorded transfer.
        tx.handoff.arm();
        self.regs.write(
            Reg::InCtrl,
            eptri::IN_CTRL::EPNO::write(ep_addr.index() as u32),
        );

        debug!("EP{} IN {}", ep_addr.index(), data.len());
        Ok(())
    }

    /// Arm the OUT descriptor, then drain anything that's already waiting.
    fn start_out(
        &self,
        ep_addr: EndpointAddress,
        buffer: *mut u8,
        len: usize,
        deadline: impl Deadline,
        stack: &mut impl DeviceStack,
    ) -> Result<(), UsbError> {
        let out = self
            .state
            .out(ep_addr.index())
            .ok_or(UsbError::InvalidEndpoint)?;
        if !timeout::wait_until(|| out.handoff.try_claim(), deadline) {
            warn!("EP{} OUT BUSY", ep_addr.index());
            return Err(UsbError::WouldBlock);
        }

        out.install(buffer, len);
        debug!("EP{} OUT {}", ep_addr.index(), len);

        self.process_rx(false, stack);
        Ok(())
    }

    /// Reset the SETUP, IN, and OUT engines, flushing their FIFOs.
    pub(crate) fn reset_engines(&self) {
        self.regs.write(Reg::SetupCtrl, eptri::SETUP_CTRL::RESET::mask);
        self.regs.write(Reg::InCtrl, eptri::IN_CTRL::RESET::mask);
        self.regs.write(Reg::OutCtrl, eptri::OUT_CTRL::RESET::mask);
    }
}
