//! The USB interrupt handler

use core::panic::Location;

use crate::{
    csr::{InEvents, OutEvents, Reg, Registers, SetupEvents},
    event::{DeviceStack, Event},
    ral::eptri,
    setup::{SetupPacket, WIRE_LEN},
    Driver,
};

impl<R: Registers> Driver<R> {
    /// Service the USB interrupt
    ///
    /// Call this from the USB interrupt handler. It acknowledges every
    /// pending interrupt source, then handles them in order:
    ///
    /// 1. A bus reset flushes the core, drops all in-flight transfers, and
    ///    signals [`Event::BusReset`]. Nothing else in the batch is handled.
    /// 2. A completed IN packet retires the IN pipe.
    /// 3. A received OUT packet is drained into its transfer.
    /// 4. A received SETUP packet is signaled as [`Event::SetupReceived`].
    ///
    /// Every event is signaled with `in_isr` set to `true`.
    pub fn isr(&self, stack: &mut impl DeviceStack) {
        let setup = self.regs.read(Reg::SetupEvPending);
        let tx = self.regs.read(Reg::InEvPending);
        let rx = self.regs.read(Reg::OutEvPending);
        self.regs.write(Reg::SetupEvPending, setup);
        self.regs.write(Reg::InEvPending, tx);
        self.regs.write(Reg::OutEvPending, rx);

        let setup = SetupEvents::from_bits_truncate(setup);
        if setup.contains(SetupEvents::RESET) {
            self.reset_engines();
            self.state.reset();
            debug!("RESET");
            stack.event(self.port, Event::BusReset, true);
            return;
        }

        if InEvents::from_bits_truncate(tx).contains(InEvents::DONE) {
            self.finish_tx(stack);
        }

        if OutEvents::from_bits_truncate(rx).contains(OutEvents::DONE) {
            self.process_rx(true, stack);
        }

        if setup.contains(SetupEvents::READY) {
            self.receive_setup(stack);
        }
    }

    /// Drain the SETUP FIFO, and pass the request to the device stack.
    fn receive_setup(&self, stack: &mut impl DeviceStack) {
        let mut wire = [0u8; WIRE_LEN];
        let mut len = 0usize;
        while self.regs.read(Reg::SetupStatus) & eptri::SETUP_STATUS::HAVE::mask != 0 {
            let byte = self.regs.read(Reg::SetupData) as u8;
            if let Some(slot) = wire.get_mut(len) {
                *slot = byte;
            }
            len += 1;
        }

        if len != WIRE_LEN {
            warn!("SETUP LEN {}", len);
            stack.fatal_error(Location::caller());
            return;
        }

        let setup = SetupPacket::from_wire(&wire);
        debug!("SETUP {:x}", setup.as_bytes());
        stack.event(self.port, Event::SetupReceived(setup), true);

        // Acknowledged by set_address(), once the address is in place.
        if !setup.is_set_address() {
            self.regs.write(Reg::SetupCtrl, eptri::SETUP_CTRL::ACK::mask);
        }
    }
}
