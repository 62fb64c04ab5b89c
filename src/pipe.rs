//! The RX and TX engines
//!
//! The OUT FIFO holds one packet at a time. The RX engine moves it into the
//! armed descriptor for the packet's endpoint, then re-enables reception.
//! Both the interrupt handler and a submitting caller run the engine. An
//! atomic flag keeps them from draining the FIFO at the same time, and a
//! context that finds the engine busy leaves a request that the holder
//! serves before it lets go.

use core::sync::atomic::Ordering;

use usb_device::{endpoint::EndpointAddress, UsbDirection};

use crate::{
    csr::{Reg, Registers},
    event::{DeviceStack, Event, TransferStatus},
    ral::eptri,
    Driver,
};

/// CRC16 that trails every data packet in the OUT FIFO.
const CRC_LEN: usize = 2;

impl<R: Registers> Driver<R> {
    /// Drain the packet in the OUT FIFO, if there is one.
    ///
    /// If another context is draining, this only leaves a request behind.
    /// That context drains again before it releases the engine, so a packet
    /// that lands during its drain isn't stranded.
    pub(crate) fn process_rx(&self, in_isr: bool, stack: &mut impl DeviceStack) {
        self.rx_pending.store(true, Ordering::Release);
        loop {
            if self
                .rx_busy
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                trace!("RX BUSY");
                return;
            }
            while self.rx_pending.swap(false, Ordering::AcqRel) {
                self.drain_out(in_isr, stack);
            }
            self.rx_busy.store(false, Ordering::Release);

            // A request that arrived after the last swap, but before the
            // release, has nobody else to serve it.
            if !self.rx_pending.load(Ordering::Acquire) {
                return;
            }
        }
    }

    fn drain_out(&self, in_isr: bool, stack: &mut impl DeviceStack) {
        let status = self.regs.read(Reg::OutStatus);
        if status & eptri::OUT_STATUS::HAVE::mask == 0 {
            return;
        }
        let index = eptri::OUT_STATUS::EPNO::read(status) as usize;
        let Some(out) = self.state.out(index) else {
            return;
        };

        let armed = out.handoff.is_armed();
        let (buffer, capacity, received) = if armed {
            (
                out.buffer.load(Ordering::Relaxed),
                out.capacity.load(Ordering::Relaxed),
                out.received.load(Ordering::Relaxed),
            )
        } else {
            (core::ptr::null_mut(), 0, 0)
        };

        // The whole packet leaves the FIFO, whether or not it fits.
        let mut offset = received;
        let mut total = 0usize;
        while self.regs.read(Reg::OutStatus) & eptri::OUT_STATUS::HAVE::mask != 0 {
            let byte = self.regs.read(Reg::OutData) as u8;
            total += 1;
            if offset < capacity {
                // Safety: the caller that armed the descriptor guaranteed
                // `capacity` writable bytes until completion.
                unsafe { buffer.add(offset).write(byte) };
                offset += 1;
            }
        }

        let payload = total.saturating_sub(CRC_LEN);
        let received = (received + payload).min(capacity);

        // A bus reset may have dropped the transfer while we drained.
        if armed && out.handoff.is_armed() {
            out.received.store(received, Ordering::Relaxed);
            trace!("EP{} OUT +{} ({}/{})", index, payload, received, capacity);
            if received == capacity && out.try_complete() {
                debug!("EP{} OUT DONE {}", index, received);
                stack.event(
                    self.port,
                    Event::TransferComplete {
                        ep_addr: EndpointAddress::from_parts(index, UsbDirection::Out),
                        len: received,
                        status: TransferStatus::Success,
                    },
                    in_isr,
                );
            }
        } else {
            warn!("EP{} OUT DISCARD {}", index, payload);
        }

        self.regs.write(Reg::OutCtrl, eptri::OUT_CTRL::ENABLE::mask);
    }

    /// Retire the IN pipe after the host acknowledged its packet.
    pub(crate) fn finish_tx(&self, stack: &mut impl DeviceStack) {
        let tx = self.state.tx();
        if !tx.handoff.is_armed() {
            trace!("IN SPURIOUS");
            return;
        }
        let (ep_addr, len) = tx.recorded();
        if !tx.handoff.try_retire() {
            return;
        }
        debug!("EP{} IN DONE {}", ep_addr.index(), len);
        stack.event(
            self.port,
            Event::TransferComplete {
                ep_addr,
                len,
                status: TransferStatus::Success,
            },
            true,
        );
    }
}
