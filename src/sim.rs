//! A simulated USB core for driver tests
//!
//! The simulation keeps the side effects that the driver relies on: FIFO
//! status bits follow FIFO contents, pending bits are write-1-to-clear, and
//! an OUT packet lands in the FIFO only while OUT reception is enabled. Every
//! register write is logged.

extern crate std;

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    vec::Vec,
};

use core::panic::Location;

use crate::{
    csr::{Reg, Registers},
    event::{DeviceStack, Event},
    ral::eptri,
    Driver,
};

/// Any two bytes will do; the core doesn't check the CRC for us.
const CRC: [u8; 2] = [0xC3, 0x3C];

#[derive(Default)]
struct Core {
    pullup: u32,
    address: u32,

    setup_fifo: VecDeque<u8>,
    setup_pending: u32,
    setup_enable: u32,

    in_fifo: Vec<u8>,
    in_queued: Option<u32>,
    in_pending: u32,
    in_enable: u32,

    out_fifo: VecDeque<u8>,
    out_epno: u32,
    out_enabled: bool,
    out_queue: VecDeque<(u32, Vec<u8>)>,
    out_pending: u32,
    out_enable: u32,

    writes: Vec<(Reg, u32)>,
}

impl Core {
    /// Move the host's next OUT packet into the FIFO, if the core accepts it.
    fn land_out(&mut self) {
        if !self.out_enabled || !self.out_fifo.is_empty() {
            return;
        }
        if let Some((epno, bytes)) = self.out_queue.pop_front() {
            self.out_epno = epno;
            self.out_fifo.extend(bytes);
            self.out_enabled = false;
            self.out_pending |= eptri::OUT_EV_PENDING::DONE::mask;
        }
    }
}

pub struct Sim {
    core: RefCell<Core>,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            core: RefCell::new(Core::default()),
        }
    }

    /// The host sends a SETUP packet; `bytes` already includes any CRC.
    pub fn host_setup_raw(&self, bytes: &[u8]) {
        let mut core = self.core.borrow_mut();
        core.setup_fifo.extend(bytes.iter().copied());
        core.setup_pending |= eptri::SETUP_EV_PENDING::READY::mask;
    }

    /// The host sends a well-formed SETUP packet.
    pub fn host_setup(&self, request: [u8; 8]) {
        let mut wire = Vec::from(request);
        wire.extend_from_slice(&CRC);
        self.host_setup_raw(&wire);
    }

    /// The host sends an OUT packet to endpoint `epno`.
    pub fn host_out(&self, epno: u32, payload: &[u8]) {
        let mut wire = Vec::from(payload);
        wire.extend_from_slice(&CRC);
        let mut core = self.core.borrow_mut();
        core.out_queue.push_back((epno, wire));
        core.land_out();
    }

    /// The host acknowledges the queued IN packet.
    ///
    /// Returns the endpoint and the bytes that were sent.
    pub fn host_in_ack(&self) -> Option<(u32, Vec<u8>)> {
        let mut core = self.core.borrow_mut();
        let epno = core.in_queued.take()?;
        let bytes = core.in_fifo.drain(..).collect();
        core.in_pending |= eptri::IN_EV_PENDING::DONE::mask;
        Some((epno, bytes))
    }

    /// The host resets the bus.
    pub fn host_reset(&self) {
        self.core.borrow_mut().setup_pending |= eptri::SETUP_EV_PENDING::RESET::mask;
    }

    /// Raise the IN "done" interrupt without a transfer.
    pub fn spurious_in(&self) {
        self.core.borrow_mut().in_pending |= eptri::IN_EV_PENDING::DONE::mask;
    }

    /// Indicates if the core would assert its interrupt line.
    pub fn irq(&self) -> bool {
        let core = self.core.borrow();
        (core.setup_pending & core.setup_enable)
            | (core.in_pending & core.in_enable)
            | (core.out_pending & core.out_enable)
            != 0
    }

    pub fn pullup(&self) -> bool {
        self.core.borrow().pullup != 0
    }

    pub fn address(&self) -> u32 {
        self.core.borrow().address
    }

    /// Bytes sitting in the IN FIFO.
    pub fn in_fifo(&self) -> Vec<u8> {
        self.core.borrow().in_fifo.clone()
    }

    /// Bytes left in the OUT FIFO.
    pub fn out_fifo_len(&self) -> usize {
        self.core.borrow().out_fifo.len()
    }

    pub fn setup_fifo_len(&self) -> usize {
        self.core.borrow().setup_fifo.len()
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<(Reg, u32)> {
        self.core.borrow().writes.clone()
    }

    /// Every value written to `reg`, in order.
    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.core
            .borrow()
            .writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.core.borrow_mut().writes.clear();
    }
}

impl Registers for Sim {
    fn read(&self, reg: Reg) -> u32 {
        let mut core = self.core.borrow_mut();
        match reg {
            Reg::PullupOut => core.pullup,
            Reg::Address => core.address,
            Reg::SetupData => core.setup_fifo.pop_front().map_or(0, u32::from),
            Reg::SetupStatus => (!core.setup_fifo.is_empty()) as u32,
            Reg::SetupEvStatus | Reg::SetupEvPending => core.setup_pending,
            Reg::SetupEvEnable => core.setup_enable,
            Reg::InStatus => core.in_queued.is_none() as u32,
            Reg::InEvStatus | Reg::InEvPending => core.in_pending,
            Reg::InEvEnable => core.in_enable,
            Reg::OutData => core.out_fifo.pop_front().map_or(0, u32::from),
            Reg::OutStatus => {
                let have = !core.out_fifo.is_empty() as u32;
                have | eptri::OUT_STATUS::EPNO::write(core.out_epno)
            }
            Reg::OutEvStatus | Reg::OutEvPending => core.out_pending,
            Reg::OutEvEnable => core.out_enable,
            Reg::NextEv
            | Reg::SetupCtrl
            | Reg::InData
            | Reg::InCtrl
            | Reg::OutCtrl
            | Reg::OutStall => 0,
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        let mut core = self.core.borrow_mut();
        core.writes.push((reg, value));
        match reg {
            Reg::PullupOut => core.pullup = value,
            Reg::Address => core.address = value,
            Reg::SetupCtrl => {
                if value & eptri::SETUP_CTRL::RESET::mask != 0 {
                    core.setup_fifo.clear();
                }
            }
            Reg::SetupEvPending => core.setup_pending &= !value,
            Reg::SetupEvEnable => core.setup_enable = value,
            Reg::InData => core.in_fifo.push(value as u8),
            Reg::InCtrl => {
                if value & eptri::IN_CTRL::RESET::mask != 0 {
                    core.in_fifo.clear();
                    core.in_queued = None;
                } else if value & eptri::IN_CTRL::STALL::mask == 0 {
                    core.in_queued = Some(eptri::IN_CTRL::EPNO::read(value));
                }
            }
            Reg::InEvPending => core.in_pending &= !value,
            Reg::InEvEnable => core.in_enable = value,
            Reg::OutCtrl => {
                if value & eptri::OUT_CTRL::RESET::mask != 0 {
                    core.out_fifo.clear();
                }
                core.out_enabled = value & eptri::OUT_CTRL::ENABLE::mask != 0;
                core.land_out();
            }
            Reg::OutEvPending => core.out_pending &= !value,
            Reg::OutEvEnable => core.out_enable = value,
            Reg::OutStall
            | Reg::NextEv
            | Reg::SetupData
            | Reg::SetupStatus
            | Reg::SetupEvStatus
            | Reg::InStatus
            | Reg::InEvStatus
            | Reg::OutData
            | Reg::OutStatus
            | Reg::OutEvStatus => {}
        }
    }
}

/// A device stack that remembers everything it's told
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<(u8, Event, bool)>,
    pub fatal: Vec<&'static Location<'static>>,
}

impl Recorder {
    /// Events without their port and context.
    pub fn events(&self) -> Vec<Event> {
        self.events.iter().map(|(_, event, _)| *event).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.fatal.clear();
    }
}

impl DeviceStack for Recorder {
    fn event(&mut self, port: u8, event: Event, in_isr: bool) {
        self.events.push((port, event, in_isr));
    }
    fn fatal_error(&mut self, location: &'static Location<'static>) {
        self.fatal.push(location);
    }
}

/// A driver that's finished `init()`, with the init writes and events
/// forgotten.
pub fn initialized() -> (Driver<Sim>, Recorder) {
    let driver = Driver::from_registers(Sim::new());
    let mut stack = Recorder::default();
    driver.init(&mut stack);
    stack.clear();
    driver.registers().clear_writes();
    (driver, stack)
}

/// A simulated core that interrupts its driver in the middle of a register
/// access
///
/// Arm it with [`interrupt_on()`](Interrupting::interrupt_on). After the
/// chosen access completes, the host does something to the core, and then
/// the driver's interrupt handler runs before the access returns. That's
/// what the hardware does to a thread that's between two register accesses.
pub struct Interrupting<'a> {
    sim: Sim,
    driver: Cell<Option<&'a Driver<Interrupting<'a>>>>,
    trigger: Cell<Option<(Reg, usize)>>,
    host: Cell<Option<fn(&Sim)>>,
    /// Everything the interrupt handler signaled.
    pub isr_stack: RefCell<Recorder>,
}

impl<'a> Interrupting<'a> {
    pub fn new() -> Self {
        Self {
            sim: Sim::new(),
            driver: Cell::new(None),
            trigger: Cell::new(None),
            host: Cell::new(None),
            isr_stack: RefCell::new(Recorder::default()),
        }
    }

    /// Give the core the driver whose interrupt handler it runs.
    pub fn attach(&self, driver: &'a Driver<Interrupting<'a>>) {
        self.driver.set(Some(driver));
    }

    /// Interrupt the driver once, on its `nth` access to `reg`, counting
    /// from 1. `host` acts on the core just before the interrupt.
    pub fn interrupt_on(&self, reg: Reg, nth: usize, host: fn(&Sim)) {
        self.trigger.set(Some((reg, nth)));
        self.host.set(Some(host));
    }

    /// Events the interrupt handler signaled, without port and context.
    pub fn isr_events(&self) -> Vec<Event> {
        self.isr_stack.borrow().events()
    }

    fn accessed(&self, reg: Reg) {
        let Some((target, nth)) = self.trigger.get() else {
            return;
        };
        if target != reg {
            return;
        }
        if nth > 1 {
            self.trigger.set(Some((target, nth - 1)));
            return;
        }
        self.trigger.set(None);
        if let Some(host) = self.host.take() {
            host(&self.sim);
        }
        if let Some(driver) = self.driver.get() {
            driver.isr(&mut *self.isr_stack.borrow_mut());
        }
    }
}

impl core::ops::Deref for Interrupting<'_> {
    type Target = Sim;
    fn deref(&self) -> &Sim {
        &self.sim
    }
}

impl Registers for Interrupting<'_> {
    fn read(&self, reg: Reg) -> u32 {
        let value = self.sim.read(reg);
        self.accessed(reg);
        value
    }

    fn write(&self, reg: Reg, value: u32) {
        self.sim.write(reg, value);
        self.accessed(reg);
    }
}

#[cfg(test)]
mod tests {
    use super::Sim;
    use crate::csr::{Reg, Registers};

    #[test]
    fn out_packet_waits_for_enable() {
        let sim = Sim::new();
        sim.host_out(1, &[1, 2, 3]);
        assert_eq!(sim.read(Reg::OutStatus) & 1, 0);
        assert_eq!(sim.read(Reg::OutEvPending), 0);

        sim.write(Reg::OutCtrl, 2);
        assert_eq!(sim.read(Reg::OutStatus), 1 | (1 << 2));
        assert_eq!(sim.read(Reg::OutEvPending), 1);
        assert_eq!(sim.out_fifo_len(), 5);
    }

    #[test]
    fn pending_bits_clear_on_write_back() {
        let sim = Sim::new();
        sim.host_reset();
        sim.host_setup([0; 8]);
        let pending = sim.read(Reg::SetupEvPending);
        assert_eq!(pending, 0b11);
        sim.write(Reg::SetupEvPending, 0b10);
        assert_eq!(sim.read(Reg::SetupEvPending), 0b01);
        sim.write(Reg::SetupEvPending, pending);
        assert_eq!(sim.read(Reg::SetupEvPending), 0);
    }
}
