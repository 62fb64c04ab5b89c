//! Register access used by the driver
//!
//! The driver never dereferences the register block directly. It loads and
//! stores whole registers through [`Registers`], and works with fields using
//! the masks and offsets in [`ral::eptri`](crate::ral::eptri). The
//! memory-mapped [`Instance`](crate::ral::Instance) is the production
//! implementation; anything else that behaves like the core (a simulator, a
//! bridge over a debug bus) can implement the trait, too.

use crate::ral;

/// Names a control and status register of the USB core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    PullupOut,
    Address,
    NextEv,
    SetupData,
    SetupCtrl,
    SetupStatus,
    SetupEvStatus,
    SetupEvPending,
    SetupEvEnable,
    InData,
    InCtrl,
    InStatus,
    InEvStatus,
    InEvPending,
    InEvEnable,
    OutData,
    OutCtrl,
    OutStatus,
    OutStall,
    OutEvStatus,
    OutEvPending,
    OutEvEnable,
}

/// Load / store access to the USB core registers
///
/// Implementations must preserve the core's side effects:
///
/// - reading `SetupData` or `OutData` pops one byte from that FIFO, and
///   writing `InData` pushes one byte into the IN FIFO.
/// - writing an `*EvPending` register clears exactly the bits that are set
///   in the written value.
/// - reading a write-only register returns zero, and writing a read-only
///   register has no effect.
pub trait Registers {
    /// Load the register
    fn read(&self, reg: Reg) -> u32;
    /// Store `value` into the register
    fn write(&self, reg: Reg, value: u32);
}

impl<R: Registers + ?Sized> Registers for &R {
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }
    fn write(&self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

impl Registers for ral::Instance {
    fn read(&self, reg: Reg) -> u32 {
        match reg {
            Reg::PullupOut => ral::read_reg!(ral::eptri, self, PULLUP_OUT),
            Reg::Address => ral::read_reg!(ral::eptri, self, ADDRESS),
            Reg::NextEv => ral::read_reg!(ral::eptri, self, NEXT_EV),
            Reg::SetupData => ral::read_reg!(ral::eptri, self, SETUP_DATA),
            Reg::SetupStatus => ral::read_reg!(ral::eptri, self, SETUP_STATUS),
            Reg::SetupEvStatus => ral::read_reg!(ral::eptri, self, SETUP_EV_STATUS),
            Reg::SetupEvPending => ral::read_reg!(ral::eptri, self, SETUP_EV_PENDING),
            Reg::SetupEvEnable => ral::read_reg!(ral::eptri, self, SETUP_EV_ENABLE),
            Reg::InStatus => ral::read_reg!(ral::eptri, self, IN_STATUS),
            Reg::InEvStatus => ral::read_reg!(ral::eptri, self, IN_EV_STATUS),
            Reg::InEvPending => ral::read_reg!(ral::eptri, self, IN_EV_PENDING),
            Reg::InEvEnable => ral::read_reg!(ral::eptri, self, IN_EV_ENABLE),
            Reg::OutData => ral::read_reg!(ral::eptri, self, OUT_DATA),
            Reg::OutStatus => ral::read_reg!(ral::eptri, self, OUT_STATUS),
            Reg::OutEvStatus => ral::read_reg!(ral::eptri, self, OUT_EV_STATUS),
            Reg::OutEvPending => ral::read_reg!(ral::eptri, self, OUT_EV_PENDING),
            Reg::OutEvEnable => ral::read_reg!(ral::eptri, self, OUT_EV_ENABLE),
            Reg::SetupCtrl | Reg::InData | Reg::InCtrl | Reg::OutCtrl | Reg::OutStall => 0,
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        match reg {
            Reg::PullupOut => ral::write_reg!(ral::eptri, self, PULLUP_OUT, value),
            Reg::Address => ral::write_reg!(ral::eptri, self, ADDRESS, value),
            Reg::SetupCtrl => ral::write_reg!(ral::eptri, self, SETUP_CTRL, value),
            Reg::SetupEvPending => ral::write_reg!(ral::eptri, self, SETUP_EV_PENDING, value),
            Reg::SetupEvEnable => ral::write_reg!(ral::eptri, self, SETUP_EV_ENABLE, value),
            Reg::InData => ral::write_reg!(ral::eptri, self, IN_DATA, value),
            Reg::InCtrl => ral::write_reg!(ral::eptri, self, IN_CTRL, value),
            Reg::InEvPending => ral::write_reg!(ral::eptri, self, IN_EV_PENDING, value),
            Reg::InEvEnable => ral::write_reg!(ral::eptri, self, IN_EV_ENABLE, value),
            Reg::OutCtrl => ral::write_reg!(ral::eptri, self, OUT_CTRL, value),
            Reg::OutStall => ral::write_reg!(ral::eptri, self, OUT_STALL, value),
            Reg::OutEvPending => ral::write_reg!(ral::eptri, self, OUT_EV_PENDING, value),
            Reg::OutEvEnable => ral::write_reg!(ral::eptri, self, OUT_EV_ENABLE, value),
            Reg::NextEv
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

bitflags::bitflags! {
    /// Interrupt sources of the SETUP pipe
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SetupEvents : u32 {
        const READY = ral::eptri::SETUP_EV_PENDING::READY::mask;
        const RESET = ral::eptri::SETUP_EV_PENDING::RESET::mask;
    }
}

bitflags::bitflags! {
    /// Interrupt sources of the IN pipe
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InEvents : u32 {
        const DONE = ral::eptri::IN_EV_PENDING::DONE::mask;
    }
}

bitflags::bitflags! {
    /// Interrupt sources of the OUT pipe
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutEvents : u32 {
        const DONE = ral::eptri::OUT_EV_PENDING::DONE::mask;
    }
}
