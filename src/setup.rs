//! SETUP packets

use usb_device::control::Request;

/// Bytes in a SETUP packet as it arrives in the FIFO: the request, then CRC16
pub(crate) const WIRE_LEN: usize = 10;

/// An 8-byte USB device request, as delivered to the device stack
///
/// The driver strips the CRC16 trailer before it hands the packet upward.
/// Multi-byte fields are little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupPacket([u8; 8]);

impl SetupPacket {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Take the request out of the wire bytes, dropping the CRC16.
    pub(crate) fn from_wire(wire: &[u8; WIRE_LEN]) -> Self {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&wire[..8]);
        Self(bytes)
    }

    /// Returns the raw request bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// `bmRequestType`
    pub fn request_type(&self) -> u8 {
        self.0[0]
    }

    /// `bRequest`
    pub fn request(&self) -> u8 {
        self.0[1]
    }

    /// `wValue`
    pub fn value(&self) -> u16 {
        u16::from_le_bytes([self.0[2], self.0[3]])
    }

    /// `wIndex`
    pub fn index(&self) -> u16 {
        u16::from_le_bytes([self.0[4], self.0[5]])
    }

    /// `wLength`
    pub fn length(&self) -> u16 {
        u16::from_le_bytes([self.0[6], self.0[7]])
    }

    /// Indicates if this is a standard, host-to-device SET_ADDRESS request.
    ///
    /// The driver leaves these unacknowledged until the device stack calls
    /// [`set_address()`](crate::Driver::set_address), so that the new address
    /// is in the hardware before the status stage completes.
    pub fn is_set_address(&self) -> bool {
        self.request_type() == 0x00 && self.request() == Request::SET_ADDRESS
    }
}

impl From<[u8; 8]> for SetupPacket {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}
