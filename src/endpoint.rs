//! Endpoint configuration and stalls
//!
//! The core has no per-endpoint configuration. Every endpoint number is
//! live in both directions from the moment the core is enabled, and a
//! packet's endpoint is carried in the FIFO status. Opening an endpoint only
//! checks that the core can serve it.

use usb_device::{
    endpoint::{EndpointAddress, EndpointType},
    UsbDirection, UsbError,
};

use crate::{
    csr::{Reg, Registers},
    ral::eptri,
    state::ENDPOINT_COUNT,
    Driver,
};

impl<R: Registers> Driver<R> {
    /// Prepare an endpoint for transfers
    ///
    /// # Errors
    ///
    /// - [`UsbError::InvalidEndpoint`] if the endpoint number isn't below
    ///   [`ENDPOINT_COUNT`](crate::ENDPOINT_COUNT).
    /// - [`UsbError::Unsupported`] for isochronous endpoints.
    pub fn open_endpoint(
        &self,
        ep_addr: EndpointAddress,
        ep_type: EndpointType,
    ) -> Result<(), UsbError> {
        if ep_addr.index() >= ENDPOINT_COUNT {
            return Err(UsbError::InvalidEndpoint);
        }
        if let EndpointType::Isochronous { .. } = ep_type {
            warn!("EP{} ISOCHRONOUS", ep_addr.index());
            return Err(UsbError::Unsupported);
        }
        debug!("OPEN EP{} {:?}", ep_addr.index(), ep_addr.direction());
        Ok(())
    }

    /// Stall an endpoint
    ///
    /// The host sees STALL on the endpoint until you
    /// [`clear_stall()`](Driver::clear_stall) it, or until the next SETUP
    /// packet.
    pub fn stall(&self, ep_addr: EndpointAddress) {
        let epno = ep_addr.index() as u32;
        match ep_addr.direction() {
            UsbDirection::Out => self.regs.write(
                Reg::OutStall,
                eptri::OUT_STALL::STALL::mask | eptri::OUT_STALL::EPNO::write(epno),
            ),
            UsbDirection::In => self.regs.write(
                Reg::InCtrl,
                eptri::IN_CTRL::STALL::mask | eptri::IN_CTRL::EPNO::write(epno),
            ),
        }
        debug!("STALL EP{} {:?}", ep_addr.index(), ep_addr.direction());
    }

    /// Clear an endpoint's stall
    ///
    /// An IN stall covers a single packet in the core; the next queued IN
    /// packet already clears it. So this only affects OUT endpoints.
    pub fn clear_stall(&self, ep_addr: EndpointAddress) {
        if ep_addr.direction() == UsbDirection::Out {
            self.regs.write(
                Reg::OutStall,
                eptri::OUT_STALL::EPNO::write(ep_addr.index() as u32),
            );
        }
        debug!("UNSTALL EP{} {:?}", ep_addr.index(), ep_addr.direction());
    }
}
