//! Bus 0 plausibility check run after a mechanism's port signature is found.
//!
//! The port signatures alone are weak evidence, so before trusting a
//! mechanism we look through it at bus 0 and expect to find a host bridge or
//! a VGA controller there. Some old Intel and Compaq chipsets report no class
//! code at all, so their vendor IDs are accepted too. Machines with none of
//! these on bus 0 are rejected, which is accepted as the price of not trusting
//! random port behaviour.

use lock_api::RawMutex;
use log::debug;
use pci_types::{regs, ClassCode, ConfigSpace, PciAddr, VendorId, MAX_DEVICES};
use port_io::PortIo;

use crate::{ConfigPorts, IoPortConfigSpace, Mechanism, NoFallback};

const SANE_CLASSES: [ClassCode; 2] = [ClassCode::BRIDGE_HOST, ClassCode::DISPLAY_VGA];
const CLASSLESS_VENDORS: [VendorId; 2] = [VendorId::INTEL, VendorId::COMPAQ];

/// Reads bus 0 through `mechanism` itself and reports whether it looks real.
pub fn looks_sane<P, R>(ports: &ConfigPorts<P, R>, mechanism: Mechanism) -> bool
where
    P: PortIo,
    R: RawMutex,
{
    debug!("...sanity check");
    let space = IoPortConfigSpace::new(ports, mechanism, NoFallback);

    for device in 0..MAX_DEVICES {
        let addr = PciAddr::new(0, 0, device, 0);
        // Only 2-byte reads of bus 0 registers, which have no side effects.
        let class = unsafe { space.read_u16(addr, regs::CLASS_DEVICE) };
        let vendor = || unsafe { space.read_u16(addr, regs::VENDOR_ID) };

        let sane = matches!(class, Ok(class) if SANE_CLASSES.contains(&ClassCode(class)))
            || matches!(vendor(), Ok(vendor) if CLASSLESS_VENDORS.contains(&VendorId(vendor)));
        if sane {
            debug!("...plausible device at 0/{device:02x}/0");
            return true;
        }
    }

    debug!("...nothing plausible on bus 0");
    false
}
