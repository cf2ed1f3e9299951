//! Configuration mechanism 2. Obsolete, but still found on old chipsets.
//!
//! Writing a non-zero key and the function number to the configuration space
//! enable register (CSE) maps the functions of the bus named in the forward
//! register into I/O space at `0xc000`, 256 bytes per device. The window is
//! only 4 KiB, so devices 16 to 31 cannot be reached.

use lock_api::RawMutex;
use log::{debug, trace};
use pci_types::{PciAddr, PciErrorKind, PciResult};
use port_io::{access::OutOnly, Port, PortIo};

use crate::{
    check_target, read_data, sanity, write_data, BlockFallback, ConfigPorts, Mechanism, Width,
};

const CSE: Port<u8> = Port::new(0xcf8);
const FORWARD: Port<u8> = Port::new(0xcfa);
const MODE_SELECT: Port<u8, OutOnly> = Port::new_writeonly(0xcfb);

const WINDOW_BASE: u16 = 0xc000;
/// Key nibble that turns the window on.
const CSE_ENABLE: u8 = 0xf0;

pub const MAX_DEVICES: u8 = 16;

/// The CSE value mapping `addr`'s function into the window.
pub const fn cse_value(addr: PciAddr) -> u8 {
    (addr.function() << 1) | CSE_ENABLE
}

/// The bus number for the forward register.
pub const fn forward_value(addr: PciAddr) -> u8 {
    addr.bus()
}

/// The I/O port `offset` of `addr` appears at once the window is enabled.
pub const fn window_port(addr: PciAddr, offset: u16) -> u16 {
    WINDOW_BASE | (addr.device() as u16) << 8 | offset
}

/// Checks that the CSE and forward registers hold zero after zero is written
/// to them, then checks that bus 0 looks like a real bus through the window.
///
/// Plenty of hardware passes the register check without implementing the
/// mechanism, so the bus 0 check carries most of the weight here.
pub fn detect<P, R>(ports: &ConfigPorts<P, R>) -> bool
where
    P: PortIo,
    R: RawMutex,
{
    if !ports.privilege().acquire(ports.io()) {
        debug!("...no I/O permission");
        return false;
    }

    let zeroed = ports.locked(|io| unsafe {
        MODE_SELECT.write(io, 0x00);
        CSE.write(io, 0x00);
        FORWARD.write(io, 0x00);
        CSE.read(io) == 0x00 && FORWARD.read(io) == 0x00
    });

    if !zeroed {
        debug!("...control registers do not read back as zero");
        return false;
    }
    sanity::looks_sane(ports, Mechanism::Conf2)
}

fn check_device(addr: PciAddr) -> PciResult<()> {
    if addr.device() >= MAX_DEVICES {
        trace!("{addr}: device beyond the mechanism 2 window");
        return Err(PciErrorKind::DeviceOutOfRange.into());
    }
    Ok(())
}

/// # Safety
/// Reading some registers has side effects on the device.
pub unsafe fn read<P, R, F>(
    ports: &ConfigPorts<P, R>,
    fallback: &F,
    addr: PciAddr,
    offset: u16,
    buf: &mut [u8],
) -> PciResult<()>
where
    P: PortIo,
    R: RawMutex,
    F: BlockFallback + ?Sized,
{
    check_target(addr, offset)?;
    check_device(addr)?;
    let Some(width) = Width::of(buf.len()) else {
        return fallback.read(addr, offset, buf);
    };

    ports.locked(|io| {
        CSE.write(io, cse_value(addr));
        FORWARD.write(io, forward_value(addr));
        read_data(io, width, window_port(addr, offset), buf);
        CSE.write(io, 0);
    });
    Ok(())
}

/// # Safety
/// Writes reprogram the device.
pub unsafe fn write<P, R, F>(
    ports: &ConfigPorts<P, R>,
    fallback: &F,
    addr: PciAddr,
    offset: u16,
    buf: &[u8],
) -> PciResult<()>
where
    P: PortIo,
    R: RawMutex,
    F: BlockFallback + ?Sized,
{
    check_target(addr, offset)?;
    check_device(addr)?;
    let Some(width) = Width::of(buf.len()) else {
        return fallback.write(addr, offset, buf);
    };

    ports.locked(|io| {
        CSE.write(io, cse_value(addr));
        FORWARD.write(io, forward_value(addr));
        write_data(io, width, window_port(addr, offset), buf);
        CSE.write(io, 0);
    });
    Ok(())
}
