#![cfg_attr(not(test), no_std)]

//! Configuration space access through the legacy x86 I/O port mechanisms.
//!
//! Mechanism 1 selects a register by writing a packed address to `0xcf8` and
//! moves data through the 4-byte window at `0xcfc`. Mechanism 2 enables a
//! function and bus through the byte registers at `0xcf8` and `0xcfa` and maps
//! 16 devices into the 4 KiB window at `0xc000`. Both reach domain 0 only,
//! and only the first 256 bytes of each function.

use core::fmt;

use lock_api::{Mutex, RawMutex};
use pci_types::{PciAddr, PciErrorKind, PciResult, CONFIG_SPACE_SIZE};
use port_io::{Port, PortIo};

pub mod conf1;
pub mod conf2;
pub mod fallback;
pub mod mechanism;
pub mod privilege;
pub mod sanity;

#[cfg(any(test, feature = "sim"))]
#[doc(hidden)]
pub mod sim;

pub use fallback::{BlockFallback, NoFallback};
pub use mechanism::{IoPortConfigSpace, Mechanism};
pub use privilege::{Privilege, PrivilegeGate};

/// The I/O ports both mechanisms share, together with the lock and privilege
/// state that go with them.
///
/// There should be one of these per process (per OS instance, when running in
/// a kernel): the hardware has a single address/data register pair, and
/// anything else driving those ports concurrently can corrupt a transaction.
pub struct ConfigPorts<P, R = spin::Mutex<()>> {
    io: P,
    lock: Mutex<R, ()>,
    privilege: PrivilegeGate,
}

impl<P, R> ConfigPorts<P, R>
where
    P: PortIo,
    R: RawMutex,
{
    pub const fn new(io: P) -> Self {
        Self {
            io,
            lock: Mutex::new(()),
            privilege: PrivilegeGate::new(),
        }
    }

    pub fn io(&self) -> &P {
        &self.io
    }

    pub fn privilege(&self) -> &PrivilegeGate {
        &self.privilege
    }

    /// Runs a multi-step port sequence with the port lock held.
    pub(crate) fn locked<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&P) -> T,
    {
        let _guard = self.lock.lock();
        f(&self.io)
    }
}

impl<P: fmt::Debug, R> fmt::Debug for ConfigPorts<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigPorts")
            .field("io", &self.io)
            .field("privilege", &self.privilege)
            .finish_non_exhaustive()
    }
}

/// The widths the I/O space can move in a single access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Width {
    Byte,
    Word,
    Dword,
}

impl Width {
    pub(crate) fn of(len: usize) -> Option<Self> {
        match len {
            1 => Some(Width::Byte),
            2 => Some(Width::Word),
            4 => Some(Width::Dword),
            _ => None,
        }
    }
}

/// Requests neither mechanism can express, whatever the transfer length.
pub(crate) fn check_target(addr: PciAddr, offset: u16) -> PciResult<()> {
    if addr.domain() != 0 {
        log::trace!("{addr}: domain not reachable through I/O ports");
        return Err(PciErrorKind::UnsupportedDomain.into());
    }
    if offset >= CONFIG_SPACE_SIZE {
        log::trace!("{addr}: offset {offset:#x} beyond legacy window");
        return Err(PciErrorKind::OffsetOutOfRange.into());
    }
    Ok(())
}

/// Reads `buf.len()` bytes from `port` in a single access.
///
/// # Safety
/// 1. `buf.len()` must match `width`
/// 2. The caller must hold the port lock and have selected the target register.
pub(crate) unsafe fn read_data<P>(io: &P, width: Width, port: u16, buf: &mut [u8])
where
    P: PortIo + ?Sized,
{
    match width {
        Width::Byte => buf[0] = Port::<u8>::new(port).read(io),
        Width::Word => buf.copy_from_slice(&Port::<u16>::new(port).read(io).to_le_bytes()),
        Width::Dword => buf.copy_from_slice(&Port::<u32>::new(port).read(io).to_le_bytes()),
    }
}

/// Writes `buf` to `port` in a single access.
///
/// # Safety
/// See [`read_data`].
pub(crate) unsafe fn write_data<P>(io: &P, width: Width, port: u16, buf: &[u8])
where
    P: PortIo + ?Sized,
{
    match width {
        Width::Byte => Port::<u8>::new(port).write(io, buf[0]),
        Width::Word => Port::<u16>::new(port).write(io, u16::from_le_bytes([buf[0], buf[1]])),
        Width::Dword => Port::<u32>::new(port).write(
            io,
            u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use pci_types::{ClassCode, VendorId};

    use super::*;
    use crate::sim::{Hardware, SimConfigPorts, SimPorts};

    const THREADS: u8 = 8;
    const ROUNDS: u32 = 500;

    /// Each thread owns one device and hammers a dword register on it.
    fn hammer(hardware: Hardware, mechanism: Mechanism) {
        let io = SimPorts::new(hardware);
        for device in 0..THREADS {
            io.add_device(1, device, 0, VendorId(0x1b36), ClassCode(0x0100));
        }
        let ports = SimConfigPorts::new(io);

        thread::scope(|s| {
            for device in 0..THREADS {
                let ports = &ports;
                s.spawn(move || {
                    let addr = PciAddr::new(0, 1, device, 0);
                    for round in 0..ROUNDS {
                        let value = (u32::from(device) << 24) | round;
                        let mut back = [0; 4];
                        unsafe {
                            mechanism
                                .write(ports, &NoFallback, addr, 0x40, &value.to_le_bytes())
                                .unwrap();
                            mechanism
                                .read(ports, &NoFallback, addr, 0x40, &mut back)
                                .unwrap();
                        }
                        assert_eq!(u32::from_le_bytes(back), value);
                    }
                });
            }
        });
    }

    #[test]
    fn conf1_phases_never_interleave() {
        hammer(Hardware::Conf1, Mechanism::Conf1);
    }

    #[test]
    fn conf2_phases_never_interleave() {
        hammer(Hardware::Conf2, Mechanism::Conf2);
    }

    #[test]
    fn widths() {
        assert_eq!(Width::of(1), Some(Width::Byte));
        assert_eq!(Width::of(2), Some(Width::Word));
        assert_eq!(Width::of(4), Some(Width::Dword));
        assert_eq!(Width::of(0), None);
        assert_eq!(Width::of(3), None);
        assert_eq!(Width::of(8), None);
    }

    #[test]
    fn target_checks() {
        let ok = PciAddr::new(0, 0, 0, 0);
        assert!(check_target(ok, 0).is_ok());
        assert!(check_target(ok, 255).is_ok());
        assert_eq!(
            check_target(ok, 256).unwrap_err().kind(),
            PciErrorKind::OffsetOutOfRange
        );
        assert_eq!(
            check_target(PciAddr::new(1, 0, 0, 0), 0).unwrap_err().kind(),
            PciErrorKind::UnsupportedDomain
        );
    }
}
