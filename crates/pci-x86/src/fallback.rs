//! Transfers the mechanisms cannot do in a single port access.

use pci_types::{PciAddr, PciErrorKind, PciResult};

/// Handles reads and writes whose length is not 1, 2 or 4 bytes.
///
/// The request is handed over exactly as the caller made it, after the
/// mechanism has checked that it can reach `addr` and `offset` at all.
pub trait BlockFallback {
    /// # Safety
    /// Reading some registers has side effects on the device.
    unsafe fn read(&self, addr: PciAddr, offset: u16, buf: &mut [u8]) -> PciResult<()>;

    /// # Safety
    /// Writes reprogram the device.
    unsafe fn write(&self, addr: PciAddr, offset: u16, buf: &[u8]) -> PciResult<()>;
}

impl<F: BlockFallback + ?Sized> BlockFallback for &F {
    unsafe fn read(&self, addr: PciAddr, offset: u16, buf: &mut [u8]) -> PciResult<()> {
        (**self).read(addr, offset, buf)
    }

    unsafe fn write(&self, addr: PciAddr, offset: u16, buf: &[u8]) -> PciResult<()> {
        (**self).write(addr, offset, buf)
    }
}

/// Declines every transfer with [`PciErrorKind::UnsupportedLength`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl BlockFallback for NoFallback {
    unsafe fn read(&self, _addr: PciAddr, _offset: u16, _buf: &mut [u8]) -> PciResult<()> {
        Err(PciErrorKind::UnsupportedLength.into())
    }

    unsafe fn write(&self, _addr: PciAddr, _offset: u16, _buf: &[u8]) -> PciResult<()> {
        Err(PciErrorKind::UnsupportedLength.into())
    }
}
