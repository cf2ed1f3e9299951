#![cfg_attr(not(test), no_std)]

use core::fmt;

pub mod error;

pub use error::{PciError, PciErrorKind, PciResult};

/// Size of the legacy configuration window of a single function.
pub const CONFIG_SPACE_SIZE: u16 = 256;

pub const MAX_DEVICES: u8 = 32;

/// Standard configuration register offsets.
pub mod regs {
    pub const VENDOR_ID: u16 = 0x00;
    /// Subclass in the low byte, base class in the high byte.
    pub const CLASS_DEVICE: u16 = 0x0a;
}

/// A device coordinate: domain, bus, device (slot) and function.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddr {
    domain: u16,
    bus: u8,
    device_func_bits: u8,
}

impl PciAddr {
    /// Device numbers are truncated to 5 bits and functions to 3 bits.
    pub const fn new(domain: u16, bus: u8, device: u8, function: u8) -> Self {
        Self {
            domain,
            bus,
            device_func_bits: ((device & 0x1f) << 3) | (function & 0x7),
        }
    }

    pub const fn domain(&self) -> u16 {
        self.domain
    }

    pub const fn bus(&self) -> u8 {
        self.bus
    }

    pub const fn device(&self) -> u8 {
        self.device_func_bits.wrapping_shr(3)
    }

    pub const fn function(&self) -> u8 {
        self.device_func_bits & 0b111
    }

    /// The packed `device << 3 | function` byte.
    pub const fn devfn(&self) -> u8 {
        self.device_func_bits
    }
}

impl fmt::Debug for PciAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for PciAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain,
            self.bus,
            self.device(),
            self.function()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorId(pub u16);

impl VendorId {
    pub const INTEL: Self = Self(0x8086);
    pub const COMPAQ: Self = Self(0x0e11);
    /// What an empty slot reads back as.
    pub const NONE: Self = Self(0xffff);
}

/// The 16-bit base class / subclass pair at [`regs::CLASS_DEVICE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassCode(pub u16);

impl ClassCode {
    pub const BRIDGE_HOST: Self = Self(0x0600);
    pub const DISPLAY_VGA: Self = Self(0x0300);

    pub const fn base_class(self) -> u8 {
        self.0.wrapping_shr(8) as u8
    }

    pub const fn subclass(self) -> u8 {
        self.0 as u8
    }
}

/// Byte-granular access to configuration space.
///
/// Buffers are in the little-endian order the registers have on the bus.
///
/// # Safety
/// 1. Implementors must only touch the configuration registers named by the
///    address and offset, so that a read cannot have side effects beyond what
///    the device itself attaches to it.
pub unsafe trait ConfigSpace {
    fn exists(&self, addr: PciAddr) -> bool {
        let mut vendor = [0; 2];
        match unsafe { self.read(addr, regs::VENDOR_ID, &mut vendor) } {
            Ok(()) => VendorId(u16::from_le_bytes(vendor)) != VendorId::NONE,
            Err(_) => false,
        }
    }

    /// # Safety
    /// Reading some registers has side effects on the device.
    unsafe fn read(&self, addr: PciAddr, offset: u16, buf: &mut [u8]) -> PciResult<()>;

    /// # Safety
    /// Writes reprogram the device and can break memory safety (BARs, bus
    /// mastering).
    unsafe fn write(&self, addr: PciAddr, offset: u16, buf: &[u8]) -> PciResult<()>;

    /// # Safety
    /// See [`ConfigSpace::read`].
    unsafe fn read_u8(&self, addr: PciAddr, offset: u16) -> PciResult<u8> {
        let mut buf = [0; 1];
        self.read(addr, offset, &mut buf)?;
        Ok(buf[0])
    }

    /// # Safety
    /// See [`ConfigSpace::read`].
    unsafe fn read_u16(&self, addr: PciAddr, offset: u16) -> PciResult<u16> {
        let mut buf = [0; 2];
        self.read(addr, offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// # Safety
    /// See [`ConfigSpace::read`].
    unsafe fn read_u32(&self, addr: PciAddr, offset: u16) -> PciResult<u32> {
        let mut buf = [0; 4];
        self.read(addr, offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// # Safety
    /// See [`ConfigSpace::write`].
    unsafe fn write_u8(&self, addr: PciAddr, offset: u16, value: u8) -> PciResult<()> {
        self.write(addr, offset, &[value])
    }

    /// # Safety
    /// See [`ConfigSpace::write`].
    unsafe fn write_u16(&self, addr: PciAddr, offset: u16, value: u16) -> PciResult<()> {
        self.write(addr, offset, &value.to_le_bytes())
    }

    /// # Safety
    /// See [`ConfigSpace::write`].
    unsafe fn write_u32(&self, addr: PciAddr, offset: u16, value: u32) -> PciResult<()> {
        self.write(addr, offset, &value.to_le_bytes())
    }
}

unsafe impl<C: ConfigSpace + ?Sized> ConfigSpace for &C {
    fn exists(&self, addr: PciAddr) -> bool {
        (**self).exists(addr)
    }

    unsafe fn read(&self, addr: PciAddr, offset: u16, buf: &mut [u8]) -> PciResult<()> {
        (**self).read(addr, offset, buf)
    }

    unsafe fn write(&self, addr: PciAddr, offset: u16, buf: &[u8]) -> PciResult<()> {
        (**self).write(addr, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_packs_device_and_function() {
        let addr = PciAddr::new(0, 0x12, 0x1f, 0x7);
        assert_eq!(addr.bus(), 0x12);
        assert_eq!(addr.device(), 0x1f);
        assert_eq!(addr.function(), 0x7);
        assert_eq!(addr.devfn(), 0xff);

        let addr = PciAddr::new(0, 0, 3, 2);
        assert_eq!(addr.devfn(), (3 << 3) | 2);
    }

    #[test]
    fn addr_display() {
        let addr = PciAddr::new(1, 0x0a, 0x1c, 4);
        assert_eq!(format!("{addr}"), "0001:0a:1c.4");
    }

    #[test]
    fn class_code_halves() {
        assert_eq!(ClassCode::BRIDGE_HOST.base_class(), 0x06);
        assert_eq!(ClassCode::BRIDGE_HOST.subclass(), 0x00);
        assert_eq!(ClassCode::DISPLAY_VGA.base_class(), 0x03);
    }
}
