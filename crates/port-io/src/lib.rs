#![cfg_attr(not(test), no_std)]

//! Raw x86 I/O port access.
//!
//! Everything above this crate talks to the I/O space through a [`PortIo`]
//! provider, which keeps the privileged instructions (and the way a platform
//! obtains the right to issue them) in one replaceable place.

pub mod access;
#[cfg(target_arch = "x86_64")]
pub mod native;
pub mod port;

#[cfg(target_arch = "x86_64")]
pub use native::NativePorts;
pub use port::{Port, PortValue};

/// A source of single-width port reads and writes.
///
/// # Safety
/// 1. Implementors must perform exactly one access of the stated width per
///    call, in program order, with no caching or coalescing.
/// 2. `setup_privilege` must only return `true` if the other methods may be
///    called without faulting.
pub unsafe trait PortIo {
    /// # Safety
    /// 1. The port must be a valid I/O location
    /// 2. Reads from this port must not compromise memory safety.
    unsafe fn read_u8(&self, port: u16) -> u8;
    /// # Safety
    /// See [`PortIo::read_u8`].
    unsafe fn read_u16(&self, port: u16) -> u16;
    /// # Safety
    /// See [`PortIo::read_u8`].
    unsafe fn read_u32(&self, port: u16) -> u32;

    /// # Safety
    /// 1. The port must be a valid I/O location
    /// 2. Writes to this port must not compromise memory safety.
    unsafe fn write_u8(&self, port: u16, value: u8);
    /// # Safety
    /// See [`PortIo::write_u8`].
    unsafe fn write_u16(&self, port: u16, value: u16);
    /// # Safety
    /// See [`PortIo::write_u8`].
    unsafe fn write_u32(&self, port: u16, value: u32);

    /// Obtains the right to issue port I/O, returning whether it was granted.
    fn setup_privilege(&self) -> bool;

    /// Gives back whatever `setup_privilege` obtained.
    fn release_privilege(&self);
}

unsafe impl<P: PortIo + ?Sized> PortIo for &P {
    unsafe fn read_u8(&self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    unsafe fn read_u16(&self, port: u16) -> u16 {
        (**self).read_u16(port)
    }

    unsafe fn read_u32(&self, port: u16) -> u32 {
        (**self).read_u32(port)
    }

    unsafe fn write_u8(&self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }

    unsafe fn write_u16(&self, port: u16, value: u16) {
        (**self).write_u16(port, value)
    }

    unsafe fn write_u32(&self, port: u16, value: u32) {
        (**self).write_u32(port, value)
    }

    fn setup_privilege(&self) -> bool {
        (**self).setup_privilege()
    }

    fn release_privilege(&self) {
        (**self).release_privilege()
    }
}
