//! Port I/O issued directly by the current CPU.

use x86_64::{
    instructions::{
        port::Port,
        segmentation::{Segment, CS},
    },
    registers::rflags,
};

use crate::PortIo;

const IOPL_SHIFT: u64 = 12;
const IOPL_MASK: u64 = 0b11;

/// Executes `in`/`out` on the running CPU.
///
/// No privilege is requested from anyone: the caller either already runs at a
/// privilege level allowed to touch the I/O space (a kernel, a firmware
/// application) or has had its I/O privilege level raised by the OS before
/// getting here. [`PortIo::setup_privilege`] only reports which of those is
/// the case.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePorts;

impl NativePorts {
    pub const fn new() -> Self {
        Self
    }

    /// `true` if the current privilege level is numerically at or below the
    /// I/O privilege level in RFLAGS.
    pub fn io_permitted() -> bool {
        let cpl = u64::from(CS::get_reg().rpl() as u8);
        let iopl = (rflags::read_raw() >> IOPL_SHIFT) & IOPL_MASK;
        cpl <= iopl
    }
}

unsafe impl PortIo for NativePorts {
    #[inline]
    unsafe fn read_u8(&self, port: u16) -> u8 {
        Port::new(port).read()
    }

    #[inline]
    unsafe fn read_u16(&self, port: u16) -> u16 {
        Port::new(port).read()
    }

    #[inline]
    unsafe fn read_u32(&self, port: u16) -> u32 {
        Port::new(port).read()
    }

    #[inline]
    unsafe fn write_u8(&self, port: u16, value: u8) {
        Port::new(port).write(value);
    }

    #[inline]
    unsafe fn write_u16(&self, port: u16, value: u16) {
        Port::new(port).write(value);
    }

    #[inline]
    unsafe fn write_u32(&self, port: u16, value: u32) {
        Port::new(port).write(value);
    }

    fn setup_privilege(&self) -> bool {
        Self::io_permitted()
    }

    fn release_privilege(&self) {}
}
