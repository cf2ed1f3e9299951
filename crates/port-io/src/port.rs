use core::marker::PhantomData;

use self::private::Sealed;
use crate::{
    access::{InOnly, InOut, Input, OutOnly, Output},
    PortIo,
};

/// A typed location in the x86 I/O space.
///
/// A `Port<T>` only names a port number and the width `T` it is accessed
/// with; the actual `in`/`out` goes through whichever [`PortIo`] provider is
/// handed to [`Port::read`] or [`Port::write`]. That keeps the handles `const`
/// constructible and lets the same register definitions drive real hardware
/// and a simulated backend.
///
/// # Usage
///
/// Selecting a configuration register through mechanism 1:
/// ```ignore
/// const CONFIG_ADDRESS: Port<u32> = Port::new(0xcf8);
///
/// unsafe { CONFIG_ADDRESS.write(&io, 0x8000_0000) };
/// ```
#[derive(Debug)]
pub struct Port<T, A = InOut> {
    port: u16,
    _p: PhantomData<fn(T, A)>,
}

impl<T, A> Clone for Port<T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A> Copy for Port<T, A> {}

impl<T> Port<T> {
    pub const fn new(port: u16) -> Self {
        Self {
            port,
            _p: PhantomData,
        }
    }
}

impl<T> Port<T, InOnly> {
    pub const fn new_readonly(port: u16) -> Self {
        Self {
            port,
            _p: PhantomData,
        }
    }
}

impl<T> Port<T, OutOnly> {
    pub const fn new_writeonly(port: u16) -> Self {
        Self {
            port,
            _p: PhantomData,
        }
    }
}

impl<T, A> Port<T, A> {
    pub const fn number(&self) -> u16 {
        self.port
    }
}

impl<T, A> Port<T, A>
where
    T: PortValue,
    A: Input,
{
    /// # Safety
    /// 1. The port must be a valid I/O location
    /// 2. Reads from this port must not compromise memory safety.
    #[inline]
    pub unsafe fn read<P: PortIo + ?Sized>(&self, io: &P) -> T {
        T::read(io, self.port)
    }
}

impl<T, A> Port<T, A>
where
    T: PortValue,
    A: Output,
{
    /// # Safety
    /// 1. The port must be a valid I/O location
    /// 2. Writes to this port must not compromise memory safety.
    #[inline]
    pub unsafe fn write<P: PortIo + ?Sized>(&self, io: &P, value: T) {
        T::write(io, self.port, value);
    }
}

/// An integer width the I/O space can be accessed with.
pub trait PortValue: Sealed + Copy {
    /// # Safety
    /// See [`PortIo::read_u8`].
    unsafe fn read<P: PortIo + ?Sized>(io: &P, port: u16) -> Self;
    /// # Safety
    /// See [`PortIo::write_u8`].
    unsafe fn write<P: PortIo + ?Sized>(io: &P, port: u16, value: Self);
}

macro_rules! port_value {
    ($ty:ty, $read:ident, $write:ident) => {
        impl Sealed for $ty {}

        impl PortValue for $ty {
            #[inline]
            unsafe fn read<P: PortIo + ?Sized>(io: &P, port: u16) -> Self {
                io.$read(port)
            }

            #[inline]
            unsafe fn write<P: PortIo + ?Sized>(io: &P, port: u16, value: Self) {
                io.$write(port, value)
            }
        }
    };
}

port_value!(u8, read_u8, write_u8);
port_value!(u16, read_u16, write_u16);
port_value!(u32, read_u32, write_u32);

mod private {
    pub trait Sealed {}
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: RefCell<Vec<(u16, u32, u8)>>,
    }

    unsafe impl PortIo for Recorder {
        unsafe fn read_u8(&self, port: u16) -> u8 {
            self.log.borrow_mut().push((port, 0, 1));
            0x12
        }

        unsafe fn read_u16(&self, port: u16) -> u16 {
            self.log.borrow_mut().push((port, 0, 2));
            0x1234
        }

        unsafe fn read_u32(&self, port: u16) -> u32 {
            self.log.borrow_mut().push((port, 0, 4));
            0x1234_5678
        }

        unsafe fn write_u8(&self, port: u16, value: u8) {
            self.log.borrow_mut().push((port, value.into(), 1));
        }

        unsafe fn write_u16(&self, port: u16, value: u16) {
            self.log.borrow_mut().push((port, value.into(), 2));
        }

        unsafe fn write_u32(&self, port: u16, value: u32) {
            self.log.borrow_mut().push((port, value, 4));
        }

        fn setup_privilege(&self) -> bool {
            true
        }

        fn release_privilege(&self) {}
    }

    #[test]
    fn width_follows_type() {
        let io = Recorder::default();
        unsafe {
            assert_eq!(Port::<u8>::new(0x70).read(&io), 0x12);
            assert_eq!(Port::<u16, _>::new_readonly(0x1f0).read(&io), 0x1234);
            Port::<u32>::new(0xcf8).write(&io, 0x8000_0000);
            Port::<u8, _>::new_writeonly(0xcfb).write(&io, 1);
        }
        assert_eq!(
            *io.log.borrow(),
            [(0x70, 0, 1), (0x1f0, 0, 2), (0xcf8, 0x8000_0000, 4), (0xcfb, 1, 1)]
        );
    }

    #[test]
    fn through_reference() {
        let io = Recorder::default();
        let by_ref: &dyn PortIo = &io;
        unsafe { Port::<u16>::new(0x60).write(by_ref, 0xbeef) };
        assert_eq!(*io.log.borrow(), [(0x60, 0xbeef, 2)]);
        assert_eq!(Port::<u16>::new(0x60).number(), 0x60);
    }
}
