#![cfg_attr(not(test), no_std)]

//! Finds a working legacy configuration mechanism and hands out access to
//! configuration space through it.

use lock_api::RawMutex;
use log::debug;
pub use pci_types as types;
use pci_types::{ConfigSpace, PciAddr, PciErrorKind, PciResult};
pub use pci_x86::{
    BlockFallback, ConfigPorts, IoPortConfigSpace, Mechanism, NoFallback, Privilege,
};
use port_io::PortIo;

pub mod config;

pub use config::Config;

/// Configuration ports driven by the running CPU.
#[cfg(target_arch = "x86_64")]
pub type NativeConfigPorts = ConfigPorts<port_io::NativePorts>;

/// Tries the mechanisms of `config` in order and commits to the first one
/// that is detected.
///
/// Fails with [`PciErrorKind::PermissionDenied`] if port privilege was refused,
/// since no mechanism can be detected without it, and with
/// [`PciErrorKind::NoMechanism`] otherwise.
pub fn open<'a, P, R, F>(
    ports: &'a ConfigPorts<P, R>,
    fallback: F,
    config: &Config,
) -> PciResult<Access<'a, P, R, F>>
where
    P: PortIo,
    R: RawMutex,
    F: BlockFallback,
{
    for &mechanism in config.mechanisms() {
        if mechanism.detect(ports) {
            debug!("using {mechanism}");
            mechanism.init(ports)?;
            return Ok(Access {
                space: IoPortConfigSpace::new(ports, mechanism, fallback),
            });
        }
        debug!("...{mechanism} not usable");
    }

    if ports.privilege().state() == Privilege::Denied {
        return Err(PciErrorKind::PermissionDenied.into());
    }
    ports.privilege().release_idle(ports.io());
    Err(PciErrorKind::NoMechanism.into())
}

/// An initialized mechanism. Call [`Access::close`] when done with it.
#[derive(Debug)]
pub struct Access<'a, P, R = spin::Mutex<()>, F = NoFallback> {
    space: IoPortConfigSpace<'a, P, R, F>,
}

impl<'a, P, R, F> Access<'a, P, R, F>
where
    P: PortIo,
    R: RawMutex,
{
    pub fn mechanism(&self) -> Mechanism {
        self.space.mechanism()
    }

    pub fn config_space(&self) -> &IoPortConfigSpace<'a, P, R, F> {
        &self.space
    }

    /// Cleans up the mechanism, releasing port privilege if this was the last
    /// user of it.
    pub fn close(self) {
        self.space.mechanism().cleanup(self.space.ports());
    }
}

unsafe impl<'a, P, R, F> ConfigSpace for Access<'a, P, R, F>
where
    P: PortIo,
    R: RawMutex,
    F: BlockFallback,
{
    unsafe fn read(&self, addr: PciAddr, offset: u16, buf: &mut [u8]) -> PciResult<()> {
        self.space.read(addr, offset, buf)
    }

    unsafe fn write(&self, addr: PciAddr, offset: u16, buf: &[u8]) -> PciResult<()> {
        self.space.write(addr, offset, buf)
    }
}
