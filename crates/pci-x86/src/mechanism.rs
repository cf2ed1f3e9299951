use core::{fmt, str::FromStr};

use lock_api::RawMutex;
use log::debug;
use pci_types::{ConfigSpace, PciAddr, PciError, PciErrorKind, PciResult};
use port_io::PortIo;

use crate::{conf1, conf2, BlockFallback, ConfigPorts, NoFallback};

/// One of the two legacy configuration mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    Conf1,
    Conf2,
}

impl Mechanism {
    /// In the order they are usually worth trying.
    pub const ALL: [Mechanism; 2] = [Mechanism::Conf1, Mechanism::Conf2];

    pub const fn name(self) -> &'static str {
        match self {
            Mechanism::Conf1 => "intel-conf1",
            Mechanism::Conf2 => "intel-conf2",
        }
    }

    pub const fn help(self) -> &'static str {
        match self {
            Mechanism::Conf1 => "Raw I/O port access using Intel conf1 interface",
            Mechanism::Conf2 => "Raw I/O port access using Intel conf2 interface",
        }
    }

    /// Whether this mechanism is present and believable on this machine.
    pub fn detect<P, R>(self, ports: &ConfigPorts<P, R>) -> bool
    where
        P: PortIo,
        R: RawMutex,
    {
        debug!("detecting {}", self.name());
        match self {
            Mechanism::Conf1 => conf1::detect(ports),
            Mechanism::Conf2 => conf2::detect(ports),
        }
    }

    /// Commits to this mechanism. Fails if port I/O is not permitted.
    pub fn init<P, R>(self, ports: &ConfigPorts<P, R>) -> PciResult<()>
    where
        P: PortIo,
        R: RawMutex,
    {
        if !ports.privilege().acquire(ports.io()) {
            return Err(PciErrorKind::PermissionDenied.into());
        }
        ports.privilege().activate(self.slot());
        Ok(())
    }

    /// Undoes [`Mechanism::init`], giving up port privilege if nothing else
    /// still uses it. Does nothing for a mechanism that is not initialized.
    pub fn cleanup<P, R>(self, ports: &ConfigPorts<P, R>)
    where
        P: PortIo,
        R: RawMutex,
    {
        ports.privilege().deactivate(self.slot(), ports.io());
    }

    const fn slot(self) -> usize {
        match self {
            Mechanism::Conf1 => 0,
            Mechanism::Conf2 => 1,
        }
    }

    /// # Safety
    /// Reading some registers has side effects on the device.
    pub unsafe fn read<P, R, F>(
        self,
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
        match self {
            Mechanism::Conf1 => conf1::read(ports, fallback, addr, offset, buf),
            Mechanism::Conf2 => conf2::read(ports, fallback, addr, offset, buf),
        }
    }

    /// # Safety
    /// Writes reprogram the device.
    pub unsafe fn write<P, R, F>(
        self,
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
        match self {
            Mechanism::Conf1 => conf1::write(ports, fallback, addr, offset, buf),
            Mechanism::Conf2 => conf2::write(ports, fallback, addr, offset, buf),
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mechanism {
    type Err = PciError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mechanism::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| PciErrorKind::UnknownMechanism.into())
    }
}

/// Configuration space reached through one mechanism on a set of ports.
pub struct IoPortConfigSpace<'a, P, R = spin::Mutex<()>, F = NoFallback> {
    ports: &'a ConfigPorts<P, R>,
    mechanism: Mechanism,
    fallback: F,
}

impl<'a, P, R, F> IoPortConfigSpace<'a, P, R, F> {
    pub const fn new(ports: &'a ConfigPorts<P, R>, mechanism: Mechanism, fallback: F) -> Self {
        Self {
            ports,
            mechanism,
            fallback,
        }
    }

    pub fn ports(&self) -> &'a ConfigPorts<P, R> {
        self.ports
    }

    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<'a, P, R, F> fmt::Debug for IoPortConfigSpace<'a, P, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoPortConfigSpace")
            .field("mechanism", &self.mechanism)
            .finish_non_exhaustive()
    }
}

unsafe impl<'a, P, R, F> ConfigSpace for IoPortConfigSpace<'a, P, R, F>
where
    P: PortIo,
    R: RawMutex,
    F: BlockFallback,
{
    unsafe fn read(&self, addr: PciAddr, offset: u16, buf: &mut [u8]) -> PciResult<()> {
        self.mechanism
            .read(self.ports, &self.fallback, addr, offset, buf)
    }

    unsafe fn write(&self, addr: PciAddr, offset: u16, buf: &[u8]) -> PciResult<()> {
        self.mechanism
            .write(self.ports, &self.fallback, addr, offset, buf)
    }
}
