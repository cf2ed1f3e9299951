use core::str::FromStr;

use pci_types::{PciError, PciErrorKind};
use pci_x86::Mechanism;

/// Which mechanisms to try, and in what order.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    order: [Mechanism; Mechanism::ALL.len()],
    len: usize,
}

impl Config {
    pub const fn empty() -> Self {
        Self {
            order: Mechanism::ALL,
            len: 0,
        }
    }

    pub const fn only(mechanism: Mechanism) -> Self {
        Self {
            order: [mechanism; Mechanism::ALL.len()],
            len: 1,
        }
    }

    /// Appends `mechanism` unless it is already listed.
    pub fn then(mut self, mechanism: Mechanism) -> Self {
        if !self.mechanisms().contains(&mechanism) {
            self.order[self.len] = mechanism;
            self.len += 1;
        }
        self
    }

    pub fn mechanisms(&self) -> &[Mechanism] {
        &self.order[..self.len]
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.mechanisms() == other.mechanisms()
    }
}

impl Eq for Config {}

impl Default for Config {
    /// Mechanism 1 first: it is far more common and its detection is stronger.
    fn default() -> Self {
        Mechanism::ALL
            .into_iter()
            .fold(Self::empty(), |config, m| config.then(m))
    }
}

/// Parses a comma separated list of mechanism names, e.g.
/// `"intel-conf2,intel-conf1"`.
impl FromStr for Config {
    type Err = PciError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Self::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            config = config.then(name.parse()?);
        }
        if config.len == 0 {
            return Err(PciErrorKind::UnknownMechanism.into());
        }
        Ok(config)
    }
}
