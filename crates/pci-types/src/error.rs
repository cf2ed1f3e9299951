use core::{error::Error, fmt::Display};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciErrorKind {
    /// The process may not issue raw port I/O.
    PermissionDenied,
    /// The access mechanism only reaches domain 0.
    UnsupportedDomain,
    /// The offset lies outside the 256-byte legacy window.
    OffsetOutOfRange,
    /// The access mechanism cannot address this device number.
    DeviceOutOfRange,
    /// The transfer is not 1, 2 or 4 bytes and nobody handles other lengths.
    UnsupportedLength,
    /// No configured access mechanism was detected.
    NoMechanism,
    /// An access mechanism name did not match any known mechanism.
    UnknownMechanism,
}

impl PciErrorKind {
    /// `true` for requests the mechanism declines rather than fails. The caller
    /// may retry them through another mechanism.
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            Self::UnsupportedDomain
                | Self::OffsetOutOfRange
                | Self::DeviceOutOfRange
                | Self::UnsupportedLength
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciError {
    kind: PciErrorKind,
}

impl PciError {
    pub fn kind(&self) -> PciErrorKind {
        self.kind
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind.is_unsupported()
    }
}

impl Display for PciError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            PciErrorKind::PermissionDenied => f.write_str(
                "no permission to access I/O ports (you probably have to be root)",
            ),
            PciErrorKind::UnsupportedDomain => f.write_str("domain not reachable through I/O ports"),
            PciErrorKind::OffsetOutOfRange => f.write_str("offset beyond the 256-byte window"),
            PciErrorKind::DeviceOutOfRange => f.write_str("device number not addressable"),
            PciErrorKind::UnsupportedLength => f.write_str("transfer length not supported"),
            PciErrorKind::NoMechanism => f.write_str("no configuration access mechanism found"),
            PciErrorKind::UnknownMechanism => f.write_str("unknown access mechanism"),
        }
    }
}

impl From<PciErrorKind> for PciError {
    fn from(value: PciErrorKind) -> Self {
        PciError { kind: value }
    }
}

impl Error for PciError {}

pub type PciResult<T> = Result<T, PciError>;
