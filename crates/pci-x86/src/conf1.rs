//! Configuration mechanism 1.
//!
//! A dword written to `CONFIG_ADDRESS` selects bus, device, function and the
//! aligned register; the register then appears in the 4-byte window at
//! `CONFIG_DATA`, where the low two offset bits pick the byte lane.

use lock_api::RawMutex;
use log::debug;
use pci_types::{PciAddr, PciResult};
use port_io::{access::OutOnly, Port, PortIo};

use crate::{
    check_target, read_data, sanity, write_data, BlockFallback, ConfigPorts, Mechanism, Width,
};

const CONFIG_ADDRESS: Port<u32> = Port::new(0xcf8);
const CONFIG_DATA: u16 = 0xcfc;
/// Writing here takes chipsets that also speak mechanism 2 out of that mode.
const MODE_SELECT: Port<u8, OutOnly> = Port::new_writeonly(0xcfb);

const ENABLE_BIT: u32 = 1 << 31;

/// The `CONFIG_ADDRESS` value selecting `offset` of `addr`.
pub const fn config_address(addr: PciAddr, offset: u16) -> u32 {
    ENABLE_BIT | (addr.bus() as u32) << 16 | (addr.devfn() as u32) << 8 | (offset as u32 & !0b11)
}

/// The data port carrying the byte lane `offset` falls on.
pub const fn data_port(offset: u16) -> u16 {
    CONFIG_DATA + (offset & 0b11)
}

/// Probes for a `CONFIG_ADDRESS` register that holds what is written to it,
/// then checks that bus 0 looks like a real bus through it.
pub fn detect<P, R>(ports: &ConfigPorts<P, R>) -> bool
where
    P: PortIo,
    R: RawMutex,
{
    if !ports.privilege().acquire(ports.io()) {
        debug!("...no I/O permission");
        return false;
    }

    let echoes = ports.locked(|io| unsafe {
        MODE_SELECT.write(io, 0x01);
        let saved = CONFIG_ADDRESS.read(io);
        CONFIG_ADDRESS.write(io, ENABLE_BIT);
        let echoes = CONFIG_ADDRESS.read(io) == ENABLE_BIT;
        CONFIG_ADDRESS.write(io, saved);
        echoes
    });

    if !echoes {
        debug!("...address register does not hold its value");
        return false;
    }
    sanity::looks_sane(ports, Mechanism::Conf1)
}

/// # Safety
/// Reading some registers has side effects on the device.
pub unsafe fn read<P, R, F>(
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
    check_target(addr, offset)?;
    let Some(width) = Width::of(buf.len()) else {
        return fallback.read(addr, offset, buf);
    };

    ports.locked(|io| {
        CONFIG_ADDRESS.write(io, config_address(addr, offset));
        read_data(io, width, data_port(offset), buf);
    });
    Ok(())
}

/// # Safety
/// Writes reprogram the device.
pub unsafe fn write<P, R, F>(
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
    check_target(addr, offset)?;
    let Some(width) = Width::of(buf.len()) else {
        return fallback.write(addr, offset, buf);
    };

    ports.locked(|io| {
        CONFIG_ADDRESS.write(io, config_address(addr, offset));
        write_data(io, width, data_port(offset), buf);
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use pci_types::{ClassCode, PciErrorKind, VendorId};

    use super::*;
    use crate::{
        sim::{Hardware, Op, SimConfigPorts, SimPorts},
        NoFallback,
    };

    fn host_bridge_machine(hardware: Hardware) -> SimConfigPorts {
        let io = SimPorts::new(hardware);
        io.add_device(0, 0, 0, VendorId(0x1022), ClassCode::BRIDGE_HOST);
        SimConfigPorts::new(io)
    }

    #[test]
    fn address_word() {
        for bus in [0u8, 1, 0x7f, 0xff] {
            for device in 0..32u8 {
                for function in 0..8u8 {
                    for offset in 0..256u16 {
                        let addr = PciAddr::new(0, bus, device, function);
                        let expected = 0x8000_0000
                            | (u32::from(bus) << 16)
                            | (u32::from((device << 3) | function) << 8)
                            | (u32::from(offset) & !3);
                        assert_eq!(config_address(addr, offset), expected);
                        assert_eq!(data_port(offset), 0xcfc + (offset & 3));
                    }
                }
            }
        }
    }

    #[test]
    fn detect_on_echoing_host_bridge() {
        let ports = host_bridge_machine(Hardware::Conf1);
        assert!(detect(&ports));
    }

    #[test]
    fn detect_restores_address_register() {
        let ports = host_bridge_machine(Hardware::Conf1);
        ports.io().set_address(0x8000_1234);

        let _ = detect(&ports);

        let ops = ports.io().ops();
        let probe = ops
            .iter()
            .position(|op| *op == Op::out(0xcf8, 4, 0x8000_0000))
            .unwrap();
        assert_eq!(ops[probe + 2], Op::out(0xcf8, 4, 0x8000_1234));
        assert_eq!(ops[0], Op::out(0xcfb, 1, 0x01));
    }

    #[test]
    fn detect_without_echo_skips_sanity_check() {
        let ports = host_bridge_machine(Hardware::Conf1NoEcho);

        assert!(!detect(&ports));
        assert!(ports
            .io()
            .ops()
            .iter()
            .all(|op| !(0xcfc..=0xcff).contains(&op.port())));
    }

    #[test]
    fn detect_rejects_empty_bus() {
        let ports = SimConfigPorts::new(SimPorts::new(Hardware::Conf1));
        assert!(!detect(&ports));
    }

    #[test]
    fn detect_needs_privilege() {
        let io = SimPorts::new(Hardware::Conf1).unprivileged();
        io.add_device(0, 0, 0, VendorId::INTEL, ClassCode::BRIDGE_HOST);
        let ports = SimConfigPorts::new(io);

        assert!(!detect(&ports));
        assert!(ports.io().ops().is_empty());
    }

    #[test]
    fn read_sequence() {
        let ports = host_bridge_machine(Hardware::Conf1);
        let addr = PciAddr::new(0, 0, 0, 0);
        let mut buf = [0; 2];

        unsafe { read(&ports, &NoFallback, addr, 0x0a, &mut buf).unwrap() };

        assert_eq!(u16::from_le_bytes(buf), 0x0600);
        assert_eq!(
            ports.io().ops(),
            [Op::out(0xcf8, 4, 0x8000_0008), Op::input(0xcfe, 2)]
        );
    }

    #[test]
    fn round_trip_each_width() {
        let ports = host_bridge_machine(Hardware::Conf1);
        let addr = PciAddr::new(0, 3, 7, 2);
        ports.io().add_device(3, 7, 2, VendorId(0x1234), ClassCode(0x0200));

        for (offset, value) in [
            (0x40u16, &[0xaa][..]),
            (0x43, &[0x5a][..]),
            (0x44, &[0x34, 0x12][..]),
            (0x4a, &[0x78, 0x56][..]),
            (0x4c, &[0x01, 0x02, 0x03, 0x04][..]),
            (0xfc, &[0xde, 0xad, 0xbe, 0xef][..]),
        ] {
            let mut back = [0; 4];
            let back = &mut back[..value.len()];
            unsafe {
                write(&ports, &NoFallback, addr, offset, value).unwrap();
                read(&ports, &NoFallback, addr, offset, back).unwrap();
            }
            assert_eq!(back, value, "offset {offset:#x}");
        }
    }

    #[test]
    fn unaligned_offsets_select_lane() {
        let ports = host_bridge_machine(Hardware::Conf1);
        let addr = PciAddr::new(0, 0, 0, 0);

        unsafe { write(&ports, &NoFallback, addr, 0x41, &[0x99]).unwrap() };

        assert_eq!(
            ports.io().ops(),
            [Op::out(0xcf8, 4, 0x8000_0040), Op::out(0xcfd, 1, 0x99)]
        );
        assert_eq!(ports.io().config_byte(0, 0, 0, 0x41), 0x99);
        assert_eq!(ports.io().config_byte(0, 0, 0, 0x40), 0x00);
    }

    #[test]
    fn rejects_without_port_io() {
        let ports = host_bridge_machine(Hardware::Conf1);
        let mut buf = [0; 4];

        let err = unsafe { read(&ports, &NoFallback, PciAddr::new(1, 0, 0, 0), 0, &mut buf) };
        assert_eq!(err.unwrap_err().kind(), PciErrorKind::UnsupportedDomain);

        let err = unsafe { write(&ports, &NoFallback, PciAddr::new(0, 0, 0, 0), 0x100, &buf) };
        assert_eq!(err.unwrap_err().kind(), PciErrorKind::OffsetOutOfRange);

        assert!(ports.io().ops().is_empty());
    }

    #[test]
    fn device_16_and_up_is_fine() {
        let ports = host_bridge_machine(Hardware::Conf1);
        ports.io().add_device(0, 31, 0, VendorId(0xabcd), ClassCode(0x0c03));
        let mut buf = [0; 2];

        unsafe { read(&ports, &NoFallback, PciAddr::new(0, 0, 31, 0), 0, &mut buf).unwrap() };
        assert_eq!(u16::from_le_bytes(buf), 0xabcd);
    }
}
