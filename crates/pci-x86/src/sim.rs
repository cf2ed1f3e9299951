//! Simulated configuration hardware for tests.
//!
//! Configuration space is plain memory. Every port access is recorded, and an
//! access to a data port by a thread other than the one that last programmed
//! the address (mechanism 1) or the CSE register (mechanism 2) panics.

extern crate std;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    thread::{self, ThreadId},
    vec::Vec,
};

use pci_types::{regs, ClassCode, VendorId};
use port_io::PortIo;

use crate::ConfigPorts;

pub type SimConfigPorts = ConfigPorts<SimPorts>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hardware {
    /// Mechanism 1 chipset.
    Conf1,
    /// Mechanism 1 data ports, but the address register does not read back.
    Conf1NoEcho,
    /// Mechanism 2 chipset.
    Conf2,
    /// Nothing decodes the configuration ports.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    In { port: u16, width: u8 },
    Out { port: u16, width: u8, value: u32 },
}

impl Op {
    pub fn input(port: u16, width: u8) -> Self {
        Op::In { port, width }
    }

    pub fn out(port: u16, width: u8, value: u32) -> Self {
        Op::Out { port, width, value }
    }

    pub fn port(&self) -> u16 {
        match *self {
            Op::In { port, .. } | Op::Out { port, .. } => port,
        }
    }
}

type Function = (u8, u8, u8);

#[derive(Debug)]
struct SimState {
    functions: HashMap<Function, [u8; 256]>,
    address: u32,
    cse: u8,
    forward: u8,
    /// Thread whose address phase the data ports currently belong to.
    owner: Option<ThreadId>,
    ops: Vec<Op>,
}

#[derive(Debug)]
pub struct SimPorts {
    hardware: Hardware,
    privileged: bool,
    state: Mutex<SimState>,
    setup_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

impl SimPorts {
    pub fn new(hardware: Hardware) -> Self {
        Self {
            hardware,
            privileged: true,
            state: Mutex::new(SimState {
                functions: HashMap::new(),
                address: 0,
                cse: 0,
                forward: 0,
                owner: None,
                ops: Vec::new(),
            }),
            setup_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
        }
    }

    pub fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    pub fn add_device(&self, bus: u8, device: u8, function: u8, vendor: VendorId, class: ClassCode) {
        let mut space = [0; 256];
        let vendor_at = usize::from(regs::VENDOR_ID);
        let class_at = usize::from(regs::CLASS_DEVICE);
        space[vendor_at..vendor_at + 2].copy_from_slice(&vendor.0.to_le_bytes());
        space[class_at..class_at + 2].copy_from_slice(&class.0.to_le_bytes());
        self.state
            .lock()
            .unwrap()
            .functions
            .insert((bus, device, function), space);
    }

    pub fn set_address(&self, value: u32) {
        self.state.lock().unwrap().address = value;
    }

    pub fn cse(&self) -> u8 {
        self.state.lock().unwrap().cse
    }

    pub fn config_byte(&self, bus: u8, device: u8, function: u8, offset: u8) -> u8 {
        self.state
            .lock()
            .unwrap()
            .functions
            .get(&(bus, device, function))
            .map_or(0xff, |space| space[usize::from(offset)])
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    fn input(&self, port: u16, width: u8) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::input(port, width));

        match (self.hardware, port, width) {
            (Hardware::Conf1, 0xcf8, 4) => state.address,
            (Hardware::Conf1 | Hardware::Conf1NoEcho, 0xcfc..=0xcff, _) => {
                match state.conf1_target(port) {
                    Some((function, offset)) => state.load(function, offset, width),
                    None => all_ones(width),
                }
            }
            (Hardware::Conf2, 0xcf8, 1) => u32::from(state.cse),
            (Hardware::Conf2, 0xcfa, 1) => u32::from(state.forward),
            (Hardware::Conf2, 0xc000..=0xcfff, _) => match state.conf2_target(port) {
                Some((function, offset)) => state.load(function, offset, width),
                None => all_ones(width),
            },
            _ => all_ones(width),
        }
    }

    fn output(&self, port: u16, width: u8, value: u32) {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::out(port, width, value));

        match (self.hardware, port, width) {
            (Hardware::Conf1 | Hardware::Conf1NoEcho, 0xcf8, 4) => {
                state.address = value;
                state.owner = Some(thread::current().id());
            }
            (Hardware::Conf1 | Hardware::Conf1NoEcho, 0xcfc..=0xcff, _) => {
                if let Some((function, offset)) = state.conf1_target(port) {
                    state.store(function, offset, width, value);
                }
            }
            (Hardware::Conf2, 0xcf8, 1) => {
                state.cse = value as u8;
                state.owner = (state.cse & 0xf0 != 0).then(|| thread::current().id());
            }
            (Hardware::Conf2, 0xcfa, 1) => state.forward = value as u8,
            (Hardware::Conf2, 0xc000..=0xcfff, _) => {
                if let Some((function, offset)) = state.conf2_target(port) {
                    state.store(function, offset, width, value);
                }
            }
            _ => {}
        }
    }
}

impl SimState {
    fn check_owner(&self) {
        if self.owner != Some(thread::current().id()) {
            panic!("address and data phases of different accesses interleaved");
        }
    }

    fn conf1_target(&self, port: u16) -> Option<(Function, u8)> {
        if self.address & 0x8000_0000 == 0 {
            return None;
        }
        self.check_owner();
        let bus = (self.address >> 16) as u8;
        let device = ((self.address >> 11) & 0x1f) as u8;
        let function = ((self.address >> 8) & 0x7) as u8;
        let offset = (self.address & 0xfc) as u8 + (port - 0xcfc) as u8;
        Some(((bus, device, function), offset))
    }

    fn conf2_target(&self, port: u16) -> Option<(Function, u8)> {
        if self.cse & 0xf0 == 0 {
            return None;
        }
        self.check_owner();
        let device = ((port >> 8) & 0xf) as u8;
        let function = (self.cse >> 1) & 0x7;
        Some(((self.forward, device, function), port as u8))
    }

    fn load(&self, function: Function, offset: u8, width: u8) -> u32 {
        let Some(space) = self.functions.get(&function) else {
            return all_ones(width);
        };
        (0..width).rev().fold(0, |acc, i| {
            acc << 8 | u32::from(space[usize::from(offset.wrapping_add(i))])
        })
    }

    fn store(&mut self, function: Function, offset: u8, width: u8, value: u32) {
        let space = self.functions.entry(function).or_insert([0xff; 256]);
        for i in 0..width {
            space[usize::from(offset.wrapping_add(i))] = (value >> (8 * i)) as u8;
        }
    }
}

fn all_ones(width: u8) -> u32 {
    u32::MAX >> (32 - 8 * u32::from(width))
}

unsafe impl PortIo for SimPorts {
    unsafe fn read_u8(&self, port: u16) -> u8 {
        self.input(port, 1) as u8
    }

    unsafe fn read_u16(&self, port: u16) -> u16 {
        self.input(port, 2) as u16
    }

    unsafe fn read_u32(&self, port: u16) -> u32 {
        self.input(port, 4)
    }

    unsafe fn write_u8(&self, port: u16, value: u8) {
        self.output(port, 1, value.into())
    }

    unsafe fn write_u16(&self, port: u16, value: u16) {
        self.output(port, 2, value.into())
    }

    unsafe fn write_u32(&self, port: u16, value: u32) {
        self.output(port, 4, value)
    }

    fn setup_privilege(&self) -> bool {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        self.privileged
    }

    fn release_privilege(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
    }
}
