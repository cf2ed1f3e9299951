//! One-time acquisition of the right to issue raw port I/O.

use log::debug;
use port_io::PortIo;
use spin::Mutex;

/// Outcome of asking the port provider for I/O privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Untried,
    Granted,
    Denied,
}

#[derive(Debug)]
struct GateState {
    privilege: Privilege,
    /// Per mechanism slot, how many `init`s have not been cleaned up yet.
    active: [usize; SLOTS],
}

impl GateState {
    fn idle(&self) -> bool {
        self.active.iter().all(|&n| n == 0)
    }
}

/// Number of mechanisms that can share one gate.
pub(crate) const SLOTS: usize = 2;

/// Memoized port privilege, shared by every mechanism using the same ports.
///
/// Both configuration mechanisms live on overlapping ports, so they share one
/// gate: whichever asks first decides the outcome for the other. Once resolved
/// the outcome is never probed again until the gate is released after the last
/// active mechanism is cleaned up, or [`PrivilegeGate::reset`] is called.
#[derive(Debug)]
pub struct PrivilegeGate {
    state: Mutex<GateState>,
}

impl PrivilegeGate {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                privilege: Privilege::Untried,
                active: [0; SLOTS],
            }),
        }
    }

    pub fn state(&self) -> Privilege {
        self.state.lock().privilege
    }

    /// Returns whether port I/O is usable, asking `io` only the first time.
    pub fn acquire<P: PortIo + ?Sized>(&self, io: &P) -> bool {
        let mut state = self.state.lock();
        if state.privilege == Privilege::Untried {
            state.privilege = if io.setup_privilege() {
                Privilege::Granted
            } else {
                Privilege::Denied
            };
            debug!("port privilege: {:?}", state.privilege);
        }
        state.privilege == Privilege::Granted
    }

    /// Undoes a successful acquisition so that the next `acquire` probes again.
    ///
    /// A denied outcome is left in place.
    pub fn release<P: PortIo + ?Sized>(&self, io: &P) {
        let mut state = self.state.lock();
        Self::release_locked(&mut state, io);
    }

    /// Forgets any outcome, releasing the privilege first if it was granted.
    pub fn reset<P: PortIo + ?Sized>(&self, io: &P) {
        let mut state = self.state.lock();
        Self::release_locked(&mut state, io);
        state.privilege = Privilege::Untried;
        state.active = [0; SLOTS];
    }

    /// Releases the privilege unless some mechanism is still active.
    ///
    /// For callers that probed with `acquire` and then committed to nothing.
    pub fn release_idle<P: PortIo + ?Sized>(&self, io: &P) {
        let mut state = self.state.lock();
        if state.idle() {
            Self::release_locked(&mut state, io);
        }
    }

    pub(crate) fn activate(&self, slot: usize) {
        self.state.lock().active[slot] += 1;
    }

    /// Drops one active user of `slot`; the last one out releases the
    /// privilege. A slot with no active users is left alone.
    pub(crate) fn deactivate<P: PortIo + ?Sized>(&self, slot: usize, io: &P) {
        let mut state = self.state.lock();
        if state.active[slot] == 0 {
            return;
        }
        state.active[slot] -= 1;
        if state.idle() {
            Self::release_locked(&mut state, io);
        }
    }

    fn release_locked<P: PortIo + ?Sized>(state: &mut GateState, io: &P) {
        if state.privilege == Privilege::Granted {
            io.release_privilege();
            state.privilege = Privilege::Untried;
            debug!("port privilege released");
        }
    }
}

impl Default for PrivilegeGate {
    fn default() -> Self {
        Self::new()
    }
}
