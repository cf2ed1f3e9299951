//! Direction markers for [`Port`](crate::port::Port).
//!
//! Several legacy ports are only meaningful in one direction (the mechanism 1
//! "disable mechanism 2" byte at `0xcfb` is never read back, for example), so
//! a port handle carries which of `in`/`out` it permits in its type.

use self::sealed::Direction;

/// Ports that may be read with `in`.
pub trait Input: Direction {}

/// Ports that may be written with `out`.
pub trait Output: Direction {}

/// `in` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InOnly {}

/// `out` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutOnly {}

/// Both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InOut {}

impl Direction for InOnly {}
impl Direction for OutOnly {}
impl Direction for InOut {}

impl Input for InOnly {}
impl Input for InOut {}
impl Output for OutOnly {}
impl Output for InOut {}

mod sealed {
    pub trait Direction {}
}
