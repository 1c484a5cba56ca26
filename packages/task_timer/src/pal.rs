//! Platform abstraction layer for the monotonic clock.
//!
//! Recording uses the real monotonic clock of the operating system, whereas tests
//! substitute a fake clock that only moves when told to, making elapsed times exact.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
#[cfg(test)]
pub(crate) use fake::FakePlatform;
