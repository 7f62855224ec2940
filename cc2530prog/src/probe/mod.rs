//! GPIO access used to drive the debug port.
//!
//! The programmer only needs three lines: reset, debug clock and debug data.
//! How those lines are reached is up to a [`Gpio`] backend. The crate ships a
//! sysfs backend, an optional character device backend (feature `cdev`) and,
//! for tests, a simulated target.

pub(crate) mod bitbang;
#[cfg(all(feature = "cdev", target_os = "linux"))]
pub mod cdev;
#[cfg(any(test, feature = "test"))]
pub mod fake_target;
pub mod sysfs;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use bitbang::BitBang;
#[cfg(all(feature = "cdev", target_os = "linux"))]
pub use cdev::CdevGpio;
#[cfg(any(test, feature = "test"))]
pub use fake_target::{FakeTarget, FakeTargetConfig};
pub use sysfs::SysfsGpio;

/// Direction of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The line is sampled.
    In,
    /// The line is driven, starting low.
    Out,
    /// The line is driven, starting high.
    High,
}

/// Minimal GPIO capability needed by the programmer.
///
/// Every operation can fail. A failure aborts the calling operation and is
/// reported as [`crate::Error::Gpio`].
pub trait Gpio {
    /// A short name for the backend, used in log messages.
    fn name(&self) -> &str;

    /// Make `pin` available for use.
    fn export(&mut self, pin: u32) -> Result<(), GpioError>;

    /// Give `pin` back.
    fn unexport(&mut self, pin: u32) -> Result<(), GpioError>;

    /// Change the direction of `pin`.
    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<(), GpioError>;

    /// Sample the current level of `pin`.
    fn value(&mut self, pin: u32) -> Result<bool, GpioError>;

    /// Drive `pin` to `value`.
    fn set_value(&mut self, pin: u32, value: bool) -> Result<(), GpioError>;
}

impl<G: Gpio + ?Sized> Gpio for Box<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn export(&mut self, pin: u32) -> Result<(), GpioError> {
        (**self).export(pin)
    }

    fn unexport(&mut self, pin: u32) -> Result<(), GpioError> {
        (**self).unexport(pin)
    }

    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<(), GpioError> {
        (**self).set_direction(pin, direction)
    }

    fn value(&mut self, pin: u32) -> Result<bool, GpioError> {
        (**self).value(pin)
    }

    fn set_value(&mut self, pin: u32, value: bool) -> Result<(), GpioError> {
        (**self).set_value(pin, value)
    }
}

/// Level at which the reset line holds the target in reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolarity {
    /// Reset is asserted by driving the line low.
    #[default]
    ActiveLow,
    /// Reset is asserted by driving the line high.
    ActiveHigh,
}

impl ResetPolarity {
    /// The line level that corresponds to reset being `asserted`.
    pub fn level(self, asserted: bool) -> bool {
        match self {
            ResetPolarity::ActiveLow => !asserted,
            ResetPolarity::ActiveHigh => asserted,
        }
    }
}

/// Assignment of the three debug port signals to GPIO numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub reset: u32,
    pub clock: u32,
    pub data: u32,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            reset: 0,
            clock: 1,
            data: 2,
        }
    }
}

impl Pins {
    /// All pins, in the order they are set up.
    pub fn all(&self) -> [u32; 3] {
        [self.reset, self.clock, self.data]
    }
}

/// An error reported by a [`Gpio`] backend.
#[derive(thiserror::Error, Debug, docsplay::Display)]
pub enum GpioError {
    /// Accessing {path:?} failed.
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// GPIO {pin} reported an unexpected value {value:?}.
    InvalidValue { pin: u32, value: String },

    /// GPIO {0} has not been exported.
    NotExported(u32),

    /// An error specific to the GPIO backend occurred.
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GpioError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
