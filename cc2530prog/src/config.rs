//! Programmer settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::probe::{Pins, ResetPolarity};
use crate::retry::RetryBudget;

/// Which [`Gpio`](crate::probe::Gpio) backend drives the debug lines.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    #[default]
    Sysfs,
    /// The GPIO character device, only available with the `cdev` feature.
    Cdev,
}

impl std::str::FromStr for GpioBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sysfs" => Ok(GpioBackend::Sysfs),
            "cdev" => Ok(GpioBackend::Cdev),
            other => Err(format!("unknown GPIO backend '{other}'")),
        }
    }
}

/// Everything that can be tuned about a programming run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub reset_polarity: ResetPolarity,
    /// Retry budget of every busy poll.
    pub retries: u32,
    /// Pause between two erase status polls, in microseconds.
    pub erase_poll_interval_us: u64,
    /// How often identification is tried before programming gives up.
    pub identify_attempts: u32,
    /// How often debug mode is re-entered when enabling DMA is not
    /// acknowledged.
    pub dma_enable_attempts: u32,
    pub gpio_backend: GpioBackend,
    /// Character device used by the `cdev` backend.
    pub chip: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pins: Pins::default(),
            reset_polarity: ResetPolarity::default(),
            retries: 1000,
            erase_poll_interval_us: 10,
            identify_attempts: 3,
            dma_enable_attempts: 3,
            gpio_backend: GpioBackend::default(),
            chip: PathBuf::from("/dev/gpiochip0"),
        }
    }
}

impl Config {
    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::new(self.retries)
    }

    pub fn erase_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.erase_poll_interval_us)
    }
}
