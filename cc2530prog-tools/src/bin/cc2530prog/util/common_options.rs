use std::path::PathBuf;

use cc2530prog::probe::{Gpio, ResetPolarity, SysfsGpio};
use cc2530prog::{Config, GpioBackend, Session};

use super::parse_u32;

/// Options selecting how the target is wired up.
///
/// Anything given here overrides the configuration files.
#[derive(clap::Parser, Debug, Default)]
pub struct TargetOptions {
    /// GPIO connected to the target's reset line.
    #[arg(long, global = true, value_parser = parse_u32, help_heading = "TARGET CONFIGURATION")]
    pub reset_pin: Option<u32>,
    /// GPIO connected to the debug clock.
    #[arg(long, global = true, value_parser = parse_u32, help_heading = "TARGET CONFIGURATION")]
    pub clock_pin: Option<u32>,
    /// GPIO connected to the debug data line.
    #[arg(long, global = true, value_parser = parse_u32, help_heading = "TARGET CONFIGURATION")]
    pub data_pin: Option<u32>,
    /// The target is held in reset while the reset line is high.
    #[arg(long, global = true, help_heading = "TARGET CONFIGURATION")]
    pub reset_active_high: bool,
    /// Retry budget for every wait on the target.
    #[arg(long, global = true, value_parser = parse_u32, help_heading = "TARGET CONFIGURATION")]
    pub retries: Option<u32>,
    /// GPIO backend, `sysfs` or `cdev`.
    #[arg(long, global = true, help_heading = "TARGET CONFIGURATION")]
    pub backend: Option<GpioBackend>,
    /// GPIO character device used by the `cdev` backend.
    #[arg(long, global = true, help_heading = "TARGET CONFIGURATION")]
    pub gpio_chip: Option<PathBuf>,
}

impl TargetOptions {
    pub fn apply(&self, config: &mut Config) {
        if let Some(pin) = self.reset_pin {
            config.pins.reset = pin;
        }
        if let Some(pin) = self.clock_pin {
            config.pins.clock = pin;
        }
        if let Some(pin) = self.data_pin {
            config.pins.data = pin;
        }
        if self.reset_active_high {
            config.reset_polarity = ResetPolarity::ActiveHigh;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(backend) = self.backend {
            config.gpio_backend = backend;
        }
        if let Some(chip) = &self.gpio_chip {
            config.chip = chip.clone();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("The {0:?} GPIO backend is not available in this build.")]
    #[allow(dead_code)]
    BackendUnavailable(GpioBackend),

    #[error("Failed to claim GPIOs {reset}, {clock} and {data} through the {backend:?} backend.")]
    FailedToOpen {
        backend: GpioBackend,
        reset: u32,
        clock: u32,
        data: u32,
        #[source]
        source: cc2530prog::Error,
    },

    #[error("Failed to put the target into debug mode.")]
    FailedToEnterDebugMode(#[source] cc2530prog::Error),
}

pub type BoxedGpio = Box<dyn Gpio>;

fn backend(config: &Config) -> Result<BoxedGpio, OperationError> {
    match config.gpio_backend {
        GpioBackend::Sysfs => Ok(Box::new(SysfsGpio::new())),
        #[cfg(all(feature = "cdev", target_os = "linux"))]
        GpioBackend::Cdev => Ok(Box::new(cc2530prog::probe::CdevGpio::new(
            config.chip.clone(),
        ))),
        #[cfg(not(all(feature = "cdev", target_os = "linux")))]
        GpioBackend::Cdev => Err(OperationError::BackendUnavailable(GpioBackend::Cdev)),
    }
}

/// Claim the GPIOs named by `config`.
pub fn open_session(config: &Config) -> Result<Session<BoxedGpio>, OperationError> {
    let gpio = backend(config)?;

    Session::open(gpio, config).map_err(|source| OperationError::FailedToOpen {
        backend: config.gpio_backend,
        reset: config.pins.reset,
        clock: config.pins.clock,
        data: config.pins.data,
        source,
    })
}

/// Claim the GPIOs and put the target into debug mode.
pub fn attach(config: &Config) -> Result<Session<BoxedGpio>, OperationError> {
    let mut session = open_session(config)?;
    session
        .enter()
        .map_err(OperationError::FailedToEnterDebugMode)?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_what_was_given() {
        let options = TargetOptions {
            data_pin: Some(17),
            reset_active_high: true,
            retries: Some(20),
            ..TargetOptions::default()
        };

        let mut config = Config::default();
        options.apply(&mut config);

        assert_eq!(config.pins.reset, 0);
        assert_eq!(config.pins.clock, 1);
        assert_eq!(config.pins.data, 17);
        assert_eq!(config.reset_polarity, ResetPolarity::ActiveHigh);
        assert_eq!(config.retries, 20);
        assert_eq!(config.gpio_backend, GpioBackend::Sysfs);
    }
}
