//! Entering and leaving debug mode.

use crate::config::Config;
use crate::interface::DebugInterface;
use crate::probe::{BitBang, Gpio};
use crate::Error;

/// Where a [`Session`] is in the debug mode life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Entering,
    Active,
    Leaving,
}

/// A connection to one target.
///
/// Opening a session claims the GPIO lines. They are handed back when the
/// session is closed or dropped, leaving debug mode first if necessary.
#[derive(Debug)]
pub struct Session<G: Gpio> {
    interface: DebugInterface<G>,
    phase: Phase,
    config: Config,
    released: bool,
}

impl<G: Gpio> Session<G> {
    /// Claim the debug lines of `gpio`.
    #[tracing::instrument(skip_all, fields(backend = gpio.name()))]
    pub fn open(gpio: G, config: &Config) -> Result<Self, Error> {
        let mut wire = BitBang::new(gpio, config.pins, config.reset_polarity);

        if let Err(error) = wire.init() {
            // Whatever was exported so far is released again.
            let _ = wire.deinit();
            return Err(error.into());
        }

        tracing::debug!("Claimed GPIOs {:?}", config.pins);

        Ok(Self {
            interface: DebugInterface::new(wire, config.retry_budget()),
            phase: Phase::Disconnected,
            config: config.clone(),
            released: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gpio(&self) -> &G {
        self.interface.wire().gpio()
    }

    /// Put the target into debug mode.
    ///
    /// The clock is pulsed twice while reset is held. Calling this on an
    /// active session restarts debug mode from scratch.
    pub fn enter(&mut self) -> Result<(), Error> {
        self.phase = Phase::Entering;

        let result = (|| {
            let wire = self.interface.wire_mut();
            wire.set_clock(false)?;
            wire.set_reset(true)?;
            wire.pulse_clock(2)?;
            wire.set_reset(false)
        })();

        match result {
            Ok(()) => {
                tracing::debug!("Entered debug mode");
                self.phase = Phase::Active;
                Ok(())
            }
            Err(error) => {
                self.phase = Phase::Disconnected;
                Err(error.into())
            }
        }
    }

    /// Let the target run by pulsing reset.
    pub fn leave(&mut self) -> Result<(), Error> {
        self.phase = Phase::Leaving;

        let wire = self.interface.wire_mut();
        let result = wire.set_reset(true).and_then(|_| wire.set_reset(false));
        self.phase = Phase::Disconnected;

        tracing::debug!("Left debug mode");
        result.map_err(Error::from)
    }

    /// The command interface, if the target is in debug mode.
    pub fn interface(&mut self) -> Result<&mut DebugInterface<G>, Error> {
        match self.phase {
            Phase::Active => Ok(&mut self.interface),
            _ => Err(Error::NotInDebugMode),
        }
    }

    /// Leave debug mode and release the GPIO lines.
    pub fn close(mut self) -> Result<(), Error> {
        self.release()
    }

    fn release(&mut self) -> Result<(), Error> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let left = match self.phase {
            Phase::Disconnected => Ok(()),
            _ => self.leave(),
        };
        let released = self.interface.wire_mut().deinit().map_err(Error::from);

        left.and(released)
    }
}

impl<G: Gpio> Drop for Session<G> {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            tracing::warn!("Failed to release the target: {}", error);
        }
    }
}
