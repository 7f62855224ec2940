use super::{Direction, Gpio, GpioError, Pins, ResetPolarity};

/// Drives the debug clock and data lines one bit at a time.
///
/// Bytes travel most significant bit first. When sending, the data line is
/// set up before the rising clock edge, which is where the target samples
/// it. When receiving, the target presents the bit on the rising edge and it
/// is sampled before the clock drops again.
#[derive(Debug)]
pub struct BitBang<G> {
    gpio: G,
    pins: Pins,
    reset_polarity: ResetPolarity,
}

impl<G: Gpio> BitBang<G> {
    pub fn new(gpio: G, pins: Pins, reset_polarity: ResetPolarity) -> Self {
        Self {
            gpio,
            pins,
            reset_polarity,
        }
    }

    pub fn pins(&self) -> &Pins {
        &self.pins
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    pub fn into_gpio(self) -> G {
        self.gpio
    }

    /// Export all three lines and configure them as outputs.
    pub fn init(&mut self) -> Result<(), GpioError> {
        for pin in self.pins.all() {
            self.gpio.export(pin)?;
            self.gpio.set_direction(pin, Direction::Out)?;
        }

        Ok(())
    }

    /// Put all three lines back as inputs and unexport them.
    ///
    /// Every line is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn deinit(&mut self) -> Result<(), GpioError> {
        let mut result = Ok(());

        for pin in self.pins.all() {
            let released = self
                .gpio
                .set_direction(pin, Direction::In)
                .and_then(|_| self.gpio.unexport(pin));

            if let Err(error) = released {
                tracing::warn!("Failed to release GPIO {}: {}", pin, error);
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }

        result
    }

    /// Assert or release the target reset, honouring the configured polarity.
    pub fn set_reset(&mut self, asserted: bool) -> Result<(), GpioError> {
        let level = self.reset_polarity.level(asserted);
        self.gpio.set_value(self.pins.reset, level)
    }

    pub fn set_clock(&mut self, high: bool) -> Result<(), GpioError> {
        self.gpio.set_value(self.pins.clock, high)
    }

    /// Raise and drop the clock line `count` times.
    pub fn pulse_clock(&mut self, count: usize) -> Result<(), GpioError> {
        for _ in 0..count {
            self.set_clock(true)?;
            self.set_clock(false)?;
        }

        Ok(())
    }

    /// Let the host drive the data line.
    pub fn drive_data(&mut self) -> Result<(), GpioError> {
        self.gpio.set_direction(self.pins.data, Direction::Out)
    }

    /// Let the target drive the data line.
    pub fn release_data(&mut self) -> Result<(), GpioError> {
        self.gpio.set_direction(self.pins.data, Direction::In)
    }

    pub fn sample_data(&mut self) -> Result<bool, GpioError> {
        self.gpio.value(self.pins.data)
    }

    pub fn send_byte(&mut self, value: u8) -> Result<(), GpioError> {
        for bit in (0..8).rev() {
            self.gpio.set_value(self.pins.data, value & (1 << bit) != 0)?;
            self.set_clock(true)?;
            self.set_clock(false)?;
        }

        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8, GpioError> {
        let mut value = 0;

        for bit in (0..8).rev() {
            self.set_clock(true)?;
            if self.gpio.value(self.pins.data)? {
                value |= 1 << bit;
            }
            self.set_clock(false)?;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Feeds every bit clocked out back in on the next reads.
    #[derive(Default)]
    struct Loopback {
        data_out: bool,
        data_line: bool,
        sending: bool,
        bits: VecDeque<bool>,
        events: Vec<(u32, bool)>,
    }

    impl Gpio for Loopback {
        fn name(&self) -> &str {
            "loopback"
        }

        fn export(&mut self, _pin: u32) -> Result<(), GpioError> {
            Ok(())
        }

        fn unexport(&mut self, _pin: u32) -> Result<(), GpioError> {
            Ok(())
        }

        fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<(), GpioError> {
            if pin == 2 {
                self.sending = direction != Direction::In;
            }
            Ok(())
        }

        fn value(&mut self, _pin: u32) -> Result<bool, GpioError> {
            Ok(self.data_line)
        }

        fn set_value(&mut self, pin: u32, value: bool) -> Result<(), GpioError> {
            self.events.push((pin, value));
            match pin {
                1 if value && self.sending => self.bits.push_back(self.data_out),
                1 if value => self.data_line = self.bits.pop_front().unwrap_or(true),
                2 => self.data_out = value,
                _ => {}
            }
            Ok(())
        }
    }

    fn wire() -> BitBang<Loopback> {
        BitBang::new(Loopback::default(), Pins::default(), ResetPolarity::ActiveLow)
    }

    #[test]
    fn every_byte_survives_a_loopback() {
        let mut wire = wire();

        for value in 0..=255u8 {
            wire.drive_data().unwrap();
            wire.send_byte(value).unwrap();
            wire.release_data().unwrap();
            assert_eq!(wire.read_byte().unwrap(), value);
        }
    }

    #[test]
    fn data_is_set_up_before_the_rising_edge() {
        let mut wire = wire();
        wire.drive_data().unwrap();
        wire.send_byte(0b1000_0001).unwrap();

        let events = &wire.gpio().events;
        assert_eq!(events.len(), 24);
        assert_eq!(&events[0..3], &[(2, true), (1, true), (1, false)]);
        assert_eq!(&events[3..6], &[(2, false), (1, true), (1, false)]);
        assert_eq!(&events[21..24], &[(2, true), (1, true), (1, false)]);
    }

    #[test]
    fn reset_follows_polarity() {
        let mut wire = BitBang::new(
            Loopback::default(),
            Pins::default(),
            ResetPolarity::ActiveHigh,
        );
        wire.set_reset(true).unwrap();
        wire.set_reset(false).unwrap();

        assert_eq!(wire.gpio().events, vec![(0, true), (0, false)]);
    }
}
