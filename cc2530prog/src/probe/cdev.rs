//! GPIO backend using the Linux GPIO character device.

use std::collections::HashMap;
use std::path::PathBuf;

use gpiocdev::line::Value;
use gpiocdev::Request;

use super::{Direction, Gpio, GpioError};

/// Accesses GPIO lines of one `/dev/gpiochipN` device.
///
/// Exporting a pin requests the line from the kernel, unexporting releases
/// it again.
pub struct CdevGpio {
    chip: PathBuf,
    requests: HashMap<u32, Request>,
}

impl std::fmt::Debug for CdevGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdevGpio")
            .field("chip", &self.chip)
            .field("lines", &self.requests.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CdevGpio {
    pub fn new(chip: impl Into<PathBuf>) -> Self {
        Self {
            chip: chip.into(),
            requests: HashMap::new(),
        }
    }

    fn request(&self, pin: u32) -> Result<&Request, GpioError> {
        self.requests.get(&pin).ok_or(GpioError::NotExported(pin))
    }
}

fn backend(error: gpiocdev::Error) -> GpioError {
    GpioError::Backend(Box::new(error))
}

fn to_value(value: bool) -> Value {
    if value {
        Value::Active
    } else {
        Value::Inactive
    }
}

impl Gpio for CdevGpio {
    fn name(&self) -> &str {
        "cdev"
    }

    fn export(&mut self, pin: u32) -> Result<(), GpioError> {
        if self.requests.contains_key(&pin) {
            return Ok(());
        }

        let request = Request::builder()
            .on_chip(&self.chip)
            .with_consumer("cc2530prog")
            .with_line(pin)
            .as_input()
            .request()
            .map_err(backend)?;

        self.requests.insert(pin, request);
        Ok(())
    }

    fn unexport(&mut self, pin: u32) -> Result<(), GpioError> {
        self.requests.remove(&pin);
        Ok(())
    }

    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<(), GpioError> {
        let request = self.request(pin)?;
        let mut config = request.config();

        match direction {
            Direction::In => config.with_line(pin).as_input(),
            Direction::Out => config.with_line(pin).as_output(Value::Inactive),
            Direction::High => config.with_line(pin).as_output(Value::Active),
        };

        request.reconfigure(&config).map_err(backend)
    }

    fn value(&mut self, pin: u32) -> Result<bool, GpioError> {
        let value = self.request(pin)?.value(pin).map_err(backend)?;
        Ok(value == Value::Active)
    }

    fn set_value(&mut self, pin: u32, value: bool) -> Result<(), GpioError> {
        self.request(pin)?
            .set_value(pin, to_value(value))
            .map_err(backend)
    }
}
