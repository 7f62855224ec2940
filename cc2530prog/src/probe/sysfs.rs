//! GPIO backend using the Linux `/sys/class/gpio` interface.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Direction, Gpio, GpioError};

/// The default mount point of the sysfs GPIO class.
pub const SYSFS_GPIO: &str = "/sys/class/gpio";

// EBUSY on Linux: the line is already exported.
const EBUSY: i32 = 16;

/// Accesses GPIO lines through sysfs.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO)
    }

    /// Use a different sysfs root, e.g. a scratch directory in tests.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_path(&self, pin: u32, attribute: &str) -> PathBuf {
        self.root.join(format!("gpio{pin}")).join(attribute)
    }

    fn write_file(path: &Path, contents: &str) -> Result<(), GpioError> {
        let result = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|mut file| file.write_all(contents.as_bytes()));

        match result {
            Ok(()) => Ok(()),
            Err(error) if error.raw_os_error() == Some(EBUSY) => {
                tracing::debug!("{:?} is busy, assuming it is already set up", path);
                Ok(())
            }
            Err(error) => Err(GpioError::io(path, error)),
        }
    }

    fn read_file(path: &Path) -> Result<String, GpioError> {
        fs::read_to_string(path).map_err(|error| GpioError::io(path, error))
    }
}

impl Gpio for SysfsGpio {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn export(&mut self, pin: u32) -> Result<(), GpioError> {
        Self::write_file(&self.root.join("export"), &pin.to_string())
    }

    fn unexport(&mut self, pin: u32) -> Result<(), GpioError> {
        Self::write_file(&self.root.join("unexport"), &pin.to_string())
    }

    fn set_direction(&mut self, pin: u32, direction: Direction) -> Result<(), GpioError> {
        let direction = match direction {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::High => "high",
        };

        Self::write_file(&self.pin_path(pin, "direction"), direction)
    }

    fn value(&mut self, pin: u32) -> Result<bool, GpioError> {
        let value = Self::read_file(&self.pin_path(pin, "value"))?;

        match value.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(GpioError::InvalidValue {
                pin,
                value: other.to_owned(),
            }),
        }
    }

    fn set_value(&mut self, pin: u32, value: bool) -> Result<(), GpioError> {
        Self::write_file(&self.pin_path(pin, "value"), if value { "1" } else { "0" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "cc2530prog-sysfs-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("gpio7")).unwrap();
        for file in ["export", "unexport", "gpio7/direction", "gpio7/value"] {
            fs::write(root.join(file), "").unwrap();
        }
        root
    }

    #[test]
    fn writes_the_sysfs_attributes() {
        let root = scratch("attributes");
        let mut gpio = SysfsGpio::with_root(&root);

        gpio.export(7).unwrap();
        assert_eq!(fs::read_to_string(root.join("export")).unwrap(), "7");

        gpio.set_direction(7, Direction::High).unwrap();
        assert_eq!(
            fs::read_to_string(root.join("gpio7/direction")).unwrap(),
            "high"
        );

        gpio.set_value(7, true).unwrap();
        assert!(gpio.value(7).unwrap());
        gpio.set_value(7, false).unwrap();
        assert!(!gpio.value(7).unwrap());

        gpio.unexport(7).unwrap();
        assert_eq!(fs::read_to_string(root.join("unexport")).unwrap(), "7");

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn a_garbled_value_is_an_error() {
        let root = scratch("garbled");
        fs::write(root.join("gpio7/value"), "x\n").unwrap();
        let mut gpio = SysfsGpio::with_root(&root);

        assert!(matches!(
            gpio.value(7),
            Err(GpioError::InvalidValue { pin: 7, .. })
        ));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn a_missing_pin_reports_the_path() {
        let root = scratch("missing");
        let mut gpio = SysfsGpio::with_root(&root);

        match gpio.set_value(9, true) {
            Err(GpioError::Io { path, .. }) => assert!(path.ends_with("gpio9/value")),
            other => panic!("unexpected result: {other:?}"),
        }

        fs::remove_dir_all(root).unwrap();
    }
}
