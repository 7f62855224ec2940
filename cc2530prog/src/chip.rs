//! Chip identification.

use crate::interface::DebugInterface;
use crate::probe::Gpio;
use crate::registers::Register;
use crate::{Error, IdMismatch};

/// The chip id every CC2530 reports.
pub const CC2530_ID: u8 = 0xA5;

bitfield::bitfield! {
    /// The `CHIPINFO0` register.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct ChipInfo0(u8);
    impl Debug;

    pub usb, _: 3;
    pub u8, flash_size_code, _: 6, 4;
}

/// The flash sizes the CC2530 family comes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlashSize {
    Kib32,
    Kib64,
    Kib128,
    Kib256,
}

impl FlashSize {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FlashSize::Kib32),
            2 => Some(FlashSize::Kib64),
            3 => Some(FlashSize::Kib128),
            4 => Some(FlashSize::Kib256),
            _ => None,
        }
    }

    pub fn kib(self) -> u32 {
        match self {
            FlashSize::Kib32 => 32,
            FlashSize::Kib64 => 64,
            FlashSize::Kib128 => 128,
            FlashSize::Kib256 => 256,
        }
    }

    pub fn bytes(self) -> u32 {
        self.kib() * 1024
    }
}

impl std::fmt::Display for FlashSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} KiB", self.kib())
    }
}

/// What identification found out about the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    pub id: u8,
    pub revision: u8,
    /// The IEEE extended address, least significant byte first.
    pub extended_address: [u8; 7],
    pub chip_info0: ChipInfo0,
    pub chip_info1: u8,
}

impl ChipInfo {
    pub fn usb(&self) -> bool {
        self.chip_info0.usb()
    }

    /// `None` if the chip reports a size code we don't know.
    pub fn flash_size(&self) -> Option<FlashSize> {
        FlashSize::from_code(self.chip_info0.flash_size_code())
    }

    /// Flash capacity in bytes.
    pub fn flash_capacity(&self) -> Result<u32, Error> {
        self.flash_size()
            .map(FlashSize::bytes)
            .ok_or(Error::UnsupportedFlashSize {
                code: self.chip_info0.flash_size_code(),
            })
    }

    /// The extended address as it is usually written, most significant byte
    /// first.
    pub fn extended_address_string(&self) -> String {
        self.extended_address
            .iter()
            .rev()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl std::fmt::Display for ChipInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Texas Instruments CC2530 (ID: {:#04x}, rev {:#04x})",
            self.id, self.revision
        )
    }
}

/// Check that a CC2530 is connected and read its chip information.
#[tracing::instrument(skip_all)]
pub fn identify<G: Gpio>(interface: &mut DebugInterface<G>) -> Result<ChipInfo, Error> {
    let (id, revision) = interface.chip_id()?;

    if id != CC2530_ID {
        let reason = IdMismatch::classify(id);
        tracing::warn!("Unknown chip id {:#04x}: {}", id, reason);
        return Err(Error::UnrecognizedChip { id, reason });
    }

    let mut extended_address = [0; 7];
    for (offset, byte) in (0u16..).zip(extended_address.iter_mut()) {
        *byte = interface.read_xdata(Register::ExtAddr0.address() + offset)?;
    }

    let chip_info0 = ChipInfo0(interface.read_register(Register::ChipInfo0)?);
    let chip_info1 = interface.read_register(Register::ChipInfo1)?;

    let info = ChipInfo {
        id,
        revision,
        extended_address,
        chip_info0,
        chip_info1,
    };

    tracing::info!("{}", info);
    tracing::debug!(
        "Extended address {}, USB {}, flash {:?}",
        info.extended_address_string(),
        if info.usb() { "available" } else { "not available" },
        info.flash_size()
    );

    Ok(info)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1, Some(32))]
    #[test_case(2, Some(64))]
    #[test_case(3, Some(128))]
    #[test_case(4, Some(256))]
    #[test_case(0, None)]
    #[test_case(5, None)]
    #[test_case(7, None)]
    fn flash_size_codes(code: u8, kib: Option<u32>) {
        assert_eq!(FlashSize::from_code(code).map(FlashSize::kib), kib);
    }

    #[test]
    fn chip_info0_fields() {
        let info = ChipInfo0(0b0011_1000);
        assert!(info.usb());
        assert_eq!(info.flash_size_code(), 3);

        let info = ChipInfo0(0b0100_0000);
        assert!(!info.usb());
        assert_eq!(info.flash_size_code(), 4);
    }

    #[test]
    fn unknown_size_is_an_error_not_zero() {
        let info = ChipInfo {
            id: CC2530_ID,
            revision: 0,
            extended_address: [0; 7],
            chip_info0: ChipInfo0(0x70),
            chip_info1: 0,
        };

        assert!(matches!(
            info.flash_capacity(),
            Err(Error::UnsupportedFlashSize { code: 7 })
        ));
    }

    #[test]
    fn extended_address_prints_most_significant_first() {
        let info = ChipInfo {
            id: CC2530_ID,
            revision: 0,
            extended_address: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07],
            chip_info0: ChipInfo0(0x20),
            chip_info1: 0,
        };

        assert_eq!(info.extended_address_string(), "07:06:05:04:03:02:01");
        assert_eq!(info.flash_capacity().unwrap(), 64 * 1024);
    }
}
