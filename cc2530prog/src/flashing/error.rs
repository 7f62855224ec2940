use thiserror::Error;

use crate::error;

/// A byte that read back differently than it was programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Offset from the start of flash.
    pub offset: u32,
    pub expected: u8,
    pub actual: u8,
}

impl Mismatch {
    /// The flash bank of the offending byte.
    pub fn bank(&self) -> u32 {
        self.offset / super::verify::BANK_SIZE
    }
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[bank{}][{}] read {:02x}, expected {:02x}",
            self.bank(),
            self.offset % super::verify::BANK_SIZE,
            self.actual,
            self.expected
        )
    }
}

/// Describes any error that happened during or in preparation of a download.
#[derive(Error, Debug)]
pub enum FlashError {
    #[error("The image is {size} bytes long, but the chip only has {capacity} bytes of flash.")]
    ImageTooLarge { size: u32, capacity: u32 },

    #[error("The 32 MHz crystal oscillator did not become stable.")]
    ClockNotStable(#[source] Box<error::Error>),

    #[error("Erasing the chip failed.")]
    Erase(#[source] Box<error::Error>),

    #[error("Programming block {block} failed.")]
    Program {
        block: u16,
        #[source]
        source: Box<error::Error>,
    },

    #[error("Verification failed: {compared} of {expected} bytes compared, {} mismatches.", .mismatches.len())]
    Verify {
        compared: u32,
        expected: u32,
        mismatches: Vec<Mismatch>,
    },

    // Reading back failed outright, as opposed to reading wrong data.
    #[error("Reading back the flash at offset {offset:#07x} failed.")]
    ReadBack {
        offset: u32,
        #[source]
        source: Box<error::Error>,
    },
}
