use crate::flashing::FlashError;
use crate::probe::GpioError;

/// The error type of every fallible operation in this crate.
#[derive(thiserror::Error, Debug, docsplay::Display)]
pub enum Error {
    /// A GPIO operation failed.
    Gpio(#[from] GpioError),

    /// Timed out waiting for {operation}.
    Timeout { operation: &'static str },

    /// The target reported chip id {id:#04x}: {reason}.
    UnrecognizedChip { id: u8, reason: IdMismatch },

    /// Wrote {written:#04x} to the debug configuration, but {read:#04x} was read back.
    ProtocolMismatch { written: u8, read: u8 },

    /// Accessing XDATA at {address:#06x} failed.
    Xdata {
        address: u16,
        #[source]
        source: Box<Error>,
    },

    /// The {command} command takes {expected} parameter bytes, {actual} were given.
    InvalidParameterCount {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// There is no debug command called {0:?}.
    UnknownCommand(String),

    /// The chip reports flash size code {code}, which is not supported.
    UnsupportedFlashSize { code: u8 },

    /// The target is not in debug mode.
    NotInDebugMode,

    /// Flashing the target failed.
    Flash(#[from] FlashError),
}

/// Why a chip id was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, docsplay::Display)]
pub enum IdMismatch {
    /// the debug lines appear to be driven by another device
    Contended,
    /// this is not a CC2530
    WrongChip,
}

impl IdMismatch {
    /// Classify an unexpected chip id. A floating or shorted bus reads as all
    /// zeros or all ones.
    pub fn classify(id: u8) -> Self {
        match id {
            0x00 | 0xFF => IdMismatch::Contended,
            _ => IdMismatch::WrongChip,
        }
    }
}

impl Error {
    /// Attach the XDATA address an operation was working on.
    pub(crate) fn at_address(self, address: u16) -> Self {
        match self {
            already @ Error::Xdata { .. } => already,
            other => Error::Xdata {
                address,
                source: Box::new(other),
            },
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floating_lines_are_told_apart_from_other_chips() {
        assert_eq!(IdMismatch::classify(0x00), IdMismatch::Contended);
        assert_eq!(IdMismatch::classify(0xFF), IdMismatch::Contended);
        assert_eq!(IdMismatch::classify(0x8D), IdMismatch::WrongChip);
    }

    #[test]
    fn the_innermost_address_is_kept() {
        let error = Error::Timeout {
            operation: "debug_inst",
        }
        .at_address(0x6270)
        .at_address(0x0800);

        assert!(matches!(
            error,
            Error::Xdata {
                address: 0x6270,
                ..
            }
        ));
    }
}
