use crate::interface::DebugInterface;
use crate::probe::Gpio;
use crate::registers::Register;
use crate::Error;

use super::error::Mismatch;
use super::image::FirmwareImage;
use super::{FlashError, FlashProgress};

/// Flash is visible in XDATA one 32 KiB bank at a time.
pub const BANK_SIZE: u32 = 32 * 1024;
/// Number of banks `MEMCTR` can select.
pub const BANKS: u8 = 8;
/// Where the selected bank appears in XDATA.
pub const BANK_WINDOW: u16 = 0x8000;

/// Progress is reported every this many bytes.
const REPORT_INTERVAL: u32 = 1024;

/// Outcome of reading back the flash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerifyReport {
    /// Bytes read back and compared, whether they matched or not.
    pub compared: u32,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    /// All `expected` bytes were compared and matched.
    pub fn is_ok(&self, expected: u32) -> bool {
        self.compared == expected && self.mismatches.is_empty()
    }
}

/// Read back the first `len` bytes of flash and compare them with `image`.
///
/// Bytes past the end of the image are expected to read as erased flash.
/// Mismatches are collected, they don't stop the read back.
#[tracing::instrument(skip(interface, image, progress))]
pub fn verify_flash<G: Gpio>(
    interface: &mut DebugInterface<G>,
    image: &FirmwareImage,
    len: u32,
    progress: &FlashProgress,
) -> Result<VerifyReport, Error> {
    progress.started_verifying(len);

    let result = read_back(interface, image, len, progress);

    match &result {
        Ok(report) => progress.finished_verifying(report.compared, report.mismatches.len()),
        Err(_) => progress.failed_verifying(),
    }

    result
}

fn read_back<G: Gpio>(
    interface: &mut DebugInterface<G>,
    image: &FirmwareImage,
    len: u32,
    progress: &FlashProgress,
) -> Result<VerifyReport, Error> {
    let mut cursor = image.cursor();
    let mut report = VerifyReport::default();

    'banks: for bank in 0..BANKS {
        if report.compared == len {
            break;
        }

        tracing::debug!("Reading bank {}", bank);
        interface.write_register(Register::MemCtr, bank)?;
        interface.load_dptr(BANK_WINDOW)?;

        for _ in 0..BANK_SIZE {
            if report.compared == len {
                break 'banks;
            }

            let offset = report.compared;
            let actual = interface
                .load_at_dptr()
                .and_then(|value| interface.increment_dptr().map(|_| value))
                .map_err(|source| read_back_error(offset, source))?;

            let expected = cursor.next_byte();
            if actual != expected {
                let mismatch = Mismatch {
                    offset,
                    expected,
                    actual,
                };
                tracing::warn!("{}", mismatch);
                report.mismatches.push(mismatch);
            }

            report.compared += 1;
            if report.compared % REPORT_INTERVAL == 0 {
                progress.bytes_verified(REPORT_INTERVAL);
            }
        }
    }

    let remainder = report.compared % REPORT_INTERVAL;
    if remainder != 0 {
        progress.bytes_verified(remainder);
    }

    Ok(report)
}

fn read_back_error(offset: u32, source: Error) -> Error {
    FlashError::ReadBack {
        offset,
        source: Box::new(source),
    }
    .into()
}
