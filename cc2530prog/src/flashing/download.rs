use crate::chip::{self, ChipInfo};
use crate::interface::DebugInterface;
use crate::probe::Gpio;
use crate::registers::{Register, CLOCK_32MHZ_XOSC, CONFIG_DMA_ENABLED};
use crate::retry::with_attempts;
use crate::session::{Phase, Session};
use crate::Error;

use super::erase::erase_chip;
use super::flasher::{Flasher, ProgramReport};
use super::image::FirmwareImage;
use super::plan::ProgrammingPlan;
use super::verify::{verify_flash, VerifyReport};
use super::{FlashError, FlashProgress};

/// Options for downloading an image.
#[derive(Debug, Default)]
pub struct DownloadOptions {
    /// Read the flash back after programming and compare it with the image.
    pub verify: bool,
    /// Receives progress events.
    pub progress: FlashProgress,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What a successful download did.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub chip: ChipInfo,
    pub program: ProgramReport,
    /// Present if verification was requested.
    pub verify: Option<VerifyReport>,
}

/// Identify the chip, erase it, program `image` and optionally verify it.
///
/// The session is put into debug mode first if it is not yet. It is left
/// in debug mode afterwards; closing the session lets the target run.
#[tracing::instrument(skip_all, fields(len = image.len(), verify = options.verify))]
pub fn download<G: Gpio>(
    session: &mut Session<G>,
    image: &FirmwareImage,
    options: &DownloadOptions,
) -> Result<DownloadReport, Error> {
    let config = session.config().clone();
    let progress = &options.progress;

    if session.phase() != Phase::Active {
        session.enter()?;
    }

    let chip = with_attempts(
        session,
        config.identify_attempts,
        |session, _| chip::identify(session.interface()?),
        |_, error| {
            tracing::warn!("Identification failed, retrying: {}", error);
            Ok(())
        },
    )?;
    progress.identified(&chip);

    let capacity = chip.flash_capacity()?;
    if image.len() > capacity {
        return Err(FlashError::ImageTooLarge {
            size: image.len(),
            capacity,
        }
        .into());
    }
    tracing::info!("Using {} byte image, {} bytes of flash", image.len(), capacity);

    enable_dma(session, config.dma_enable_attempts)?;

    let interface = session.interface()?;
    switch_to_crystal(interface).map_err(|e| FlashError::ClockNotStable(Box::new(e)))?;

    progress.started_erasing();
    if let Err(error) = erase_chip(interface, config.erase_poll_interval()) {
        progress.failed_erasing();
        return Err(FlashError::Erase(Box::new(error)).into());
    }
    progress.finished_erasing();

    let program = Flasher::new(interface, progress).program(image)?;

    let verify = if options.verify {
        let expected = ProgrammingPlan::new(image.len()).programmed_len();
        let report = verify_flash(interface, image, expected, progress)?;

        if !report.is_ok(expected) {
            return Err(FlashError::Verify {
                compared: report.compared,
                expected,
                mismatches: report.mismatches,
            }
            .into());
        }

        tracing::info!("Verification OK");
        Some(report)
    } else {
        None
    };

    Ok(DownloadReport {
        chip,
        program,
        verify,
    })
}

/// Let DMA run while the CPU is halted.
///
/// If the configuration is not echoed back, debug mode is entered again
/// from scratch and the write repeated.
fn enable_dma<G: Gpio>(session: &mut Session<G>, attempts: u32) -> Result<(), Error> {
    with_attempts(
        session,
        attempts,
        |session, _| {
            let read = session.interface()?.write_config(CONFIG_DMA_ENABLED)?;

            if read == CONFIG_DMA_ENABLED {
                Ok(())
            } else {
                Err(Error::ProtocolMismatch {
                    written: CONFIG_DMA_ENABLED,
                    read,
                })
            }
        },
        |session, error| {
            tracing::warn!("{} Re-entering debug mode.", error);
            session.enter()
        },
    )
}

/// Run from the 32 MHz crystal, which DMA fed flash writes need.
fn switch_to_crystal<G: Gpio>(interface: &mut DebugInterface<G>) -> Result<(), Error> {
    interface.write_register(Register::ClkConCmd, CLOCK_32MHZ_XOSC)?;

    interface
        .budget()
        .poll(|_| Ok::<_, Error>(interface.read_register(Register::ClkConSta)? == CLOCK_32MHZ_XOSC))?
        .map(drop)
        .ok_or(Error::Timeout {
            operation: "clock switch",
        })
}
