use crate::interface::DebugInterface;
use crate::probe::Gpio;
use crate::registers::{fctl, Register};
use crate::retry::Polled;
use crate::Error;

use super::dma::{descriptor_table, DESCRIPTOR_TABLE_ADDRESS};
use super::image::{FirmwareImage, ImageCursor};
use super::plan::{BufferSlot, ProgrammingPlan, BLOCK_SIZE};
use super::{FlashError, FlashProgress};

/// What happened while programming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramReport {
    pub blocks: u16,
    /// Every block waited for the flash controller to finish before the
    /// next write was started. A wait that runs out is an error instead, so
    /// a finished run always sets this.
    pub full_speed: bool,
    /// Blocks after the first whose burst ended with the flash controller
    /// already idle.
    pub idle_blocks: u16,
}

/// Streams an image into flash through the double buffered DMA setup.
///
/// The chip must be in debug mode with DMA enabled, and the flash erased.
pub struct Flasher<'a, G: Gpio> {
    interface: &'a mut DebugInterface<G>,
    progress: &'a FlashProgress,
}

impl<'a, G: Gpio> Flasher<'a, G> {
    pub fn new(interface: &'a mut DebugInterface<G>, progress: &'a FlashProgress) -> Self {
        Self {
            interface,
            progress,
        }
    }

    /// Program `image`, starting at flash offset 0.
    #[tracing::instrument(skip_all, fields(len = image.len()))]
    pub fn program(&mut self, image: &FirmwareImage) -> Result<ProgramReport, Error> {
        let plan = ProgrammingPlan::new(image.len());
        self.progress.started_programming(plan.blocks());

        let result = self.program_blocks(image, &plan);

        match &result {
            Ok(report) => self.progress.finished_programming(report.full_speed),
            Err(_) => self.progress.failed_programming(),
        }

        result
    }

    fn program_blocks(
        &mut self,
        image: &FirmwareImage,
        plan: &ProgrammingPlan,
    ) -> Result<ProgramReport, Error> {
        self.set_up_dma()?;

        let mut cursor = image.cursor();
        let mut idle_blocks = 0;

        for (index, slot) in plan.slots() {
            let polled = self
                .program_block(&mut cursor, slot)
                .map_err(|source| program_error(index, source))?;

            if index > 0 && polled.immediate() {
                tracing::debug!(
                    "Flash controller was already idle after block {}",
                    index
                );
                idle_blocks += 1;
            }

            self.progress.block_programmed(index, BLOCK_SIZE);
        }

        if let Some(last) = plan.blocks().checked_sub(1) {
            self.wait_flash_idle()
                .map_err(|source| program_error(last, source))?;
        }

        let report = ProgramReport {
            blocks: plan.blocks(),
            full_speed: true,
            idle_blocks,
        };

        tracing::info!("Programmed {} blocks at maximum speed", report.blocks);

        Ok(report)
    }

    /// Install the descriptor table, point DMA channels 1 to 4 at it and
    /// start at flash offset 0.
    fn set_up_dma(&mut self) -> Result<(), Error> {
        let [table_high, table_low] = DESCRIPTOR_TABLE_ADDRESS.to_be_bytes();

        self.interface
            .write_xdata_block(DESCRIPTOR_TABLE_ADDRESS, &descriptor_table())?;
        self.interface.write_register(Register::Dma1CfgH, table_high)?;
        self.interface.write_register(Register::Dma1CfgL, table_low)?;

        self.interface.write_register(Register::FaddrH, 0)?;
        self.interface.write_register(Register::FaddrL, 0)
    }

    /// Stream the next block into `slot`, wait for the previous flash write
    /// to finish and start writing `slot` to flash.
    fn program_block(
        &mut self,
        cursor: &mut ImageCursor<'_>,
        slot: BufferSlot,
    ) -> Result<Polled, Error> {
        self.interface
            .write_register(Register::DmaArm, slot.debug_channel())?;

        // The status byte answering the burst carries nothing of interest.
        let _status = self
            .interface
            .burst_write(cursor.take_block(usize::from(BLOCK_SIZE)))?;

        let polled = self.wait_flash_idle()?;

        self.interface
            .write_register(Register::DmaArm, slot.flash_channel())?;
        self.interface.write_register(Register::Fctl, fctl::WRITE)?;

        Ok(polled)
    }

    fn wait_flash_idle(&mut self) -> Result<Polled, Error> {
        let interface = &mut *self.interface;

        interface
            .budget()
            .poll(|_| Ok::<_, Error>(interface.read_register(Register::Fctl)? & fctl::BUSY == 0))?
            .ok_or(Error::Timeout {
                operation: "flash controller",
            })
    }
}

fn program_error(block: u16, source: Error) -> Error {
    FlashError::Program {
        block,
        source: Box::new(source),
    }
    .into()
}
