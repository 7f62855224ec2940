//! Flash programming.
//!
//! A download runs through these stages, each of which can also be used on
//! its own:
//!
//! 1. [`identify`](crate::chip::identify) the chip to learn its flash size,
//! 2. enable DMA while halted and switch to the crystal oscillator,
//! 3. [`erase_chip`],
//! 4. stream the image through the [`Flasher`],
//! 5. optionally [`verify_flash`].
//!
//! [`download`] runs all of them, reporting to a [`FlashProgress`].
//!
//! ```no_run
//! use cc2530prog::flashing::{download, DownloadOptions, FirmwareImage};
//! use cc2530prog::probe::SysfsGpio;
//! use cc2530prog::{Config, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = FirmwareImage::from_file("firmware.bin")?;
//! let mut session = Session::open(SysfsGpio::new(), &Config::default())?;
//!
//! let options = DownloadOptions {
//!     verify: true,
//!     ..DownloadOptions::default()
//! };
//! download(&mut session, &image, &options)?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod dma;
mod download;
mod erase;
mod error;
mod flasher;
mod image;
mod plan;
mod progress;
mod verify;

pub use dma::{
    descriptor_table, DmaDescriptor, BUFFER_0, BUFFER_1, CHANNELS, DESCRIPTOR_TABLE_ADDRESS,
};
pub use download::{download, DownloadOptions, DownloadReport};
pub use erase::erase_chip;
pub use error::{FlashError, Mismatch};
pub use flasher::{Flasher, ProgramReport};
pub use image::{Block, FirmwareImage, ImageCursor, ERASED};
pub use plan::{BufferSlot, ProgrammingPlan, BLOCK_SIZE};
pub use progress::{FlashProgress, ProgressEvent};
pub use verify::{verify_flash, VerifyReport, BANKS, BANK_SIZE, BANK_WINDOW};
