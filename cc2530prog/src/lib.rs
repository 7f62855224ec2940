//! # cc2530prog
//!
//! A flash programmer for the Texas Instruments CC2530 that drives the
//! chip's two wire debug port through three plain GPIO lines.
//!
//! The crate is layered bottom up:
//!
//! * [`probe`]: the [`Gpio`](probe::Gpio) capability and the bit level
//!   transport on top of it,
//! * [`interface`]: debug commands and XDATA access through injected
//!   instructions,
//! * [`Session`]: entering and leaving debug mode,
//! * [`chip`] and [`flashing`]: identification, erase, programming and
//!   verification.
//!
//! # Example
//!
//! ```no_run
//! use cc2530prog::probe::SysfsGpio;
//! use cc2530prog::{chip, Config, Session};
//!
//! let mut session = Session::open(SysfsGpio::new(), &Config::default())?;
//! session.enter()?;
//!
//! let info = chip::identify(session.interface()?)?;
//! println!("{info}, flash: {:?}", info.flash_size());
//!
//! session.close()?;
//! # Ok::<(), cc2530prog::Error>(())
//! ```

pub mod chip;
pub mod command;
mod config;
mod error;
pub mod flashing;
pub mod interface;
mod memory;
pub mod probe;
pub mod registers;
pub mod retry;
mod session;

pub use crate::chip::{ChipInfo, FlashSize};
pub use crate::config::{Config, GpioBackend};
pub use crate::error::{Error, IdMismatch};
pub use crate::interface::DebugInterface;
pub use crate::memory::instruction;
pub use crate::session::{Phase, Session};
