use std::time::Duration;

use crate::command;
use crate::interface::DebugInterface;
use crate::probe::Gpio;
use crate::registers::status;
use crate::Error;

/// Erase the whole flash and wait until the chip reports it is done.
#[tracing::instrument(skip(interface))]
pub fn erase_chip<G: Gpio>(
    interface: &mut DebugInterface<G>,
    poll_interval: Duration,
) -> Result<(), Error> {
    interface.execute(&command::ERASE, &[])?;

    let budget = interface.budget();
    let polled = budget.poll_with(
        || Ok::<_, Error>(interface.read_status()? & status::CHIP_ERASE_BUSY == 0),
        || {
            std::thread::sleep(poll_interval);
            Ok(())
        },
    )?;

    match polled {
        Some(polled) => {
            tracing::debug!("Chip erase finished after {} status polls", polled.retries + 1);
            Ok(())
        }
        None => Err(Error::Timeout {
            operation: "chip erase",
        }),
    }
}
