//! Command exchange over the debug port.

use crate::command::{self, CommandSpec};
use crate::probe::{BitBang, Gpio, GpioError};
use crate::retry::RetryBudget;
use crate::Error;

/// Clocks sent while the target is not yet ready to answer.
const READY_PULSES: usize = 8;

/// Sends debug commands and collects their responses.
///
/// Each exchange drives the data line while the header and parameters go
/// out, then releases it, waits for the target to pull the line low and
/// clocks in the response.
#[derive(Debug)]
pub struct DebugInterface<G> {
    wire: BitBang<G>,
    budget: RetryBudget,
}

impl<G: Gpio> DebugInterface<G> {
    pub fn new(wire: BitBang<G>, budget: RetryBudget) -> Self {
        Self { wire, budget }
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn wire(&self) -> &BitBang<G> {
        &self.wire
    }

    pub fn wire_mut(&mut self) -> &mut BitBang<G> {
        &mut self.wire
    }

    pub fn into_wire(self) -> BitBang<G> {
        self.wire
    }

    /// Run `command` with `params` and return its response.
    ///
    /// The response always has exactly `command.response_len` bytes.
    pub fn execute(&mut self, command: &CommandSpec, params: &[u8]) -> Result<Vec<u8>, Error> {
        let header = command.header(params.len())?;
        tracing::trace!("{} {:02x?} {:02x?}", command, header, params);

        self.send(header.into_iter().chain(params.iter().copied()))?;
        self.respond(command.name, command.response_len)
    }

    /// Run the command called `name`, which may be abbreviated.
    pub fn execute_named(&mut self, name: &str, params: &[u8]) -> Result<Vec<u8>, Error> {
        let command =
            command::find_command(name).ok_or_else(|| Error::UnknownCommand(name.to_owned()))?;
        tracing::debug!("{:?} resolves to {}", name, command);

        self.execute(command, params)
    }

    /// Stream `data` to the `DBGDATA` register as a single burst.
    ///
    /// Returns the status byte the target answers with.
    pub fn burst_write(&mut self, data: impl ExactSizeIterator<Item = u8>) -> Result<u8, Error> {
        let header = command::BURST_WRITE.header(data.len())?;
        tracing::trace!("burst_write {:02x?}, {} bytes", header, data.len());

        self.send(header.into_iter().chain(data))?;
        let response = self.respond(command::BURST_WRITE.name, 1)?;
        Ok(response[0])
    }

    /// Inject a single CPU instruction and return the accumulator.
    pub fn debug_instruction(&mut self, instruction: &[u8]) -> Result<u8, Error> {
        let response = self.execute(&command::DEBUG_INSTRUCTION, instruction)?;
        Ok(response[0])
    }

    pub fn read_status(&mut self) -> Result<u8, Error> {
        let response = self.execute(&command::READ_STATUS, &[])?;
        Ok(response[0])
    }

    /// Write the debug configuration, returning the value echoed back.
    pub fn write_config(&mut self, value: u8) -> Result<u8, Error> {
        let response = self.execute(&command::WRITE_CONFIG, &[value])?;
        Ok(response[0])
    }

    /// Chip id and revision.
    pub fn chip_id(&mut self) -> Result<(u8, u8), Error> {
        let response = self.execute(&command::GET_CHIP_ID, &[])?;
        Ok((response[0], response[1]))
    }

    fn send(&mut self, bytes: impl IntoIterator<Item = u8>) -> Result<(), GpioError> {
        self.wire.drive_data()?;
        for byte in bytes {
            self.wire.send_byte(byte)?;
        }
        self.wire.release_data()
    }

    fn respond(&mut self, operation: &'static str, len: usize) -> Result<Vec<u8>, Error> {
        self.wait_ready(operation)?;

        let response = (0..len)
            .map(|_| self.wire.read_byte())
            .collect::<Result<Vec<_>, _>>()?;
        tracing::trace!("{} -> {:02x?}", operation, response);

        Ok(response)
    }

    /// The target holds the data line high until it has a response ready.
    fn wait_ready(&mut self, operation: &'static str) -> Result<(), Error> {
        let wire = &mut self.wire;
        let polled = self.budget.poll(|attempt| {
            if attempt > 0 {
                wire.pulse_clock(READY_PULSES)?;
            }
            Ok::<_, GpioError>(!wire.sample_data()?)
        })?;

        match polled {
            Some(polled) if !polled.immediate() => {
                tracing::trace!("{} ready after {} retries", operation, polled.retries);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(Error::Timeout { operation }),
        }
    }
}
