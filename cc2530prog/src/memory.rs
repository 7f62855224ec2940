//! XDATA access through injected instructions.
//!
//! The debug port has no memory access commands of its own. Everything here
//! is built from single 8051 instructions executed with `debug_inst`, using
//! `DPTR` as the address register and the accumulator as the data register.

use crate::interface::DebugInterface;
use crate::probe::Gpio;
use crate::registers::{self, Register};
use crate::Error;

/// The few 8051 instructions the programmer injects.
pub mod instruction {
    /// `MOV DPTR, #address`
    pub fn mov_dptr(address: u16) -> [u8; 3] {
        let [high, low] = address.to_be_bytes();
        [0x90, high, low]
    }

    /// `MOV A, #value`
    pub fn mov_a(value: u8) -> [u8; 2] {
        [0x74, value]
    }

    /// `MOVX @DPTR, A`
    pub const MOVX_STORE: [u8; 1] = [0xF0];

    /// `MOVX A, @DPTR`
    pub const MOVX_LOAD: [u8; 1] = [0xE0];

    /// `INC DPTR`
    pub const INC_DPTR: [u8; 1] = [0xA3];
}

impl<G: Gpio> DebugInterface<G> {
    /// Point `DPTR` at `address`.
    pub fn load_dptr(&mut self, address: u16) -> Result<(), Error> {
        self.debug_instruction(&instruction::mov_dptr(address))
            .map(drop)
            .map_err(|e| e.at_address(address))
    }

    /// Read the byte `DPTR` points at.
    pub fn load_at_dptr(&mut self) -> Result<u8, Error> {
        self.debug_instruction(&instruction::MOVX_LOAD)
    }

    pub fn increment_dptr(&mut self) -> Result<(), Error> {
        self.debug_instruction(&instruction::INC_DPTR).map(drop)
    }

    pub fn write_xdata(&mut self, address: u16, value: u8) -> Result<(), Error> {
        tracing::trace!("{} <- {:#04x}", registers::describe(address), value);

        self.load_dptr(address)?;
        self.debug_instruction(&instruction::mov_a(value))
            .and_then(|_| self.debug_instruction(&instruction::MOVX_STORE))
            .map(drop)
            .map_err(|e| e.at_address(address))
    }

    pub fn read_xdata(&mut self, address: u16) -> Result<u8, Error> {
        self.load_dptr(address)?;
        let value = self.load_at_dptr().map_err(|e| e.at_address(address))?;

        tracing::trace!("{} -> {:#04x}", registers::describe(address), value);
        Ok(value)
    }

    /// Write `data` to consecutive addresses starting at `address`.
    pub fn write_xdata_block(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        self.load_dptr(address)?;

        for (offset, &value) in data.iter().enumerate() {
            let current = address.wrapping_add(offset as u16);
            self.debug_instruction(&instruction::mov_a(value))
                .and_then(|_| self.debug_instruction(&instruction::MOVX_STORE))
                .and_then(|_| self.increment_dptr())
                .map_err(|e| e.at_address(current))?;
        }

        Ok(())
    }

    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error> {
        self.write_xdata(register.address(), value)
    }

    pub fn read_register(&mut self, register: Register) -> Result<u8, Error> {
        self.read_xdata(register.address())
    }
}

#[cfg(test)]
mod tests {
    use super::instruction::*;

    #[test]
    fn dptr_is_loaded_high_byte_first() {
        assert_eq!(mov_dptr(0x6270), [0x90, 0x62, 0x70]);
        assert_eq!(mov_a(0x22), [0x74, 0x22]);
    }
}
