//! The debug port command set.

use crate::Error;

/// How many parameter bytes a command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameters {
    /// Always exactly this many bytes.
    Fixed(usize),
    /// The caller picks the count; it is packed into the command header.
    Variable(LengthEncoding),
}

/// How a variable parameter count is packed into the command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthEncoding {
    /// The count is or-ed into the low nibble of the opcode.
    Opcode,
    /// The high bits of the count are or-ed into the opcode, the low eight
    /// bits follow as a second header byte.
    OpcodeAndByte,
}

/// Static description of one debug command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub opcode: u8,
    pub parameters: Parameters,
    pub response_len: usize,
}

pub const ERASE: CommandSpec = CommandSpec::fixed("erase", 0x10, 0, 1);
pub const WRITE_CONFIG: CommandSpec = CommandSpec::fixed("write_config", 0x18, 1, 1);
pub const READ_CONFIG: CommandSpec = CommandSpec::fixed("read_config", 0x20, 0, 1);
pub const GET_PC: CommandSpec = CommandSpec::fixed("get_pc", 0x28, 0, 2);
pub const READ_STATUS: CommandSpec = CommandSpec::fixed("read_status", 0x30, 0, 1);
pub const SET_BREAK: CommandSpec = CommandSpec::fixed("set_break", 0x38, 3, 1);
pub const HALT: CommandSpec = CommandSpec::fixed("halt", 0x40, 0, 1);
pub const RESUME: CommandSpec = CommandSpec::fixed("resume", 0x48, 0, 1);
pub const DEBUG_INSTRUCTION: CommandSpec = CommandSpec {
    name: "debug_inst",
    opcode: 0x50,
    parameters: Parameters::Variable(LengthEncoding::Opcode),
    response_len: 1,
};
pub const STEP_INSTRUCTION: CommandSpec = CommandSpec::fixed("step_inst", 0x58, 0, 1);
pub const GET_BANK_MASK: CommandSpec = CommandSpec::fixed("get_bm", 0x60, 0, 1);
pub const GET_CHIP_ID: CommandSpec = CommandSpec::fixed("get_chip_id", 0x68, 0, 2);
pub const BURST_WRITE: CommandSpec = CommandSpec {
    name: "burst_write",
    opcode: 0x80,
    parameters: Parameters::Variable(LengthEncoding::OpcodeAndByte),
    response_len: 1,
};

/// Every command, in lookup order.
pub static COMMANDS: [CommandSpec; 13] = [
    ERASE,
    WRITE_CONFIG,
    READ_CONFIG,
    GET_PC,
    READ_STATUS,
    SET_BREAK,
    HALT,
    RESUME,
    DEBUG_INSTRUCTION,
    STEP_INSTRUCTION,
    GET_BANK_MASK,
    GET_CHIP_ID,
    BURST_WRITE,
];

/// Largest instruction that fits the opcode nibble.
pub const MAX_INSTRUCTION_LEN: usize = 0x0F;
/// Largest burst the three opcode bits plus the length byte can describe.
pub const MAX_BURST_LEN: usize = 0x7FF;

impl CommandSpec {
    const fn fixed(name: &'static str, opcode: u8, inputs: usize, response_len: usize) -> Self {
        Self {
            name,
            opcode,
            parameters: Parameters::Fixed(inputs),
            response_len,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.parameters, Parameters::Variable(_))
    }

    /// The bytes sent ahead of `param_len` parameter bytes.
    pub fn header(&self, param_len: usize) -> Result<Vec<u8>, Error> {
        let invalid = |expected: usize| Error::InvalidParameterCount {
            command: self.name,
            expected,
            actual: param_len,
        };

        match self.parameters {
            Parameters::Fixed(expected) if expected == param_len => Ok(vec![self.opcode]),
            Parameters::Fixed(expected) => Err(invalid(expected)),
            Parameters::Variable(LengthEncoding::Opcode) => {
                if param_len > MAX_INSTRUCTION_LEN {
                    return Err(invalid(MAX_INSTRUCTION_LEN));
                }
                Ok(vec![self.opcode | param_len as u8])
            }
            Parameters::Variable(LengthEncoding::OpcodeAndByte) => {
                if param_len > MAX_BURST_LEN {
                    return Err(invalid(MAX_BURST_LEN));
                }
                let [high, low] = (param_len as u16).to_be_bytes();
                Ok(vec![self.opcode | high, low])
            }
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Look up a command by name.
///
/// `name` may be abbreviated: the first command in table order whose name
/// starts with `name` is returned. An empty name matches nothing.
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    if name.is_empty() {
        return None;
    }

    COMMANDS.iter().find(|command| command.name.starts_with(name))
}

/// Look up the command a received header byte belongs to.
pub fn find_opcode(header: u8) -> Option<&'static CommandSpec> {
    if header & BURST_WRITE.opcode != 0 {
        return Some(&COMMANDS[12]);
    }

    COMMANDS.iter().find(|command| match command.parameters {
        Parameters::Fixed(_) => command.opcode == header,
        Parameters::Variable(_) => command.opcode == header & 0xF8,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;

    use super::*;

    #[test]
    fn opcodes_are_unique() {
        let opcodes: HashSet<_> = COMMANDS.iter().map(|c| c.opcode).collect();
        assert_eq!(opcodes.len(), COMMANDS.len());
    }

    #[test]
    fn only_debug_instruction_and_burst_write_are_variable() {
        let variable: Vec<_> = COMMANDS
            .iter()
            .filter(|c| c.is_variable())
            .map(|c| c.name)
            .collect();
        assert_eq!(variable, ["debug_inst", "burst_write"]);
    }

    #[test_case("erase", "erase")]
    #[test_case("get_chip_id", "get_chip_id")]
    #[test_case("read_status", "read_status")]
    #[test_case("read", "read_config"; "prefix picks first in table order")]
    #[test_case("get", "get_pc")]
    #[test_case("get_c", "get_chip_id")]
    #[test_case("d", "debug_inst")]
    fn lookup_by_name(query: &str, expected: &str) {
        assert_eq!(find_command(query).map(|c| c.name), Some(expected));
    }

    #[test_case(""; "empty")]
    #[test_case("erase_all"; "longer than any name")]
    #[test_case("reset"; "no such command")]
    fn lookup_misses(query: &str) {
        assert_eq!(find_command(query), None);
    }

    #[test]
    fn debug_instruction_packs_length_into_opcode() {
        for n in 0..=15 {
            assert_eq!(DEBUG_INSTRUCTION.header(n).unwrap(), vec![0x50 | n as u8]);
        }
        assert!(DEBUG_INSTRUCTION.header(16).is_err());
    }

    #[test]
    fn burst_write_splits_length_over_two_bytes() {
        assert_eq!(BURST_WRITE.header(1024).unwrap(), vec![0x84, 0x00]);
        assert_eq!(BURST_WRITE.header(0x123).unwrap(), vec![0x81, 0x23]);
        assert!(BURST_WRITE.header(MAX_BURST_LEN + 1).is_err());
    }

    #[test]
    fn fixed_commands_check_parameter_count() {
        assert_eq!(WRITE_CONFIG.header(1).unwrap(), vec![0x18]);
        assert!(matches!(
            WRITE_CONFIG.header(2),
            Err(Error::InvalidParameterCount {
                command: "write_config",
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn headers_map_back_to_their_command() {
        assert_eq!(find_opcode(0x53), Some(&DEBUG_INSTRUCTION));
        assert_eq!(find_opcode(0x84), Some(&BURST_WRITE));
        assert_eq!(find_opcode(0x68), Some(&GET_CHIP_ID));
        assert_eq!(find_opcode(0x00), None);
    }
}
