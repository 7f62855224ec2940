pub mod common_options;
pub mod logging;
pub mod progress;

use std::num::ParseIntError;

pub fn parse_u8(input: &str) -> Result<u8, ParseIntError> {
    parse_int::parse(input)
}

pub fn parse_u32(input: &str) -> Result<u32, ParseIntError> {
    parse_int::parse(input)
}

/// Bytes as space separated hex, the way responses are printed.
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_take_any_radix() {
        assert_eq!(parse_u8("0x22"), Ok(0x22));
        assert_eq!(parse_u8("34"), Ok(34));
        assert_eq!(parse_u8("0b101"), Ok(5));
        assert!(parse_u8("0x100").is_err());
    }

    #[test]
    fn responses_print_as_hex() {
        assert_eq!(hex_bytes(&[0xA5, 0x04]), "a5 04");
        assert_eq!(hex_bytes(&[]), "");
    }
}
