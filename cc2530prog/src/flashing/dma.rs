//! The DMA setup used to move firmware from the debug port into flash.
//!
//! Four channels are configured. Channels 1 and 2 copy bytes arriving in
//! `DBGDATA` during a burst write into one of two RAM buffers; channels 3
//! and 4 feed those buffers to the flash controller. While one buffer is
//! written to flash, the next block is streamed into the other one.

use static_assertions::const_assert;

use crate::command::MAX_BURST_LEN;
use crate::registers::Register;

use super::plan::BLOCK_SIZE;

/// RAM buffer filled by even blocks.
pub const BUFFER_0: u16 = 0x0000;
/// RAM buffer filled by odd blocks.
pub const BUFFER_1: u16 = 0x0400;
/// Where the descriptor table is installed.
pub const DESCRIPTOR_TABLE_ADDRESS: u16 = 0x0800;

const_assert!(BUFFER_1 - BUFFER_0 >= BLOCK_SIZE);
const_assert!(DESCRIPTOR_TABLE_ADDRESS - BUFFER_1 >= BLOCK_SIZE);
const_assert!(BLOCK_SIZE as usize <= MAX_BURST_LEN);

/// Trigger sources.
pub mod trigger {
    /// A byte was written to `DBGDATA` by a burst write.
    pub const DEBUG_BURST: u8 = 31;
    /// The flash controller is ready for the next word.
    pub const FLASH: u8 = 18;
}

/// The last descriptor byte: addressing modes, interrupt and priority.
pub mod mode {
    /// Fixed source, incrementing destination, normal priority.
    pub const INCREMENT_DESTINATION: u8 = 0x11;
    /// Incrementing source, fixed destination, high priority.
    pub const INCREMENT_SOURCE: u8 = 0x42;

    pub const SOURCE_INCREMENTS: u8 = 0xC0;
    pub const DESTINATION_INCREMENTS: u8 = 0x30;
}

/// Bits written to `DMAARM` to arm a channel.
pub mod arm {
    pub const DEBUG_TO_BUFFER_0: u8 = 0x02;
    pub const DEBUG_TO_BUFFER_1: u8 = 0x04;
    pub const BUFFER_0_TO_FLASH: u8 = 0x08;
    pub const BUFFER_1_TO_FLASH: u8 = 0x10;
}

/// One DMA channel configuration, as the target's DMA engine reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaDescriptor {
    pub source: u16,
    pub destination: u16,
    pub length: u16,
    pub trigger: u8,
    pub mode: u8,
}

impl DmaDescriptor {
    pub const SIZE: usize = 8;

    const fn from_debug(buffer: u16) -> Self {
        Self {
            source: Register::DbgData.address(),
            destination: buffer,
            length: BLOCK_SIZE,
            trigger: trigger::DEBUG_BURST,
            mode: mode::INCREMENT_DESTINATION,
        }
    }

    const fn to_flash(buffer: u16) -> Self {
        Self {
            source: buffer,
            destination: Register::FwData.address(),
            length: BLOCK_SIZE,
            trigger: trigger::FLASH,
            mode: mode::INCREMENT_SOURCE,
        }
    }

    /// Addresses and length are stored big endian.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let [source_high, source_low] = self.source.to_be_bytes();
        let [destination_high, destination_low] = self.destination.to_be_bytes();
        let [length_high, length_low] = self.length.to_be_bytes();

        [
            source_high,
            source_low,
            destination_high,
            destination_low,
            length_high,
            length_low,
            self.trigger,
            self.mode,
        ]
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            source: u16::from_be_bytes([bytes[0], bytes[1]]),
            destination: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            trigger: bytes[6],
            mode: bytes[7],
        }
    }
}

/// Channels 1 to 4, in table order.
pub const CHANNELS: [DmaDescriptor; 4] = [
    DmaDescriptor::from_debug(BUFFER_0),
    DmaDescriptor::from_debug(BUFFER_1),
    DmaDescriptor::to_flash(BUFFER_0),
    DmaDescriptor::to_flash(BUFFER_1),
];

/// The descriptor table as it is written to the target.
pub fn descriptor_table() -> [u8; CHANNELS.len() * DmaDescriptor::SIZE] {
    let mut table = [0; CHANNELS.len() * DmaDescriptor::SIZE];

    for (chunk, descriptor) in table.chunks_exact_mut(DmaDescriptor::SIZE).zip(CHANNELS) {
        chunk.copy_from_slice(&descriptor.to_bytes());
    }

    table
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn table_layout() {
        #[rustfmt::skip]
        let expected: [u8; 32] = [
            0x62, 0x60, 0x00, 0x00, 0x04, 0x00, 31, 0x11,
            0x62, 0x60, 0x04, 0x00, 0x04, 0x00, 31, 0x11,
            0x00, 0x00, 0x62, 0x73, 0x04, 0x00, 18, 0x42,
            0x04, 0x00, 0x62, 0x73, 0x04, 0x00, 18, 0x42,
        ];

        assert_eq!(descriptor_table(), expected);
    }

    #[test]
    fn descriptors_parse_back() {
        let table = descriptor_table();
        let parsed: Vec<_> = table
            .chunks_exact(DmaDescriptor::SIZE)
            .map(|chunk| DmaDescriptor::from_bytes(chunk.try_into().unwrap()))
            .collect();

        assert_eq!(parsed, CHANNELS);
    }
}
