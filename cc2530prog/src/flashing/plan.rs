use super::dma::{arm, BUFFER_0, BUFFER_1};

/// Bytes sent per burst write and written to flash per DMA transfer.
pub const BLOCK_SIZE: u16 = 1024;

/// Which of the two RAM buffers a block travels through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    Buffer0,
    Buffer1,
}

impl BufferSlot {
    /// Blocks alternate between the buffers, starting with buffer 0.
    pub fn for_block(index: u16) -> Self {
        if index % 2 == 0 {
            BufferSlot::Buffer0
        } else {
            BufferSlot::Buffer1
        }
    }

    pub fn address(self) -> u16 {
        match self {
            BufferSlot::Buffer0 => BUFFER_0,
            BufferSlot::Buffer1 => BUFFER_1,
        }
    }

    /// `DMAARM` bits of the channel filling this buffer from the debug port.
    pub fn debug_channel(self) -> u8 {
        match self {
            BufferSlot::Buffer0 => arm::DEBUG_TO_BUFFER_0,
            BufferSlot::Buffer1 => arm::DEBUG_TO_BUFFER_1,
        }
    }

    /// `DMAARM` bits of the channel draining this buffer into flash.
    pub fn flash_channel(self) -> u8 {
        match self {
            BufferSlot::Buffer0 => arm::BUFFER_0_TO_FLASH,
            BufferSlot::Buffer1 => arm::BUFFER_1_TO_FLASH,
        }
    }
}

/// How an image of a given size is cut into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammingPlan {
    image_len: u32,
    blocks: u16,
}

impl ProgrammingPlan {
    pub fn new(image_len: u32) -> Self {
        let blocks = image_len.div_ceil(u32::from(BLOCK_SIZE));

        Self {
            image_len,
            // The largest flash is 256 KiB, 256 blocks.
            blocks: blocks.min(u32::from(u16::MAX)) as u16,
        }
    }

    pub fn image_len(&self) -> u32 {
        self.image_len
    }

    pub fn blocks(&self) -> u16 {
        self.blocks
    }

    /// Bytes that end up programmed, including the padding of the last
    /// block.
    pub fn programmed_len(&self) -> u32 {
        u32::from(self.blocks) * u32::from(BLOCK_SIZE)
    }

    /// Every block with the buffer it goes through.
    pub fn slots(&self) -> impl Iterator<Item = (u16, BufferSlot)> {
        (0..self.blocks).map(|index| (index, BufferSlot::for_block(index)))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 0)]
    #[test_case(1, 1)]
    #[test_case(1023, 1)]
    #[test_case(1024, 1)]
    #[test_case(1025, 2)]
    #[test_case(2048, 2)]
    fn block_count(len: u32, blocks: u16) {
        assert_eq!(ProgrammingPlan::new(len).blocks(), blocks);
    }

    #[test]
    fn buffers_alternate() {
        let slots: Vec<_> = ProgrammingPlan::new(5 * 1024)
            .slots()
            .map(|(_, slot)| slot)
            .collect();

        let (even, odd) = (BufferSlot::Buffer0, BufferSlot::Buffer1);
        assert_eq!(slots, [even, odd, even, odd, even]);
    }

    #[test]
    fn channels_match_buffers() {
        assert_eq!(BufferSlot::for_block(0).debug_channel(), 0x02);
        assert_eq!(BufferSlot::for_block(0).flash_channel(), 0x08);
        assert_eq!(BufferSlot::for_block(1).debug_channel(), 0x04);
        assert_eq!(BufferSlot::for_block(1).flash_channel(), 0x10);
        assert_eq!(BufferSlot::for_block(2), BufferSlot::Buffer0);
    }
}
