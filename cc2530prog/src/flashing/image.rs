/// Value of erased flash, sent for the bytes padding the last block.
pub const ERASED: u8 = 0xFF;

/// A firmware image, read completely into memory before programming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Read an image from a raw binary file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        std::fs::read(path).map(Self::new)
    }

    /// Length in bytes, saturating at `u32::MAX`, which no flash can hold.
    pub fn len(&self) -> u32 {
        saturating_len(self.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A sequential reader starting at offset 0.
    pub fn cursor(&self) -> ImageCursor<'_> {
        ImageCursor {
            data: &self.data,
            position: 0,
        }
    }
}

/// Hands out image bytes in order, and [`ERASED`] once the image is used up.
#[derive(Debug, Clone)]
pub struct ImageCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ImageCursor<'a> {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn next_byte(&mut self) -> u8 {
        let byte = self.data.get(self.position).copied().unwrap_or(ERASED);
        self.position += 1;
        byte
    }

    /// The next `len` bytes, padded with [`ERASED`].
    pub fn take_block(&mut self, len: usize) -> Block<'_, 'a> {
        Block {
            cursor: self,
            remaining: len,
        }
    }

    /// Start over at offset 0.
    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

/// A fixed number of bytes taken from an [`ImageCursor`].
#[derive(Debug)]
pub struct Block<'c, 'a> {
    cursor: &'c mut ImageCursor<'a>,
    remaining: usize,
}

impl Iterator for Block<'_, '_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.remaining = self.remaining.checked_sub(1)?;
        Some(self.cursor.next_byte())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Block<'_, '_> {}

fn saturating_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_past_the_end_are_erased_flash() {
        let image = FirmwareImage::new(vec![1, 2, 3]);
        let mut cursor = image.cursor();

        let block: Vec<_> = cursor.take_block(5).collect();
        assert_eq!(block, [1, 2, 3, 0xFF, 0xFF]);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn blocks_know_their_length() {
        let image = FirmwareImage::new(vec![1]);
        let mut cursor = image.cursor();
        let mut block = cursor.take_block(3);

        assert_eq!(block.len(), 3);
        block.next();
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn oversized_lengths_do_not_wrap() {
        assert_eq!(saturating_len(1024), 1024);
        assert_eq!(saturating_len(usize::MAX), u32::MAX);
    }

    #[test]
    fn rewinding_starts_over() {
        let image = FirmwareImage::new(vec![7, 8]);
        let mut cursor = image.cursor();
        cursor.next_byte();
        cursor.next_byte();
        cursor.rewind();

        assert_eq!(cursor.next_byte(), 7);
    }
}
