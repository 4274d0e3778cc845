//! Bit-level stream cursor: extracts arbitrary-width fields from a 64-bit
//! word sequence, transparently straddling word boundaries.

use crate::tools::bit_tree::BitSource;
use crate::Error;

/// Reads fields out of a word sequence in order. `bit_index` counts
/// **payload** bits only (metadata bits are never addressable).
pub struct StreamReader<'a> {
    words: &'a [u64],
    payload_width: u8,
    meta_width: u8,
    bit_index: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(words: &'a [u64], chip_id: bool) -> Self {
        StreamReader {
            words,
            payload_width: if chip_id { 61 } else { 63 },
            meta_width: if chip_id { 3 } else { 1 },
            bit_index: 0,
        }
    }

    /// Validate that bits 62-61 agree across every word and return them.
    /// Only meaningful when the reader was constructed with `chip_id = true`.
    pub fn validate_chip_id(&self) -> Result<u8, Error> {
        let first = self.words.first().map(|w| ((w >> 61) & 0b11) as u8).unwrap_or(0);
        for word in self.words {
            let id = ((word >> 61) & 0b11) as u8;
            if id != first {
                return Err(Error::StreamMismatch {
                    expected: first,
                    found: id,
                });
            }
        }
        Ok(first)
    }

    /// Extract `n` bits starting at `bit_index`, straddling a word boundary
    /// if needed, without touching the cursor. Shared by [`Self::take`] and
    /// [`Self::peek`].
    fn extract(&self, n: u8, bit_index: usize) -> Result<u64, Error> {
        let word_index = bit_index / self.payload_width as usize;
        let bit_offset = (bit_index % self.payload_width as usize) as u8;

        if word_index >= self.words.len() {
            return Err(Error::TruncatedStream(n, word_index));
        }
        let space_left = self.payload_width - bit_offset;
        let on_last_word = word_index == self.words.len() - 1;
        if n > space_left && on_last_word {
            return Err(Error::TruncatedStream(n, word_index));
        }

        let meta_width = self.meta_width;
        let payload_width = self.payload_width;

        let first_word = (self.words[word_index] << meta_width) >> meta_width;
        let second_word = if on_last_word {
            0
        } else {
            self.words[word_index + 1] << meta_width
        };

        let first_word = if bit_offset == 0 {
            first_word
        } else {
            first_word << bit_offset
        };
        let second_word = if bit_offset == 0 {
            0
        } else {
            second_word >> (64 - bit_offset)
        };

        let full_word = first_word | second_word;
        Ok((full_word >> (payload_width - n)) & ((1u64 << n) - 1))
    }

    /// Take the next `n` bits (`n` in `[1, 32]`) and advance the cursor.
    pub fn take(&mut self, n: u8) -> Result<u64, Error> {
        let value = self.extract(n, self.bit_index)?;
        self.bit_index += n as usize;
        Ok(value)
    }

    /// Look ahead at the next `n` bits without advancing the cursor.
    pub fn peek(&self, n: u8) -> Result<u64, Error> {
        self.extract(n, self.bit_index)
    }
}

impl<'a> BitSource for StreamReader<'a> {
    fn take_bits(&mut self, n: u8) -> Result<u64, Error> {
        self.take(n)
    }

    fn peek_bits(&mut self, n: u8) -> Result<u64, Error> {
        self.peek(n)
    }
}
