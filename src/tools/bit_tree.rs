//! Hierarchical hitmap tree compression.
//!
//! A 16-bit hitmap is split in half repeatedly (16 -> 8 -> 4 -> 2 -> 1); at
//! each split the two halves' "does this half contain a hit" booleans are
//! emitted with a variable-length bit-pair code, and only halves that do
//! contain a hit are recursed into. This is the same algorithm at every
//! level (root, quad, pair, leaf) — see `encode_range`/`decode_range`.

use crate::Error;

/// A source of bits a hitmap tree can be decoded from, one bit at a time.
pub trait BitSource {
    fn take_bits(&mut self, n: u8) -> Result<u64, Error>;
    /// Look ahead at the next `n` bits without consuming them.
    fn peek_bits(&mut self, n: u8) -> Result<u64, Error>;
}

fn encode_bitpair(left: bool, right: bool) -> (u64, u8) {
    match (left, right) {
        (false, true) => (0b0, 1),
        (true, false) => (0b10, 2),
        (true, true) => (0b11, 2),
        (false, false) => {
            debug_assert!(false, "bit-pair alphabet has no code for (0,0)");
            (0b0, 1)
        }
    }
}

/// Peek the leading bit to see which code is present, then take only the
/// bits that code actually uses: 1 bit for `(0,1)`, 2 bits otherwise. The
/// second `peek(2)` only runs once the leading bit is known to be `1`, at
/// which point the alphabet guarantees a second bit was written alongside
/// it — so this never looks past the end of a well-formed encoding.
fn read_bitpair(source: &mut impl BitSource) -> Result<(bool, bool), Error> {
    if source.peek_bits(1)? == 0 {
        source.take_bits(1)?;
        Ok((false, true))
    } else {
        let window = source.peek_bits(2)?;
        source.take_bits(2)?;
        Ok((true, window & 1 == 1))
    }
}

fn has_hit(hits: u16, lo: u8, hi: u8) -> bool {
    let width = hi - lo;
    let mask: u16 = if width >= 16 {
        u16::MAX
    } else {
        ((1u16 << width) - 1) << lo
    };
    hits & mask != 0
}

/// Called only on ranges already known to contain at least one hit: the
/// top-level caller guarantees this for `[0,16)` (empty qcores are never
/// serialized), and every recursive call only descends into a half whose
/// `has_hit` already returned true.
fn encode_range(hits: u16, lo: u8, hi: u8, out: &mut Vec<(u64, u8)>) {
    let mid = lo + (hi - lo) / 2;
    let left = has_hit(hits, lo, mid);
    let right = has_hit(hits, mid, hi);
    out.push(encode_bitpair(left, right));
    if mid - lo > 1 && left {
        encode_range(hits, lo, mid, out);
    }
    if hi - mid > 1 && right {
        encode_range(hits, mid, hi, out);
    }
}

/// Encode a 16-bit hitmap as `(bits, length_in_bits)`, left-justified
/// within `length_in_bits` (i.e. `bits` has no leading padding).
pub fn encode_hitmap_tree(hits: u16) -> (u64, u8) {
    let mut codes = Vec::new();
    encode_range(hits, 0, 16, &mut codes);
    let mut value = 0u64;
    let mut len = 0u8;
    for (code, width) in codes {
        value = (value << width) | code;
        len += width;
    }
    (value, len)
}

fn decode_range(
    source: &mut impl BitSource,
    lo: u8,
    hi: u8,
    hits: &mut u16,
) -> Result<(), Error> {
    let mid = lo + (hi - lo) / 2;
    let (left, right) = read_bitpair(source)?;
    if mid - lo == 1 {
        if left {
            *hits |= 1 << lo;
        }
    } else if left {
        decode_range(source, lo, mid, hits)?;
    }
    if hi - mid == 1 {
        if right {
            *hits |= 1 << mid;
        }
    } else if right {
        decode_range(source, mid, hi, hits)?;
    }
    Ok(())
}

/// Decode a hierarchical hitmap tree back into its 16-bit mask.
pub fn decode_hitmap_tree(source: &mut impl BitSource) -> Result<u16, Error> {
    let mut hits = 0u16;
    decode_range(source, 0, 16, &mut hits)?;
    Ok(hits)
}
