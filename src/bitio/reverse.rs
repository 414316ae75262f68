//! Backward-reading variable length bit input.
//!
//! Zstandard's FSE and Huffman bitstreams are written with the first symbol
//! at the *end* of the buffer and a sentinel `1` bit marking where the
//! stream starts, so decoding walks the buffer from the last byte to the
//! first. This reader keeps a 64 bit container that it refills from the
//! high end of the remaining buffer as bits are consumed.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GetBitsError {
    #[error("requested {requested} bits but the reader only serves up to 64 bits at a time")]
    TooManyBits { requested: usize },
}

pub struct BitReaderReversed<'s> {
    /// Number of bits not yet pulled into `container`, counted from the
    /// start of `source`.
    idx: isize,
    source: &'s [u8],
    container: u64,
    bits_in_container: u8,
}

impl<'s> BitReaderReversed<'s> {
    pub fn new(source: &'s [u8]) -> Self {
        Self {
            idx: source.len() as isize * 8,
            source,
            container: 0,
            bits_in_container: 0,
        }
    }

    /// Skip the zero padding and the final `1` sentinel bit, as used to
    /// byte-align an entropy stream's tail. Returns the number of padding
    /// bits skipped, which must be in `1..=8` for a well formed stream.
    pub fn init_from_end_mark(source: &'s [u8]) -> Result<(Self, u8), GetBitsError> {
        let mut reader = Self::new(source);
        let mut skipped = 0u8;
        loop {
            let bit = reader.get_bits(1)?;
            skipped += 1;
            if bit == 1 || skipped > 8 {
                break;
            }
        }
        Ok((reader, skipped))
    }

    /// Number of bits that can still be read before the stream underflows.
    /// Can go negative: a negative value means `|value|` zero bits were
    /// synthesized past the true end of the stream.
    pub fn bits_remaining(&self) -> isize {
        self.idx + self.bits_in_container as isize
    }

    fn byte_idx(&self) -> usize {
        (self.idx as usize - 1) / 8
    }

    fn refill(&mut self) {
        let want = 64 - self.bits_in_container as isize;
        let can_read = want.min(self.idx);

        match can_read {
            64 => {
                let bytes = &self.source[self.byte_idx() - 7..=self.byte_idx()];
                self.container = u64::from_le_bytes(bytes.try_into().unwrap());
                self.bits_in_container += 64;
                self.idx -= 64;
            }
            48..=63 => {
                let mut buf = [0u8; 8];
                buf[..6].copy_from_slice(&self.source[self.byte_idx() - 5..=self.byte_idx()]);
                self.container <<= 48;
                self.container |= u64::from_le_bytes(buf);
                self.bits_in_container += 48;
                self.idx -= 48;
            }
            32..=47 => {
                let bytes = &self.source[self.byte_idx() - 3..=self.byte_idx()];
                self.container <<= 32;
                self.container |= u32::from_le_bytes(bytes.try_into().unwrap()) as u64;
                self.bits_in_container += 32;
                self.idx -= 32;
            }
            16..=31 => {
                let bytes = &self.source[self.byte_idx() - 1..=self.byte_idx()];
                self.container <<= 16;
                self.container |= u16::from_le_bytes(bytes.try_into().unwrap()) as u64;
                self.bits_in_container += 16;
                self.idx -= 16;
            }
            8..=15 => {
                self.container <<= 8;
                self.container |= self.source[self.byte_idx()] as u64;
                self.bits_in_container += 8;
                self.idx -= 8;
            }
            1..=7 => {
                // Fewer than a byte remains; pull in the partial final byte
                // and shift it down so only the live bits occupy the low end.
                let byte = self.source[self.byte_idx()] as u64;
                self.container <<= can_read;
                self.container |= byte >> (8 - can_read);
                self.bits_in_container += can_read as u8;
                self.idx -= can_read;
            }
            _ => {}
        }
    }

    /// Read `n` (`0..=64`) bits, most significant bit of the request first.
    /// Reading past the start of the stream yields zero bits, which lets
    /// the sequence decode loop run one symbol past the true end safely.
    pub fn get_bits(&mut self, n: usize) -> Result<u64, GetBitsError> {
        if n == 0 {
            return Ok(0);
        }
        if n > 64 {
            return Err(GetBitsError::TooManyBits { requested: n });
        }
        let n = n as isize;

        if self.bits_remaining() <= 0 {
            self.idx -= n;
            return Ok(0);
        }

        if self.bits_remaining() < n {
            let available = self.bits_remaining() as usize;
            let shift = n - available as isize;
            let value = self.get_bits(available)?;
            self.idx -= shift;
            return Ok(value << shift);
        }

        if (self.bits_in_container as isize) < n {
            while self.bits_in_container <= 56 && (self.bits_in_container as isize) < n {
                self.refill();
            }
        }

        let value = self.container >> (self.bits_in_container as isize - n);
        self.bits_in_container -= n as u8;
        let mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        Ok(value & mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_last_byte_first() {
        // 0b1000_0000 0b0000_0001 -> reading backwards gives the last byte first
        let data = [0b0000_0001, 0b1000_0000];
        let mut r = BitReaderReversed::new(&data);
        assert_eq!(r.get_bits(1).unwrap(), 1);
        assert_eq!(r.get_bits(7).unwrap(), 0);
        assert_eq!(r.get_bits(8).unwrap(), 1);
    }

    #[test]
    fn underflow_yields_zero_bits() {
        let data = [0b1010_1010];
        let mut r = BitReaderReversed::new(&data);
        let _ = r.get_bits(8).unwrap();
        assert!(r.bits_remaining() <= 0);
        assert_eq!(r.get_bits(4).unwrap(), 0);
    }

    #[test]
    fn end_mark_skips_to_highest_set_bit() {
        // last byte 0b0001_0000: highest set bit is position 5 (1-indexed from LSB)
        let data = [0x12, 0b0001_0000];
        let (_, skipped) = BitReaderReversed::init_from_end_mark(&data).unwrap();
        assert_eq!(skipped, 4);
    }
}
