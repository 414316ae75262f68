//! The sequence section: a header declaring the sequence count and the
//! per-channel compression mode, followed by the triples that drive the
//! literals-copy + match-copy execution loop.
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#sequences-section>

pub const LONG_NUMBER_OF_SEQUENCES: u32 = 0x7F00;

/// A single `(literalsLength, matchLength, offset)` triple. `of` is the
/// already-resolved offset value (not the wire offset *code*); see
/// `repeated_offsets` for the resolution logic that produces it.
#[derive(Clone, Copy, Debug)]
pub struct Sequence {
    pub ll: u32,
    pub ml: u32,
    pub of: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeType {
    Predefined,
    Rle,
    FseCompressed,
    Repeat,
}

/// The mode byte: three 2-bit fields for literals-length, offset and
/// match-length, in that bit order (high to low).
#[derive(Clone, Copy, Debug)]
pub struct CompressionModes(u8);

impl CompressionModes {
    pub fn new(ll: ModeType, of: ModeType, ml: ModeType) -> Self {
        let bits = |m: ModeType| -> u8 {
            match m {
                ModeType::Predefined => 0,
                ModeType::Rle => 1,
                ModeType::FseCompressed => 2,
                ModeType::Repeat => 3,
            }
        };
        Self((bits(ll) << 6) | (bits(of) << 4) | (bits(ml) << 2))
    }

    fn decode_mode(bits: u8) -> ModeType {
        match bits {
            0 => ModeType::Predefined,
            1 => ModeType::Rle,
            2 => ModeType::FseCompressed,
            _ => ModeType::Repeat,
        }
    }

    pub fn ll_mode(self) -> ModeType {
        Self::decode_mode(self.0 >> 6)
    }

    pub fn of_mode(self) -> ModeType {
        Self::decode_mode((self.0 >> 4) & 0x3)
    }

    pub fn ml_mode(self) -> ModeType {
        Self::decode_mode((self.0 >> 2) & 0x3)
    }

    pub fn byte(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequencesHeader {
    pub num_sequences: u32,
    pub modes: CompressionModes,
    pub header_size: u8,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SequencesHeaderError {
    #[error("need at least {need} bytes to parse the sequences header, got {got}")]
    NotEnoughBytes { need: u8, got: usize },
}

impl SequencesHeader {
    /// Parse the sequence-count prefix and mode byte.
    pub fn decode(source: &[u8]) -> Result<Self, SequencesHeaderError> {
        let &first = source
            .first()
            .ok_or(SequencesHeaderError::NotEnoughBytes { need: 1, got: 0 })?;

        if first == 0 {
            return Ok(Self {
                num_sequences: 0,
                modes: CompressionModes(0),
                header_size: 1,
            });
        }

        let (num_sequences, count_bytes) = match first {
            1..=127 => (u32::from(first), 1),
            128..=254 => {
                let &b1 = source
                    .get(1)
                    .ok_or(SequencesHeaderError::NotEnoughBytes { need: 2, got: source.len() })?;
                (((u32::from(first) - 128) << 8) + u32::from(b1), 2)
            }
            255 => {
                let b = source
                    .get(1..3)
                    .ok_or(SequencesHeaderError::NotEnoughBytes { need: 3, got: source.len() })?;
                (u32::from(b[0]) + (u32::from(b[1]) << 8) + LONG_NUMBER_OF_SEQUENCES, 3)
            }
        };

        let &mode_byte = source
            .get(count_bytes)
            .ok_or(SequencesHeaderError::NotEnoughBytes {
                need: count_bytes as u8 + 1,
                got: source.len(),
            })?;

        Ok(Self {
            num_sequences,
            modes: CompressionModes(mode_byte),
            header_size: count_bytes as u8 + 1,
        })
    }

    /// Encode the sequence count plus mode byte.
    pub fn encode(num_sequences: u32, modes: CompressionModes) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        if num_sequences == 0 {
            out.push(0);
            // No mode byte follows a zero count.
            return out;
        } else if num_sequences < 128 {
            out.push(num_sequences as u8);
        } else if num_sequences < 128 + 128 * 256 {
            let v = num_sequences - 128;
            out.push(128 + (v >> 8) as u8);
            out.push(v as u8);
        } else {
            let v = num_sequences - LONG_NUMBER_OF_SEQUENCES;
            out.push(255);
            out.push(v as u8);
            out.push((v >> 8) as u8);
        }
        out.push(modes.byte());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_count() {
        let modes = CompressionModes::new(ModeType::Predefined, ModeType::Rle, ModeType::FseCompressed);
        let bytes = SequencesHeader::encode(42, modes);
        let header = SequencesHeader::decode(&bytes).unwrap();
        assert_eq!(header.num_sequences, 42);
        assert_eq!(header.modes.ll_mode(), ModeType::Predefined);
        assert_eq!(header.modes.of_mode(), ModeType::Rle);
        assert_eq!(header.modes.ml_mode(), ModeType::FseCompressed);
    }

    #[test]
    fn round_trips_medium_count() {
        let modes = CompressionModes::new(ModeType::Repeat, ModeType::Repeat, ModeType::Repeat);
        let bytes = SequencesHeader::encode(4000, modes);
        let header = SequencesHeader::decode(&bytes).unwrap();
        assert_eq!(header.num_sequences, 4000);
    }

    #[test]
    fn round_trips_long_count() {
        let modes = CompressionModes::new(ModeType::FseCompressed, ModeType::FseCompressed, ModeType::FseCompressed);
        let bytes = SequencesHeader::encode(100_000, modes);
        let header = SequencesHeader::decode(&bytes).unwrap();
        assert_eq!(header.num_sequences, 100_000);
    }
}
