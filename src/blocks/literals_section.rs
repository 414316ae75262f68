//! The literals section header: sub-type dispatch and the size-format-
//! dependent field widths.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsSectionType {
    Raw,
    Rle,
    Compressed,
    Treeless,
}

#[derive(Debug, Clone, Copy)]
pub struct LiteralsSectionHeader {
    pub section_type: LiteralsSectionType,
    pub regenerated_size: u32,
    pub compressed_size: Option<u32>,
    pub num_streams: Option<u8>,
    pub header_size: u8,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LiteralsSectionError {
    #[error("source needs at least 1 byte to parse the literals section header")]
    Empty,
    #[error("need {need} bytes to parse the literals section header, got {have}")]
    NotEnoughBytes { have: usize, need: u8 },
}

impl LiteralsSectionHeader {
    /// Parse the header at the front of `source`. `source[0]`'s low two bits
    /// select the sub-type; the next two select the size format, which
    /// determines the header's total width.
    pub fn decode(source: &[u8]) -> Result<Self, LiteralsSectionError> {
        let &first = source.first().ok_or(LiteralsSectionError::Empty)?;
        let section_type = match first & 0x3 {
            0 => LiteralsSectionType::Raw,
            1 => LiteralsSectionType::Rle,
            2 => LiteralsSectionType::Compressed,
            _ => LiteralsSectionType::Treeless,
        };
        let size_format = (first >> 2) & 0x3;

        match section_type {
            LiteralsSectionType::Raw | LiteralsSectionType::Rle => {
                let header_size = match size_format {
                    0 | 2 => 1,
                    1 => 2,
                    _ => 3,
                };
                if source.len() < header_size as usize {
                    return Err(LiteralsSectionError::NotEnoughBytes {
                        have: source.len(),
                        need: header_size,
                    });
                }
                let regenerated_size = match size_format {
                    0 | 2 => u32::from(source[0]) >> 3,
                    1 => (u32::from(source[0]) >> 4) + (u32::from(source[1]) << 4),
                    _ => {
                        (u32::from(source[0]) >> 4)
                            + (u32::from(source[1]) << 4)
                            + (u32::from(source[2]) << 12)
                    }
                };
                Ok(Self {
                    section_type,
                    regenerated_size,
                    compressed_size: None,
                    num_streams: None,
                    header_size,
                })
            }
            LiteralsSectionType::Compressed | LiteralsSectionType::Treeless => {
                let header_size = match size_format {
                    0 | 1 => 3,
                    2 => 4,
                    _ => 5,
                };
                if source.len() < header_size as usize {
                    return Err(LiteralsSectionError::NotEnoughBytes {
                        have: source.len(),
                        need: header_size,
                    });
                }
                let num_streams = if size_format == 0 { 1 } else { 4 };

                let (regenerated_size, compressed_size) = match size_format {
                    0 | 1 => (
                        (u32::from(source[0]) >> 4) + ((u32::from(source[1]) & 0x3f) << 4),
                        u32::from(source[1] >> 6) + (u32::from(source[2]) << 2),
                    ),
                    2 => (
                        (u32::from(source[0]) >> 4)
                            + (u32::from(source[1]) << 4)
                            + ((u32::from(source[2]) & 0x3) << 12),
                        (u32::from(source[2]) >> 2) + (u32::from(source[3]) << 6),
                    ),
                    _ => (
                        (u32::from(source[0]) >> 4)
                            + (u32::from(source[1]) << 4)
                            + ((u32::from(source[2]) & 0x3F) << 12),
                        (u32::from(source[2]) >> 6)
                            + (u32::from(source[3]) << 2)
                            + (u32::from(source[4]) << 10),
                    ),
                };

                Ok(Self {
                    section_type,
                    regenerated_size,
                    compressed_size: Some(compressed_size),
                    num_streams: Some(num_streams),
                    header_size,
                })
            }
        }
    }

    /// Encode a RAW or RLE header (`regenerated_size` only). Picks the
    /// narrowest size format that fits.
    pub fn encode_raw_or_rle(section_type: LiteralsSectionType, regenerated_size: u32) -> Vec<u8> {
        let type_bits = match section_type {
            LiteralsSectionType::Raw => 0u8,
            LiteralsSectionType::Rle => 1,
            _ => panic!("encode_raw_or_rle called with a compressed section type"),
        };
        if regenerated_size < (1 << 5) {
            vec![type_bits | (0 << 2) | ((regenerated_size as u8) << 3)]
        } else if regenerated_size < (1 << 12) {
            let v = regenerated_size;
            vec![
                type_bits | (1 << 2) | (((v & 0xF) as u8) << 4),
                (v >> 4) as u8,
            ]
        } else {
            let v = regenerated_size;
            vec![
                type_bits | (3 << 2) | (((v & 0xF) as u8) << 4),
                (v >> 4) as u8,
                (v >> 12) as u8,
            ]
        }
    }

    /// Encode a COMPRESSED or TREELESS header.
    pub fn encode_compressed(
        treeless: bool,
        regenerated_size: u32,
        compressed_size: u32,
        num_streams: u8,
    ) -> Vec<u8> {
        let type_bits: u8 = if treeless { 3 } else { 2 };

        if regenerated_size < (1 << 10) && compressed_size < (1 << 10) {
            let size_format = if num_streams <= 1 { 0u8 } else { 1u8 };
            let b0 = type_bits | (size_format << 2) | (((regenerated_size & 0xF) as u8) << 4);
            let b1 = ((regenerated_size >> 4) & 0x3F) as u8 | (((compressed_size & 0x3) as u8) << 6);
            let b2 = (compressed_size >> 2) as u8;
            vec![b0, b1, b2]
        } else if regenerated_size < (1 << 14) && compressed_size < (1 << 14) {
            let size_format = 2u8;
            let b0 = type_bits | (size_format << 2) | (((regenerated_size & 0xF) as u8) << 4);
            let b1 = ((regenerated_size >> 4) & 0xFF) as u8;
            let b2 = ((regenerated_size >> 12) & 0x3) as u8 | (((compressed_size & 0x3F) as u8) << 2);
            let b3 = (compressed_size >> 6) as u8;
            vec![b0, b1, b2, b3]
        } else {
            let size_format = 3u8;
            let b0 = type_bits | (size_format << 2) | (((regenerated_size & 0xF) as u8) << 4);
            let b1 = ((regenerated_size >> 4) & 0xFF) as u8;
            let b2 = ((regenerated_size >> 12) & 0x3F) as u8 | (((compressed_size & 0x3) as u8) << 6);
            let b3 = (compressed_size >> 2) as u8;
            let b4 = (compressed_size >> 10) as u8;
            vec![b0, b1, b2, b3, b4]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_raw_small() {
        let bytes = LiteralsSectionHeader::encode_raw_or_rle(LiteralsSectionType::Raw, 17);
        let header = LiteralsSectionHeader::decode(&bytes).unwrap();
        assert_eq!(header.section_type, LiteralsSectionType::Raw);
        assert_eq!(header.regenerated_size, 17);
        assert_eq!(header.header_size as usize, bytes.len());
    }

    #[test]
    fn round_trips_compressed_small() {
        let bytes = LiteralsSectionHeader::encode_compressed(false, 500, 200, 1);
        let header = LiteralsSectionHeader::decode(&bytes).unwrap();
        assert_eq!(header.section_type, LiteralsSectionType::Compressed);
        assert_eq!(header.regenerated_size, 500);
        assert_eq!(header.compressed_size, Some(200));
        assert_eq!(header.num_streams, Some(1));
    }

    #[test]
    fn round_trips_compressed_large() {
        let bytes = LiteralsSectionHeader::encode_compressed(false, 100_000, 50_000, 4);
        let header = LiteralsSectionHeader::decode(&bytes).unwrap();
        assert_eq!(header.regenerated_size, 100_000);
        assert_eq!(header.compressed_size, Some(50_000));
        assert_eq!(header.num_streams, Some(4));
    }
}
