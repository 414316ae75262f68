//! Literals section body codec: ties `LiteralsSectionHeader`
//! to the `huff0` table builder/encoder/decoder to decode or encode the full
//! section, not just its header.

use crate::blocks::literals_section::{LiteralsSectionHeader, LiteralsSectionType};
use crate::error::DecompressError;
use crate::huff0::{
    decode_4streams, decode_stream, encode_4streams, encode_stream, write_weights,
    HuffmanDecodeTable, HuffmanEncodeTable,
};

/// Parse the literals section at the front of `source`. `huffman_table` and
/// `huffman_loaded` persist across blocks within a frame so `TREELESS`
/// sections can reuse the most recently built table, the same way
/// `ChannelTables` persists FSE state for the sequences section.
///
/// Returns the regenerated literal bytes and the number of bytes consumed
/// from `source`.
pub fn decode_literals_section(
    source: &[u8],
    huffman_table: &mut HuffmanDecodeTable,
    huffman_loaded: &mut bool,
) -> Result<(Vec<u8>, usize), DecompressError> {
    let header = LiteralsSectionHeader::decode(source)?;
    let mut pos = header.header_size as usize;

    match header.section_type {
        LiteralsSectionType::Raw => {
            let regen = header.regenerated_size as usize;
            let body = source
                .get(pos..pos + regen)
                .ok_or_else(|| DecompressError::malformed(pos, "raw literals section truncated"))?;
            pos += regen;
            Ok((body.to_vec(), pos))
        }
        LiteralsSectionType::Rle => {
            let &byte = source
                .get(pos)
                .ok_or_else(|| DecompressError::malformed(pos, "rle literals section truncated"))?;
            pos += 1;
            Ok((vec![byte; header.regenerated_size as usize], pos))
        }
        LiteralsSectionType::Compressed | LiteralsSectionType::Treeless => {
            let compressed_size = header.compressed_size.unwrap() as usize;
            let payload = source.get(pos..pos + compressed_size).ok_or_else(|| {
                DecompressError::malformed(pos, "compressed literals section truncated")
            })?;

            let huffman_header_len = if header.section_type == LiteralsSectionType::Compressed {
                let len = huffman_table.build(payload)?;
                *huffman_loaded = true;
                len
            } else {
                if !*huffman_loaded {
                    return Err(DecompressError::malformed(
                        pos,
                        "treeless literals section with no huffman table loaded",
                    ));
                }
                0
            };

            let body = &payload[huffman_header_len..];
            let regen = header.regenerated_size as usize;
            let out = match header.num_streams {
                Some(1) => decode_stream(huffman_table, body, regen)?,
                _ => decode_4streams(huffman_table, body, regen)?,
            };
            pos += compressed_size;
            Ok((out, pos))
        }
    }
}

/// Build a literals section for `literals`: a bare
/// RAW section for small or unfavorably-distributed input, RLE when every
/// byte is identical, otherwise a fresh Huffman table (never TREELESS — the
/// encoder always ships its own table; see DESIGN.md).
pub fn encode_literals_section(literals: &[u8]) -> Vec<u8> {
    let n = literals.len();
    if n == 0 {
        return LiteralsSectionHeader::encode_raw_or_rle(LiteralsSectionType::Raw, 0);
    }

    let mut counts = [0usize; 256];
    for &b in literals {
        counts[b as usize] += 1;
    }
    let largest = *counts.iter().max().unwrap();

    if largest == n {
        let mut out = LiteralsSectionHeader::encode_raw_or_rle(LiteralsSectionType::Rle, n as u32);
        out.push(literals[0]);
        return out;
    }

    if n <= 63 || largest <= (n >> 7) + 4 {
        let mut out = LiteralsSectionHeader::encode_raw_or_rle(LiteralsSectionType::Raw, n as u32);
        out.extend_from_slice(literals);
        return out;
    }

    let max_symbol_plus_one = counts.iter().rposition(|&c| c > 0).map(|p| p + 1).unwrap_or(0);
    let enc_table = HuffmanEncodeTable::build(&counts, crate::huff0::MAX_LITERALS_TABLE_LOG);
    let num_streams: u8 = if n < 256 { 1 } else { 4 };
    let stream_bytes = if num_streams == 1 {
        encode_stream(&enc_table, literals)
    } else {
        encode_4streams(&enc_table, literals)
    };
    let weight_bytes = write_weights(enc_table.weights(), max_symbol_plus_one);
    let compressed_size = weight_bytes.len() + stream_bytes.len();

    if compressed_size >= n {
        let mut out = LiteralsSectionHeader::encode_raw_or_rle(LiteralsSectionType::Raw, n as u32);
        out.extend_from_slice(literals);
        return out;
    }

    let mut out =
        LiteralsSectionHeader::encode_compressed(false, n as u32, compressed_size as u32, num_streams);
    out.extend(weight_bytes);
    out.extend(stream_bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_raw_literals() {
        let literals = b"ab";
        let bytes = encode_literals_section(literals);
        let mut table = HuffmanDecodeTable::new();
        let mut loaded = false;
        let (decoded, consumed) = decode_literals_section(&bytes, &mut table, &mut loaded).unwrap();
        assert_eq!(decoded, literals);
        assert_eq!(consumed, bytes.len());
        assert!(!loaded);
    }

    #[test]
    fn round_trips_rle_literals() {
        let literals = vec![b'z'; 80];
        let bytes = encode_literals_section(&literals);
        let mut table = HuffmanDecodeTable::new();
        let mut loaded = false;
        let (decoded, consumed) = decode_literals_section(&bytes, &mut table, &mut loaded).unwrap();
        assert_eq!(decoded, literals);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn round_trips_huffman_compressed_literals() {
        let literals = b"the quick brown fox jumps over the lazy dog, the quick brown fox runs again and again";
        let bytes = encode_literals_section(literals);
        let mut table = HuffmanDecodeTable::new();
        let mut loaded = false;
        let (decoded, consumed) = decode_literals_section(&bytes, &mut table, &mut loaded).unwrap();
        assert_eq!(decoded, literals);
        assert_eq!(consumed, bytes.len());
        assert!(loaded);
    }

    #[test]
    fn rejects_treeless_with_no_table_loaded() {
        // A compressed section header (type bits 3 = treeless) with a
        // plausible but never-built table reference.
        let bytes = LiteralsSectionHeader::encode_compressed(true, 10, 3, 1)
            .into_iter()
            .chain([0u8, 0, 0])
            .collect::<Vec<u8>>();
        let mut table = HuffmanDecodeTable::new();
        let mut loaded = false;
        assert!(decode_literals_section(&bytes, &mut table, &mut loaded).is_err());
    }
}
