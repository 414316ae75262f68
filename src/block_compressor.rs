//! One-block encode decision: run the match finder,
//! assemble a literals section + sequences section, and fall back to RAW or
//! RLE when compression doesn't pay for itself.

use crate::blocks::block::{BlockHeader, BlockType, BLOCK_HEADER_SIZE, MIN_BLOCK_SIZE};
use crate::literals_codec::encode_literals_section;
use crate::matcher::Matcher;
use crate::repeated_offsets::Offsets;
use crate::sequences::{encode_sequences_section, SequenceStore};

fn min_gain(input_size: usize) -> usize {
    (input_size >> 6) + 2
}

/// Encodes one block (header + payload) for `chunk`, the last block of the
/// frame iff `is_last`. `store`, `matcher` and `offsets` are scratch state
/// reused across the blocks of one frame; `offsets` persists between blocks
/// so repeated-offset substitution spans the whole frame. `force_raw`
/// implements `CompressionLevel::Uncompressed`: every block is written RAW,
/// skipping the match finder entirely.
pub fn encode_block(
    chunk: &[u8],
    is_last: bool,
    force_raw: bool,
    store: &mut SequenceStore,
    matcher: &mut Matcher,
    offsets: &mut Offsets,
    out: &mut Vec<u8>,
) {
    let n = chunk.len();

    if force_raw || n == 0 || n < MIN_BLOCK_SIZE + BLOCK_HEADER_SIZE + 1 {
        write_raw(chunk, is_last, out);
        return;
    }
    if chunk.iter().all(|&b| b == chunk[0]) {
        write_rle(chunk, is_last, out);
        return;
    }

    matcher.find_matches(chunk, store);
    let literals_bytes = encode_literals_section(&store.literals);
    let sequences_bytes = encode_sequences_section(store, offsets);

    let body_len = literals_bytes.len() + sequences_bytes.len();
    if body_len >= n.saturating_sub(min_gain(n)) {
        write_raw(chunk, is_last, out);
        return;
    }

    let header = BlockHeader {
        last_block: is_last,
        block_type: BlockType::Compressed,
        block_size: body_len as u32,
    };
    out.extend_from_slice(&crate::blocks::block::encode_block_header(header));
    out.extend(literals_bytes);
    out.extend(sequences_bytes);
}

fn write_raw(chunk: &[u8], is_last: bool, out: &mut Vec<u8>) {
    let header = BlockHeader {
        last_block: is_last,
        block_type: BlockType::Raw,
        block_size: chunk.len() as u32,
    };
    out.extend_from_slice(&crate::blocks::block::encode_block_header(header));
    out.extend_from_slice(chunk);
}

fn write_rle(chunk: &[u8], is_last: bool, out: &mut Vec<u8>) {
    let header = BlockHeader {
        last_block: is_last,
        block_type: BlockType::Rle,
        block_size: chunk.len() as u32,
    };
    out.extend_from_slice(&crate::blocks::block::encode_block_header(header));
    out.push(chunk[0]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::block::decode_block_header;

    #[test]
    fn tiny_chunk_falls_back_to_raw() {
        let mut out = Vec::new();
        let mut store = SequenceStore::new();
        let mut matcher = Matcher::new();
        let mut offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        encode_block(b"ab", true, false, &mut store, &mut matcher, &mut offsets, &mut out);

        let header = decode_block_header(&out).unwrap();
        assert_eq!(header.block_type, BlockType::Raw);
        assert_eq!(header.block_size, 2);
    }

    #[test]
    fn constant_chunk_becomes_rle() {
        let mut out = Vec::new();
        let mut store = SequenceStore::new();
        let mut matcher = Matcher::new();
        let mut offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let chunk = vec![b'q'; 200];
        encode_block(&chunk, true, false, &mut store, &mut matcher, &mut offsets, &mut out);

        let header = decode_block_header(&out).unwrap();
        assert_eq!(header.block_type, BlockType::Rle);
        assert_eq!(header.block_size, 200);
        assert_eq!(out[BLOCK_HEADER_SIZE], b'q');
    }

    #[test]
    fn compressible_chunk_becomes_compressed() {
        let mut out = Vec::new();
        let mut store = SequenceStore::new();
        let mut matcher = Matcher::new();
        let mut offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let chunk = b"the quick brown fox jumps over the lazy dog, the quick brown fox runs again"
            .repeat(4);
        encode_block(&chunk, true, false, &mut store, &mut matcher, &mut offsets, &mut out);

        let header = decode_block_header(&out).unwrap();
        assert_eq!(header.block_type, BlockType::Compressed);
        assert!((header.block_size as usize) < chunk.len());
    }

    #[test]
    fn force_raw_skips_compression_even_when_favorable() {
        let mut out = Vec::new();
        let mut store = SequenceStore::new();
        let mut matcher = Matcher::new();
        let mut offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let chunk = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        encode_block(&chunk, true, true, &mut store, &mut matcher, &mut offsets, &mut out);

        let header = decode_block_header(&out).unwrap();
        assert_eq!(header.block_type, BlockType::Raw);
        assert_eq!(header.block_size as usize, chunk.len());
    }
}
