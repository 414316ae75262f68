//! The one-shot frame encoder.

use crate::block_compressor::encode_block;
use crate::blocks::block::MAX_BLOCK_SIZE;
use crate::error::CompressError;
use crate::frame::{FrameHeader, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};
use crate::matcher::Matcher;
use crate::repeated_offsets::INITIAL_OFFSETS;
use crate::sequences::SequenceStore;
use crate::xxhash64;

/// `Uncompressed`/`Fast` strategy selection:
/// `Uncompressed` always emits RAW blocks (useful for debugging and for
/// exercising the decoder independently of the match finder); `Fast` is the
/// FAST strategy the match finder implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    Uncompressed,
    Fast,
}

/// Owns the scratch state (match-finder hash table, sequence store) reused
/// across `compress` calls, matching the "instances own all scratch state"
/// resource model.
pub struct Compressor {
    level: CompressionLevel,
    store: SequenceStore,
    matcher: Matcher,
}

impl Compressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            store: SequenceStore::new(),
            matcher: Matcher::new(),
        }
    }

    /// `n + (n >> 8) + ((MAX_BLOCK_SIZE - n) >> 11 when n < MAX_BLOCK_SIZE
    /// else 0)`: a worst-case bound a caller can allocate for
    /// up front, independent of the input's actual contents.
    pub fn max_compressed_length(input_len: usize) -> usize {
        let tail = if input_len < MAX_BLOCK_SIZE {
            (MAX_BLOCK_SIZE - input_len) >> 11
        } else {
            0
        };
        input_len + (input_len >> 8) + tail
    }

    /// Compresses `input` into `output`, returning the number of bytes
    /// written. Always a single frame; always emits the content-size and
    /// checksum fields.
    pub fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressError> {
        if input.len() as u64 > MAX_WINDOW_SIZE {
            return Err(CompressError::InputTooLarge {
                len: input.len(),
                max: MAX_WINDOW_SIZE as usize,
            });
        }

        let needed = Self::max_compressed_length(input.len());
        if output.len() < needed {
            return Err(CompressError::OutputTooSmall {
                needed,
                got: output.len(),
            });
        }

        let window_size = choose_window_size(input.len() as u64);
        let mut frame = FrameHeader::encode(Some(input.len() as u64), window_size)
            .expect("window size is always within bounds after choose_window_size");

        let mut offsets = INITIAL_OFFSETS;
        let block_size = (MAX_BLOCK_SIZE as u64).min(window_size) as usize;
        let force_raw = self.level == CompressionLevel::Uncompressed;

        if input.is_empty() {
            encode_block(
                input,
                true,
                force_raw,
                &mut self.store,
                &mut self.matcher,
                &mut offsets,
                &mut frame,
            );
        } else {
            let mut pos = 0usize;
            while pos < input.len() {
                let end = (pos + block_size).min(input.len());
                let is_last = end == input.len();
                encode_block(
                    &input[pos..end],
                    is_last,
                    force_raw,
                    &mut self.store,
                    &mut self.matcher,
                    &mut offsets,
                    &mut frame,
                );
                pos = end;
            }
        }

        frame.extend_from_slice(&xxhash64::checksum(input).to_le_bytes());

        output[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }
}

/// Smallest power-of-two window (mantissa always zero, always expressible)
/// that covers `input_len`, clamped to the supported range. `compress`
/// already rejects inputs above `MAX_WINDOW_SIZE`, so the clamp here only
/// guards the boundary case `input_len == MAX_WINDOW_SIZE`.
fn choose_window_size(input_len: u64) -> u64 {
    let mut window = MIN_WINDOW_SIZE;
    while window < input_len {
        window <<= 1;
    }
    window.min(MAX_WINDOW_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompressor::Decompressor;

    #[test]
    fn round_trips_empty_input() {
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let mut out = vec![0u8; Compressor::max_compressed_length(0)];
        let written = compressor.compress(&[], &mut out).unwrap();

        let mut decompressor = Decompressor::new();
        let mut decoded = vec![0u8; 16];
        let read = decompressor.decompress(&out[..written], &mut decoded).unwrap();
        assert_eq!(read, 0);
    }

    #[test]
    fn round_trips_a_repeating_corpus() {
        let input = b"the quick brown fox jumps over the lazy dog. "
            .repeat(200);
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let mut out = vec![0u8; Compressor::max_compressed_length(input.len())];
        let written = compressor.compress(&input, &mut out).unwrap();
        assert!(written < input.len());

        let mut decompressor = Decompressor::new();
        let mut decoded = vec![0u8; input.len()];
        let read = decompressor.decompress(&out[..written], &mut decoded).unwrap();
        assert_eq!(read, input.len());
        assert_eq!(&decoded[..read], &input[..]);
    }

    #[test]
    fn uncompressed_level_emits_only_raw_blocks() {
        let input = vec![b'x'; 5000];
        let mut compressor = Compressor::new(CompressionLevel::Uncompressed);
        let mut out = vec![0u8; Compressor::max_compressed_length(input.len())];
        let written = compressor.compress(&input, &mut out).unwrap();

        let mut decompressor = Decompressor::new();
        let mut decoded = vec![0u8; input.len()];
        let read = decompressor.decompress(&out[..written], &mut decoded).unwrap();
        assert_eq!(&decoded[..read], &input[..]);
    }

    #[test]
    fn rejects_input_above_the_window_ceiling() {
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let input = vec![0u8; MAX_WINDOW_SIZE as usize + 1];
        let mut out = vec![0u8; Compressor::max_compressed_length(input.len())];
        let result = compressor.compress(&input, &mut out);
        assert!(matches!(result, Err(CompressError::InputTooLarge { .. })));
    }

    #[test]
    fn output_too_small_is_rejected_before_writing() {
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let input = b"hello world";
        let mut out = [0u8; 2];
        let result = compressor.compress(input, &mut out);
        assert!(matches!(result, Err(CompressError::OutputTooSmall { .. })));
    }
}
