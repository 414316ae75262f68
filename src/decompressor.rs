//! The one-shot frame decoder.

use crate::blocks::block::{decode_block_header, BlockType, BLOCK_HEADER_SIZE};
use crate::error::DecompressError;
use crate::execution::execute_sequences;
use crate::frame::{FrameHeader, FrameHeaderError, MAX_WINDOW_SIZE};
use crate::huff0::HuffmanDecodeTable;
use crate::literals_codec::decode_literals_section;
use crate::repeated_offsets::{Offsets, INITIAL_OFFSETS};
use crate::sequences::{decode_sequences_section, ChannelTables};
use crate::xxhash64;

/// Owns the scratch state (Huffman decode table, per-channel FSE tables,
/// repeated-offset history) reused across blocks within a frame and across
/// `decompress` calls. `offsets` resets to `INITIAL_OFFSETS` once per frame,
/// at the top of `decode_frame`, and is threaded unchanged into every
/// block's sequences section after that: a repeat-offset code in block N>0
/// resolves against history left over from earlier blocks in the same
/// frame, not against a fresh triple.
pub struct Decompressor {
    huffman_table: HuffmanDecodeTable,
    huffman_loaded: bool,
    channel_tables: ChannelTables,
    offsets: Offsets,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self {
            huffman_table: HuffmanDecodeTable::default(),
            huffman_loaded: false,
            channel_tables: ChannelTables::default(),
            offsets: INITIAL_OFFSETS,
        }
    }
}

impl Decompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompresses every frame in `input` back to back into `output`,
    /// returning the total number of bytes written.
    pub fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, DecompressError> {
        let mut in_pos = 0usize;
        let mut written = 0usize;
        while in_pos < input.len() {
            in_pos += self.decode_frame(&input[in_pos..], in_pos, output, &mut written)?;
        }
        Ok(written)
    }

    /// Reads just the first frame's header and returns its declared content
    /// size, `None` when the frame doesn't declare one.
    pub fn get_decompressed_size(input: &[u8]) -> Result<Option<u64>, DecompressError> {
        let header = FrameHeader::decode(input)?;
        check_window_ceiling(&header, 0)?;
        Ok(header.content_size)
    }

    fn decode_frame(
        &mut self,
        input: &[u8],
        frame_input_offset: usize,
        output: &mut [u8],
        written: &mut usize,
    ) -> Result<usize, DecompressError> {
        let header = FrameHeader::decode(input)?;
        check_window_ceiling(&header, frame_input_offset)?;

        self.huffman_table.reset();
        self.huffman_loaded = false;
        self.channel_tables.reset();
        self.offsets = INITIAL_OFFSETS;

        let frame_origin = *written;
        let mut pos = header.header_size;

        loop {
            let block_header = decode_block_header(&input[pos..])
                .map_err(|e| DecompressError::malformed(frame_input_offset + pos, e.to_string()))?;
            pos += BLOCK_HEADER_SIZE;

            match block_header.block_type {
                BlockType::Raw => {
                    let len = block_header.block_size as usize;
                    let payload = input.get(pos..pos + len).ok_or_else(|| {
                        DecompressError::malformed(frame_input_offset + pos, "raw block truncated")
                    })?;
                    write_output(output, written, payload)?;
                    pos += len;
                }
                BlockType::Rle => {
                    let len = block_header.block_size as usize;
                    let &byte = input.get(pos).ok_or_else(|| {
                        DecompressError::malformed(frame_input_offset + pos, "rle block truncated")
                    })?;
                    if *written + len > output.len() {
                        return Err(DecompressError::OutputTooSmall {
                            needed: *written + len,
                            got: output.len(),
                        });
                    }
                    output[*written..*written + len].fill(byte);
                    *written += len;
                    pos += 1;
                }
                BlockType::Compressed => {
                    let len = block_header.block_size as usize;
                    let payload = input.get(pos..pos + len).ok_or_else(|| {
                        DecompressError::malformed(frame_input_offset + pos, "compressed block truncated")
                    })?;

                    let (literals, lit_consumed) =
                        decode_literals_section(payload, &mut self.huffman_table, &mut self.huffman_loaded)?;
                    let sequences_src = &payload[lit_consumed..];
                    let (sequences, _) = decode_sequences_section(
                        sequences_src,
                        &mut self.channel_tables,
                        &mut self.offsets,
                    )?;

                    *written =
                        execute_sequences(output, *written, frame_origin, &literals, &sequences)?;
                    pos += len;
                }
            }

            if block_header.last_block {
                break;
            }
        }

        if header.has_checksum {
            let bytes = input.get(pos..pos + 4).ok_or_else(|| {
                DecompressError::malformed(frame_input_offset + pos, "checksum truncated")
            })?;
            let expected = u32::from_le_bytes(bytes.try_into().unwrap());
            let actual = xxhash64::checksum(&output[frame_origin..*written]);
            if expected != actual {
                return Err(DecompressError::ChecksumMismatch { expected, actual });
            }
            pos += 4;
        }

        Ok(pos)
    }
}

fn write_output(output: &mut [u8], written: &mut usize, data: &[u8]) -> Result<(), DecompressError> {
    if *written + data.len() > output.len() {
        return Err(DecompressError::OutputTooSmall {
            needed: *written + data.len(),
            got: output.len(),
        });
    }
    output[*written..*written + data.len()].copy_from_slice(data);
    *written += data.len();
    Ok(())
}

/// Single-segment frames have no explicit window descriptor; their
/// effective window is the whole declared content size. The window
/// ceiling (`windowSize <= 2^23`) applies there too.
fn check_window_ceiling(header: &FrameHeader, _offset: usize) -> Result<(), DecompressError> {
    let effective = header.window_size.unwrap_or_else(|| header.content_size.unwrap_or(0));
    if effective > MAX_WINDOW_SIZE {
        return Err(FrameHeaderError::WindowTooBig { got: effective }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::{CompressionLevel, Compressor};

    #[test]
    fn decodes_consecutive_frames() {
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let a = b"frame one payload".to_vec();
        let b = b"frame two payload, a bit longer this time".to_vec();

        let mut buf_a = vec![0u8; Compressor::max_compressed_length(a.len())];
        let written_a = compressor.compress(&a, &mut buf_a).unwrap();
        let mut buf_b = vec![0u8; Compressor::max_compressed_length(b.len())];
        let written_b = compressor.compress(&b, &mut buf_b).unwrap();

        let mut combined = Vec::new();
        combined.extend_from_slice(&buf_a[..written_a]);
        combined.extend_from_slice(&buf_b[..written_b]);

        let mut decompressor = Decompressor::new();
        let mut out = vec![0u8; a.len() + b.len()];
        let written = decompressor.decompress(&combined, &mut out).unwrap();
        assert_eq!(written, a.len() + b.len());
        assert_eq!(&out[..a.len()], &a[..]);
        assert_eq!(&out[a.len()..written], &b[..]);
    }

    #[test]
    fn detects_a_corrupted_checksum() {
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let input = b"some payload that gets a checksum trailer".to_vec();
        let mut buf = vec![0u8; Compressor::max_compressed_length(input.len())];
        let written = compressor.compress(&input, &mut buf).unwrap();
        buf[written - 1] ^= 0xFF;

        let mut decompressor = Decompressor::new();
        let mut out = vec![0u8; input.len()];
        let result = decompressor.decompress(&buf[..written], &mut out);
        assert!(matches!(result, Err(DecompressError::ChecksumMismatch { .. })));
    }

    #[test]
    fn round_trips_a_compressible_input_spanning_multiple_blocks() {
        // Large enough and repetitive enough to produce several compressed
        // blocks (the 128 KiB block ceiling) whose sequences rely on
        // repeated-offset codes resolved against history from earlier
        // blocks in the frame.
        let input = b"the quick brown fox jumps over the lazy dog. "
            .repeat(8000);
        assert!(input.len() > 3 * crate::blocks::block::MAX_BLOCK_SIZE);

        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let mut buf = vec![0u8; Compressor::max_compressed_length(input.len())];
        let written = compressor.compress(&input, &mut buf).unwrap();
        assert!(written < input.len());

        let mut decompressor = Decompressor::new();
        let mut out = vec![0u8; input.len()];
        let read = decompressor.decompress(&buf[..written], &mut out).unwrap();
        assert_eq!(read, input.len());
        assert_eq!(&out[..read], &input[..]);
    }

    #[test]
    fn get_decompressed_size_reads_the_declared_length() {
        let mut compressor = Compressor::new(CompressionLevel::Fast);
        let input = vec![7u8; 1000];
        let mut buf = vec![0u8; Compressor::max_compressed_length(input.len())];
        let written = compressor.compress(&input, &mut buf).unwrap();

        let size = Decompressor::get_decompressed_size(&buf[..written]).unwrap();
        assert_eq!(size, Some(1000));
    }
}
