use super::HuffmanTableError;
use crate::bitio::BitReaderReversed;
use crate::fse::{FseDecodeTable, FseDecoder};

fn highest_bit_set(x: u32) -> u32 {
    assert!(x > 0, "highest_bit_set is undefined for zero");
    32 - x.leading_zeros()
}

#[derive(Copy, Clone, Debug, Default)]
struct Entry {
    symbol: u8,
    num_bits: u8,
}

/// A flat `1 << maxNumBits` decode table, direct-indexed by a lookahead of
/// `maxNumBits` bits.
#[derive(Clone, Debug, Default)]
pub struct HuffmanDecodeTable {
    entries: Vec<Entry>,
    max_num_bits: u8,
}

impl HuffmanDecodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_num_bits(&self) -> u8 {
        self.max_num_bits
    }

    pub fn is_built(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.max_num_bits = 0;
    }

    /// Parse the weight header at the front of `source` and
    /// build the decode table. Returns the number of bytes the header used.
    pub fn build(&mut self, source: &[u8]) -> Result<usize, HuffmanTableError> {
        let (weights, bytes_read) = read_weights(source)?;
        self.build_from_weights(&weights)?;
        Ok(bytes_read)
    }

    fn build_from_weights(&mut self, weights: &[u8]) -> Result<(), HuffmanTableError> {
        let mut bits = vec![0u8; weights.len() + 1];
        let mut weight_sum: u32 = 0;
        for &w in weights {
            if w > super::MAX_LITERALS_TABLE_LOG {
                return Err(HuffmanTableError::WeightTooLarge {
                    found: w,
                    max: super::MAX_LITERALS_TABLE_LOG,
                });
            }
            weight_sum += if w > 0 { 1u32 << (w - 1) } else { 0 };
        }
        if weight_sum == 0 {
            return Err(HuffmanTableError::EmptyWeights);
        }

        let max_bits = highest_bit_set(weight_sum) as u8;
        if max_bits > super::MAX_LITERALS_TABLE_LOG {
            return Err(HuffmanTableError::TableLogTooLarge {
                found: max_bits,
                max: super::MAX_LITERALS_TABLE_LOG,
            });
        }
        let left_over = (1u32 << max_bits) - weight_sum;
        if left_over & (left_over - 1) != 0 {
            return Err(HuffmanTableError::LeftoverNotPowerOfTwo { found: left_over });
        }
        let last_weight = highest_bit_set(left_over) as u8;

        for (symbol, &w) in weights.iter().enumerate() {
            bits[symbol] = if w > 0 { max_bits + 1 - w } else { 0 };
        }
        bits[weights.len()] = max_bits + 1 - last_weight;

        let mut bit_ranks = vec![0u32; max_bits as usize + 1];
        for &b in &bits {
            bit_ranks[b as usize] += 1;
        }

        self.entries.clear();
        self.entries.resize(1usize << max_bits, Entry::default());
        self.max_num_bits = max_bits;

        let mut rank_indexes = vec![0usize; max_bits as usize + 1];
        for b in (1..rank_indexes.len() as u8).rev() {
            rank_indexes[b as usize - 1] =
                rank_indexes[b as usize] + bit_ranks[b as usize] as usize * (1 << (max_bits - b));
        }
        debug_assert_eq!(rank_indexes[0], self.entries.len());

        for (symbol, &b) in bits.iter().enumerate() {
            if b == 0 {
                continue;
            }
            let base_idx = rank_indexes[b as usize];
            let len = 1usize << (max_bits - b);
            rank_indexes[b as usize] += len;
            for e in &mut self.entries[base_idx..base_idx + len] {
                e.symbol = symbol as u8;
                e.num_bits = b;
            }
        }

        Ok(())
    }
}

/// Read either the FSE-compressed or raw 4-bit-per-symbol weight encoding at
/// the front of `source`. Returns `(weights, bytesConsumed)`; the last
/// symbol's weight is derived, not stored.
fn read_weights(source: &[u8]) -> Result<(Vec<u8>, usize), HuffmanTableError> {
    let &header = source.first().ok_or(HuffmanTableError::HeaderTruncated)?;

    if header < 128 {
        let fse_stream = source.get(1..).ok_or(HuffmanTableError::HeaderTruncated)?;
        let fse_stream = fse_stream
            .get(..header as usize)
            .ok_or(HuffmanTableError::HeaderTruncated)?;

        let mut fse_table = FseDecodeTable::new();
        let bytes_used = fse_table.build_from_header(fse_stream, super::MAX_WEIGHTS_TABLE_LOG)?;

        let compressed = &fse_stream[bytes_used..];
        let mut br = BitReaderReversed::new(compressed);
        skip_padding(&mut br)?;

        let mut dec1 = FseDecoder::new(&fse_table);
        let mut dec2 = FseDecoder::new(&fse_table);
        dec1.init_state(&mut br)?;
        dec2.init_state(&mut br)?;

        let mut weights = Vec::new();
        loop {
            weights.push(dec1.decode_symbol());
            dec1.update_state(&mut br)?;
            if br.bits_remaining() <= -1 {
                weights.push(dec2.decode_symbol());
                break;
            }
            weights.push(dec2.decode_symbol());
            dec2.update_state(&mut br)?;
            if br.bits_remaining() <= -1 {
                weights.push(dec1.decode_symbol());
                break;
            }
            // Max 255 weights: one u8 symbol per weight, and the 256th
            // symbol's weight is always the implicit last one.
            if weights.len() > 255 {
                return Err(HuffmanTableError::TooManyWeights);
            }
        }
        Ok((weights, 1 + header as usize))
    } else {
        let num_weights = header as usize - 127;
        let bytes_needed = num_weights.div_ceil(2);
        let raw = source
            .get(1..1 + bytes_needed)
            .ok_or(HuffmanTableError::HeaderTruncated)?;
        let mut weights = vec![0u8; num_weights];
        for (idx, w) in weights.iter_mut().enumerate() {
            *w = if idx % 2 == 0 {
                raw[idx / 2] >> 4
            } else {
                raw[idx / 2] & 0xF
            };
        }
        Ok((weights, 1 + bytes_needed))
    }
}

fn skip_padding(br: &mut BitReaderReversed<'_>) -> Result<(), HuffmanTableError> {
    let mut skipped = 0u8;
    loop {
        let bit = br
            .get_bits(1)
            .map_err(|_| HuffmanTableError::HeaderTruncated)?;
        skipped += 1;
        if bit == 1 || skipped > 8 {
            break;
        }
    }
    if skipped > 8 {
        return Err(HuffmanTableError::HeaderTruncated);
    }
    Ok(())
}

/// Walks one literal at a time through a `HuffmanDecodeTable` over a
/// backward bitstream.
pub struct HuffmanDecoder<'t> {
    table: &'t HuffmanDecodeTable,
    state: usize,
}

impl<'t> HuffmanDecoder<'t> {
    pub fn new(table: &'t HuffmanDecodeTable) -> Self {
        Self { table, state: 0 }
    }

    pub fn init_state(&mut self, br: &mut BitReaderReversed<'_>) -> Result<(), HuffmanTableError> {
        self.state = br
            .get_bits(self.table.max_num_bits as usize)
            .map_err(|_| HuffmanTableError::HeaderTruncated)? as usize;
        Ok(())
    }

    pub fn decode_symbol(&self) -> u8 {
        self.table.entries[self.state].symbol
    }

    pub fn update_state(&mut self, br: &mut BitReaderReversed<'_>) -> Result<(), HuffmanTableError> {
        let entry = self.table.entries[self.state];
        let new_bits = br
            .get_bits(entry.num_bits as usize)
            .map_err(|_| HuffmanTableError::HeaderTruncated)?;
        self.state = ((self.state << entry.num_bits) & (self.table.entries.len() - 1)) | new_bits as usize;
        Ok(())
    }
}

/// Decode a single independent Huffman stream into exactly `out_len` bytes.
pub fn decode_stream(
    table: &HuffmanDecodeTable,
    stream: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, HuffmanTableError> {
    let mut out = Vec::with_capacity(out_len);
    if out_len == 0 {
        return Ok(out);
    }
    let mut br = BitReaderReversed::new(stream);
    skip_padding(&mut br)?;

    let mut dec = HuffmanDecoder::new(table);
    dec.init_state(&mut br)?;
    out.push(dec.decode_symbol());
    for _ in 1..out_len {
        dec.update_state(&mut br)?;
        out.push(dec.decode_symbol());
    }
    Ok(out)
}

/// Decode the 4-stream jump-table layout: a 6-byte header of
/// three 16-bit little-endian lengths splits the payload into four
/// substreams, each decoded independently and concatenated in order.
pub fn decode_4streams(
    table: &HuffmanDecodeTable,
    payload: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, HuffmanTableError> {
    let header = payload.get(..6).ok_or(HuffmanTableError::HeaderTruncated)?;
    let size1 = u16::from_le_bytes([header[0], header[1]]) as usize;
    let size2 = u16::from_le_bytes([header[2], header[3]]) as usize;
    let size3 = u16::from_le_bytes([header[4], header[5]]) as usize;

    let body = &payload[6..];
    if body.len() < size1 + size2 + size3 {
        return Err(HuffmanTableError::HeaderTruncated);
    }
    let (s1, rest) = body.split_at(size1);
    let (s2, rest) = rest.split_at(size2);
    let (s3, s4) = rest.split_at(size3);

    let stream_len = out_len.div_ceil(4);
    let last_len = stream_len
        .checked_mul(3)
        .filter(|&first_three| first_three <= out_len)
        .map(|first_three| out_len - first_three)
        .ok_or(HuffmanTableError::HeaderTruncated)?;

    let mut out = Vec::with_capacity(out_len);
    out.extend(decode_stream(table, s1, stream_len)?);
    out.extend(decode_stream(table, s2, stream_len)?);
    out.extend(decode_stream(table, s3, stream_len)?);
    out.extend(decode_stream(table, s4, last_len)?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_weight_header_round_trips_shape() {
        // header 127 + 2 weights, one byte payload: symbol 0 has weight 3,
        // symbol 1 has weight 1 (the implicit third symbol fills the rest).
        let source = [127 + 2, 0x31];
        let (weights, read) = read_weights(&source).unwrap();
        assert_eq!(read, 2);
        assert_eq!(weights, vec![3, 1]);
    }

    #[test]
    fn decode_4streams_rejects_an_out_len_too_small_to_split_four_ways_instead_of_underflowing() {
        let table = HuffmanDecodeTable::new();
        // out_len=5 -> stream_len=2, so the first three substreams alone
        // would need 6 bytes; must error, not underflow computing the
        // fourth substream's length.
        let payload = [0u8; 6];
        let result = decode_4streams(&table, &payload, 5);
        assert!(matches!(result, Err(HuffmanTableError::HeaderTruncated)));
    }
}
