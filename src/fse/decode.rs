use super::{highest_bit_set, next_position, FseTableError};
use crate::bitio::{BitReaderForward, BitReaderReversed};

/// `{symbol, newState base, numberOfBits}` for every state in the table.
#[derive(Copy, Clone, Debug)]
pub struct Entry {
    pub base_line: usize,
    pub num_bits: u8,
    pub symbol: u8,
}

/// A built FSE decode table: `1 << accuracy_log` entries, indexed by state.
#[derive(Clone, Debug, Default)]
pub struct FseDecodeTable {
    entries: Vec<Entry>,
    accuracy_log: u8,
}

impl FseDecodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_built(&self) -> bool {
        self.accuracy_log != 0
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.accuracy_log = 0;
    }

    /// Read the normalized-count header from `source` and build the
    /// decoding table from it. Returns the number of bytes the header
    /// occupied.
    pub fn build_from_header(&mut self, source: &[u8], max_log: u8) -> Result<usize, FseTableError> {
        let (probs, acc_log, bytes_read) = read_normalized_counts(source, max_log)?;
        self.build_from_probabilities(acc_log, &probs)?;
        Ok(bytes_read)
    }

    /// Convenience constructor mirroring `FseEncodeTable::from_probabilities`.
    pub fn from_probabilities(acc_log: u8, probs: &[i32]) -> Result<Self, FseTableError> {
        let mut table = Self::new();
        table.build_from_probabilities(acc_log, probs)?;
        Ok(table)
    }

    pub fn build_from_probabilities(&mut self, acc_log: u8, probs: &[i32]) -> Result<(), FseTableError> {
        if acc_log == 0 {
            return Err(FseTableError::AccuracyLogZero);
        }
        self.accuracy_log = acc_log;
        build_decoding_table(&mut self.entries, acc_log, probs);
        Ok(())
    }

    /// Build a degenerate one-state table for the RLE sequence mode: every
    /// lookup yields `symbol` and consumes zero bits.
    pub fn build_rle(&mut self, symbol: u8) {
        self.accuracy_log = 0;
        self.entries.clear();
        self.entries.push(Entry {
            base_line: 0,
            num_bits: 0,
            symbol,
        });
    }
}

fn build_decoding_table(entries: &mut Vec<Entry>, acc_log: u8, probs: &[i32]) {
    let table_size = 1usize << acc_log;
    entries.clear();
    entries.resize(
        table_size,
        Entry {
            base_line: 0,
            num_bits: 0,
            symbol: 0,
        },
    );

    let mut negative_idx = table_size;
    for (symbol, &prob) in probs.iter().enumerate() {
        if prob == -1 {
            negative_idx -= 1;
            entries[negative_idx] = Entry {
                base_line: 0,
                num_bits: acc_log,
                symbol: symbol as u8,
            };
        }
    }

    let mut position = 0;
    for (symbol, &prob) in probs.iter().enumerate() {
        if prob <= 0 {
            continue;
        }
        for _ in 0..prob {
            entries[position].symbol = symbol as u8;
            position = next_position(position, table_size);
            while position >= negative_idx {
                position = next_position(position, table_size);
            }
        }
    }

    let mut symbol_counter = vec![0u32; probs.len()];
    for entry in entries.iter_mut().take(negative_idx) {
        let symbol = entry.symbol;
        let prob = probs[symbol as usize] as u32;
        let count = symbol_counter[symbol as usize];
        let (baseline, num_bits) = calc_baseline_and_numbits(table_size as u32, prob, count);
        symbol_counter[symbol as usize] += 1;
        entry.base_line = baseline;
        entry.num_bits = num_bits;
    }
}

fn calc_baseline_and_numbits(num_states_total: u32, num_states_symbol: u32, state_number: u32) -> (usize, u8) {
    let num_state_slices = if num_states_symbol.is_power_of_two() {
        num_states_symbol
    } else {
        1 << highest_bit_set(num_states_symbol)
    };
    let num_double_width = num_state_slices - num_states_symbol;
    let num_single_width = num_states_symbol - num_double_width;
    let slice_width = num_states_total / num_state_slices;
    let num_bits = highest_bit_set(slice_width) - 1;

    if state_number < num_double_width {
        let baseline = num_single_width * slice_width + state_number * slice_width * 2;
        (baseline as usize, num_bits as u8 + 1)
    } else {
        let shifted = state_number - num_double_width;
        ((shifted * slice_width) as usize, num_bits as u8)
    }
}

/// Parse the normalized-count header: a 4-bit accuracy-log
/// field followed by variable-width counts, `-1` sentinels and 2-bit
/// repeat-zero runs.
pub fn read_normalized_counts(source: &[u8], max_log: u8) -> Result<(Vec<i32>, u8, usize), FseTableError> {
    let mut br = BitReaderForward::new(source);
    let acc_log = 5 + br.get_bits(4)? as u8;
    if acc_log > max_log {
        return Err(FseTableError::AccuracyLogTooLarge {
            found: acc_log,
            max: max_log,
        });
    }
    if acc_log == 0 {
        return Err(FseTableError::AccuracyLogZero);
    }

    let probability_sum_target = 1u32 << acc_log;
    let mut probability_counter = 0u32;
    let mut probs = Vec::with_capacity(64);

    while probability_counter < probability_sum_target {
        let max_remaining = probability_sum_target - probability_counter + 1;
        let bits_to_read = highest_bit_set(max_remaining);
        let unchecked_value = br.get_bits(bits_to_read as usize)?;

        let low_threshold = ((1u32 << bits_to_read) - 1) - max_remaining;
        let mask = (1u32 << (bits_to_read - 1)) - 1;
        let small_value = unchecked_value & mask;

        let value = if small_value < low_threshold {
            br.return_bits(1);
            small_value
        } else if unchecked_value > mask {
            unchecked_value - low_threshold
        } else {
            unchecked_value
        };

        let prob = value as i32 - 1;
        probs.push(prob);
        if prob != 0 {
            probability_counter += if prob > 0 { prob as u32 } else { 1 };
        } else {
            loop {
                let skip = br.get_bits(2)?;
                for _ in 0..skip {
                    probs.push(0);
                }
                if skip != 3 {
                    break;
                }
            }
        }
    }

    if probability_counter != probability_sum_target {
        return Err(FseTableError::ProbabilitySumMismatch {
            found: probability_counter,
            expected: probability_sum_target,
        });
    }
    if probs.len() > 256 {
        return Err(FseTableError::TooManySymbols { found: probs.len() });
    }

    Ok((probs, acc_log, br.bytes_read()))
}

/// Walks one FSE channel's state through a backward bitstream.
pub struct FseDecoder<'t> {
    state: usize,
    table: &'t FseDecodeTable,
}

impl<'t> FseDecoder<'t> {
    pub fn new(table: &'t FseDecodeTable) -> Self {
        Self { state: 0, table }
    }

    pub fn decode_symbol(&self) -> u8 {
        self.table.entries[self.state].symbol
    }

    pub fn init_state(&mut self, bits: &mut BitReaderReversed) -> Result<(), FseTableError> {
        if !self.table.is_built() {
            return Err(FseTableError::TableNotBuilt);
        }
        // An RLE table has a single entry and consumes no bits.
        self.state = if self.table.accuracy_log == 0 {
            0
        } else {
            bits.get_bits(self.table.accuracy_log as usize)
                .map_err(|_| FseTableError::HeaderTruncated)? as usize
        };
        Ok(())
    }

    pub fn update_state(&mut self, bits: &mut BitReaderReversed) -> Result<(), FseTableError> {
        let entry = &self.table.entries[self.state];
        if entry.num_bits == 0 && self.table.accuracy_log == 0 {
            // RLE table: state never moves.
            return Ok(());
        }
        let add = bits
            .get_bits(entry.num_bits as usize)
            .map_err(|_| FseTableError::HeaderTruncated)?;
        self.state = entry.base_line + add as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle_table_always_yields_the_same_symbol() {
        let mut table = FseDecodeTable::new();
        table.build_rle(42);
        let dec = FseDecoder::new(&table);
        assert_eq!(dec.decode_symbol(), 42);
    }

    #[test]
    fn decode_table_matches_probabilities_shape() {
        let probs = &[0, 0, -1, 3, 2, 2, (1 << 6) - 8];
        let mut table = FseDecodeTable::new();
        table.build_from_probabilities(6, probs).unwrap();
        assert_eq!(table.entries().len(), 64);
        let total_nonneg: i32 = probs.iter().filter(|&&p| p > 0).sum();
        let neg_count = probs.iter().filter(|&&p| p == -1).count();
        assert_eq!(total_nonneg as usize + neg_count, 64);
    }
}
