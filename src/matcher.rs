//! FAST-strategy match finder: a single-slot hash table over
//! 5-byte keys, one candidate per bucket (the degenerate one-candidate
//! chain real Zstandard's own "fast" strategy uses, where
//! `chainLog == hashLog`).
//!
//! Matches are found strictly within the slice passed to `find_matches`;
//! the table is reset at the start of every call, so matches never
//! reference bytes from a previous block. Offset substitution against the
//! repeated-offsets triple happens later, when the sequence store is
//! serialized (`sequences::encode_sequences_section`), not here: this
//! module only ever records the desired raw byte distance.

use crate::sequences::SequenceStore;

const MIN_MATCH: usize = 5;
const HASH_LOG: u32 = 17;
const TABLE_SIZE: usize = 1 << HASH_LOG;
const POLY: u64 = 0xCF3B_CCDC_AB00_0000;

/// Largest match length a single sequence's match-length code can encode:
/// `MATCH_LENGTH_BASE[52] + (2^16 - 1)` extra bits. Longer matches (e.g. a
/// run of one repeated byte inside an otherwise non-constant block) are
/// split across several zero-literal sequences rather than overflowing the
/// code's extra-bits field.
const MAX_MATCH_LEN: usize = 16387 + 65535;

const EMPTY: u32 = u32::MAX;

/// Reusable scratch state for one `Compressor` instance. Sized once and
/// cleared (not reallocated) between blocks.
pub struct Matcher {
    table: Vec<u32>,
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            table: vec![EMPTY; TABLE_SIZE],
        }
    }

    fn reset(&mut self) {
        self.table.iter_mut().for_each(|slot| *slot = EMPTY);
    }

    /// Greedy single-pass match finder over `input`: writes literal runs and
    /// `(offset, matchLength)` pairs into `store` via `push_literals` /
    /// `push_sequence`. `store` is cleared first.
    pub fn find_matches(&mut self, input: &[u8], store: &mut SequenceStore) {
        self.reset();
        store.clear();

        let n = input.len();
        if n < MIN_MATCH {
            store.push_literals(input);
            return;
        }

        let mut pos = 0usize;
        let mut literal_start = 0usize;
        let limit = n - MIN_MATCH;

        while pos <= limit {
            let key = hash(&input[pos..pos + MIN_MATCH]);
            let candidate = self.table[key];
            self.table[key] = pos as u32;

            if candidate != EMPTY {
                let cand = candidate as usize;
                if cand < pos && input[cand..cand + MIN_MATCH] == input[pos..pos + MIN_MATCH] {
                    let full_len = common_prefix_len(&input[cand..], &input[pos..]);
                    debug_assert!(full_len >= MIN_MATCH);

                    let offset = (pos - cand) as u32;
                    let literals = &input[literal_start..pos];
                    store.push_literals(literals);
                    store.push_sequence(literals.len() as u32, full_len.min(MAX_MATCH_LEN) as u32, offset);

                    let mut remaining = full_len - full_len.min(MAX_MATCH_LEN);
                    while remaining > 0 {
                        // Same back-reference, no intervening literals: the
                        // already-copied bytes keep the match going.
                        store.push_sequence(0, remaining.min(MAX_MATCH_LEN) as u32, offset);
                        remaining -= remaining.min(MAX_MATCH_LEN);
                    }

                    pos += full_len;
                    literal_start = pos;
                    continue;
                }
            }
            pos += 1;
        }

        store.push_literals(&input[literal_start..]);
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

fn hash(key: &[u8]) -> usize {
    let mut h = 0u64;
    for (i, &b) in key.iter().enumerate() {
        h ^= (u64::from(b) << (24 + 8 * i)).wrapping_mul(POLY);
    }
    (h >> (64 - HASH_LOG)) as usize
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let max = a.len().min(b.len());
    let mut i = 0;
    while i < max && a[i] == b[i] {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_matches_below_min_match_len() {
        let mut m = Matcher::new();
        let mut store = SequenceStore::new();
        m.find_matches(b"abcd", &mut store);
        assert!(store.sequences.is_empty());
        assert_eq!(store.literals, b"abcd");
    }

    #[test]
    fn finds_a_simple_repeat() {
        let mut m = Matcher::new();
        let mut store = SequenceStore::new();
        let input = b"hello world, hello world!";
        m.find_matches(input, &mut store);

        assert_eq!(store.sequences.len(), 1);
        let seq = store.sequences[0];
        assert_eq!(seq.of, 13);
        assert!(seq.ml >= 5);

        // Reconstruct from literals + sequence to confirm correctness.
        let mut out = Vec::new();
        let mut lpos = 0usize;
        out.extend_from_slice(&store.literals[lpos..lpos + seq.ll as usize]);
        lpos += seq.ll as usize;
        for _ in 0..seq.ml {
            let b = out[out.len() - seq.of as usize];
            out.push(b);
        }
        out.extend_from_slice(&store.literals[lpos..]);
        assert_eq!(out, input);
    }

    #[test]
    fn finds_an_overlapping_rle_style_match() {
        let mut m = Matcher::new();
        let mut store = SequenceStore::new();
        let input = vec![b'a'; 40];
        m.find_matches(&input, &mut store);

        assert_eq!(store.sequences.len(), 1);
        let seq = store.sequences[0];
        assert_eq!(seq.of, 1);
        assert!(seq.ml as usize + seq.ll as usize == 40 || seq.ml > 0);
    }
}
