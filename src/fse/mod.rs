//! Finite State Entropy (FSE): table construction from normalized counts,
//! a normalized-count header reader/writer, and the paired encoder/decoder.
//!
//! Used directly for the three sequence-code channels, and indirectly by
//! `huff0` to compress Huffman weight arrays.

mod decode;
mod encode;

pub use decode::{FseDecodeTable, FseDecoder};
pub use encode::{FseEncodeTable, FseEncoder};

/// Accuracy log ceiling for each sequence channel (spec constants).
pub const LL_MAX_LOG: u8 = 9;
pub const ML_MAX_LOG: u8 = 9;
pub const OF_MAX_LOG: u8 = 8;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FseTableError {
    #[error("FSE accuracy log {found} exceeds the maximum allowed here ({max})")]
    AccuracyLogTooLarge { found: u8, max: u8 },
    #[error("FSE accuracy log must be at least 1")]
    AccuracyLogZero,
    #[error("normalized counts summed to {found}, expected {expected}")]
    ProbabilitySumMismatch { found: u32, expected: u32 },
    #[error("distribution declares {found} symbols, maximum is 256")]
    TooManySymbols { found: usize },
    #[error("ran out of input while reading the normalized-count header")]
    HeaderTruncated,
    #[error("tried to decode with a table that was never built")]
    TableNotBuilt,
}

impl From<crate::bitio::GetBitsForwardError> for FseTableError {
    fn from(_: crate::bitio::GetBitsForwardError) -> Self {
        FseTableError::HeaderTruncated
    }
}

/// The position-stepping function used both to expand a decode table and to
/// lay out encoder states: `pos = (pos + tableSize/2 + tableSize/8 + 3) mod
/// tableSize`.
pub(crate) fn next_position(mut p: usize, table_size: usize) -> usize {
    p += (table_size >> 1) + (table_size >> 3) + 3;
    p &= table_size - 1;
    p
}

pub(crate) fn highest_bit_set(x: u32) -> u32 {
    assert!(x > 0, "highest_bit_set is undefined for zero");
    32 - x.leading_zeros()
}

/// Hard-coded normalized-count distributions for the PREDEFINED sequence
/// mode, taken straight from the Zstandard frame format.
pub mod predefined {
    pub const LITERALS_LENGTH_LOG: u8 = 6;
    pub const MATCH_LENGTH_LOG: u8 = 6;
    pub const OFFSET_LOG: u8 = 5;

    pub const LITERALS_LENGTH: &[i32] = &[
        4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1,
        1, 1, -1, -1, -1, -1,
    ];

    pub const MATCH_LENGTH: &[i32] = &[
        1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
    ];

    pub const OFFSET: &[i32] = &[
        1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1,
        -1,
    ];
}

/// Fixed tables used to expand a decoded match-length / literals-length /
/// offset *code* into `(baseValue, extraBits)`.
pub mod code_tables {
    pub const LITERALS_LENGTH_BASE: [u32; 36] = [
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24, 28, 32, 40, 48,
        64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
    ];
    pub const LITERALS_LENGTH_EXTRA_BITS: [u8; 36] = [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 6, 7, 8, 9, 10,
        11, 12, 13, 14, 15, 16,
    ];

    pub const MATCH_LENGTH_BASE: [u32; 53] = [
        3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26,
        27, 28, 29, 30, 31, 32, 33, 34, 35, 37, 39, 41, 43, 47, 51, 59, 67, 83, 99, 131, 163, 227,
        259, 515, 1027, 2051, 4099, 8195, 16387,
    ];
    pub const MATCH_LENGTH_EXTRA_BITS: [u8; 53] = [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 1, 1, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 16,
    ];

    /// `offset = (1 << offsetCode) + extraBits`; offset codes have no fixed
    /// base table, the code itself is the number of extra bits to read.
    pub fn offset_extra_bits(code: u8) -> u32 {
        code as u32
    }

    /// Encode-side inverse of the literals-length base table: the code whose
    /// base is the largest one not exceeding `value`, plus the extra bits
    /// needed to recover `value` exactly.
    pub fn code_for_literals_length(value: u32) -> (u8, u32, u8) {
        let code = LITERALS_LENGTH_BASE
            .iter()
            .rposition(|&base| base <= value)
            .unwrap_or(0);
        (
            code as u8,
            value - LITERALS_LENGTH_BASE[code],
            LITERALS_LENGTH_EXTRA_BITS[code],
        )
    }

    pub fn code_for_match_length(value: u32) -> (u8, u32, u8) {
        let code = MATCH_LENGTH_BASE
            .iter()
            .rposition(|&base| base <= value)
            .unwrap_or(0);
        (
            code as u8,
            value - MATCH_LENGTH_BASE[code],
            MATCH_LENGTH_EXTRA_BITS[code],
        )
    }

    /// `offset` is always `>= 1`; the code is its bit length minus one, i.e.
    /// the position of its highest set bit.
    pub fn code_for_offset(offset: u32) -> (u8, u32, u8) {
        debug_assert!(offset >= 1);
        let code = super::highest_bit_set(offset) as u8 - 1;
        let base = 1u32 << code;
        (code, offset - base, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_decode_tables_agree() {
        let probs = &[0, 0, -1, 3, 2, 2, (1 << 6) - 8];
        let dec_table = FseDecodeTable::from_probabilities(6, probs).unwrap();
        let enc_table = FseEncodeTable::from_probabilities(probs, 6);

        for (idx, entry) in dec_table.entries().iter().enumerate() {
            let enc_state = enc_table.state_at(entry.symbol, idx);
            assert_eq!(enc_state.baseline, entry.base_line as usize);
            assert_eq!(enc_state.num_bits, entry.num_bits);
        }
    }
}
