//! Canonical Huffman coding for the literals section: depth-limited table
//! construction, weight (de)serialization via FSE or raw nibbles, and the
//! table-driven flat decode/encode used for single- and 4-stream literals.
//!
//! The decode table is not a prefix tree. Like zstd's own `HUF_fillDTableX1`,
//! it is a flat `1 << tableLog` array indexed by a full `tableLog`-bit
//! lookahead; a lookup yields both the symbol and the number of bits the
//! code actually used, and only that many bits are consumed.

mod decode;
mod encode;

pub use decode::{decode_4streams, decode_stream, HuffmanDecodeTable, HuffmanDecoder};
pub use encode::{encode_4streams, encode_stream, write_weights, HuffmanEncodeTable};

pub const MAX_LITERALS_TABLE_LOG: u8 = 11;
pub const MAX_WEIGHTS_TABLE_LOG: u8 = 12;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HuffmanTableError {
    #[error("huffman weight {found} exceeds the maximum of {max}")]
    WeightTooLarge { found: u8, max: u8 },
    #[error("huffman table has no weights to build from")]
    EmptyWeights,
    #[error("leftover probability mass {found} is not a power of two")]
    LeftoverNotPowerOfTwo { found: u32 },
    #[error("derived table log {found} exceeds the maximum of {max}")]
    TableLogTooLarge { found: u8, max: u8 },
    #[error("not enough bytes to parse the huffman weight header")]
    HeaderTruncated,
    #[error(transparent)]
    FseTable(#[from] crate::fse::FseTableError),
    #[error("decoded more than 255 huffman weights")]
    TooManyWeights,
    #[error("no huffman table is currently loaded for treeless literals")]
    NoTableLoaded,
}
