//! Block-level framing: the 3-byte block header, the literals section
//! header, and the sequences section header + triples.

pub mod block;
pub mod literals_section;
pub mod sequence_section;

pub use block::{decode_block_header, encode_block_header, BlockHeader, BlockHeaderError, BlockType};
pub use literals_section::{LiteralsSectionError, LiteralsSectionHeader, LiteralsSectionType};
pub use sequence_section::{
    CompressionModes, ModeType, Sequence, SequencesHeader, SequencesHeaderError,
};
