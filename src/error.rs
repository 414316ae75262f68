//! Error types at the public API boundary and the per-module parse errors
//! that compose into them.

use crate::blocks::{BlockHeaderError, LiteralsSectionError, SequencesHeaderError};
use crate::frame::FrameHeaderError;
use crate::fse::FseTableError;
use crate::huff0::HuffmanTableError;

/// Everything that can go wrong while decompressing: a malformed frame, a
/// bounds violation, or a caller-supplied output buffer that is too small.
#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("malformed input at byte offset {offset}: {message}")]
    Malformed { offset: usize, message: String },

    #[error(transparent)]
    FrameHeader(#[from] FrameHeaderError),

    #[error(transparent)]
    BlockHeader(#[from] BlockHeaderError),

    #[error(transparent)]
    LiteralsSection(#[from] LiteralsSectionError),

    #[error(transparent)]
    SequencesHeader(#[from] SequencesHeaderError),

    #[error(transparent)]
    FseTable(#[from] FseTableError),

    #[error(transparent)]
    HuffmanTable(#[from] HuffmanTableError),

    #[error("checksum mismatch: frame declared {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("output buffer too small: need at least {needed} bytes, got {got}")]
    OutputTooSmall { needed: usize, got: usize },
}

impl DecompressError {
    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        DecompressError::Malformed {
            offset,
            message: message.into(),
        }
    }
}

/// Everything that can go wrong while compressing. Unlike `DecompressError`
/// this is always raised before any byte of output is written.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("output buffer too small: need at least {needed} bytes, got {got}")]
    OutputTooSmall { needed: usize, got: usize },

    #[error("input is {len} bytes but the window ceiling is {max} bytes")]
    InputTooLarge { len: usize, max: usize },
}
