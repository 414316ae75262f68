//! Bit-level stream primitives shared by the FSE and Huffman coders.
//!
//! Zstandard's entropy streams are read backwards (from the last byte
//! towards the first) and written forwards, so the two directions get
//! distinct types instead of one bidirectional abstraction.

mod forward;
mod reverse;
mod writer;

pub use forward::{BitReaderForward, GetBitsForwardError};
pub use reverse::{BitReaderReversed, GetBitsError};
pub use writer::BitWriter;
