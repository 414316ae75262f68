#![deny(trivial_casts, trivial_numeric_casts, rust_2018_idioms)]

mod bitio;
pub mod blocks;
mod block_compressor;
pub mod compressor;
pub mod decompressor;
pub mod error;
mod execution;
pub mod frame;
pub mod fse;
pub mod huff0;
mod literals_codec;
mod matcher;
mod repeated_offsets;
mod sequences;
#[cfg(test)]
mod tests;
mod xxhash64;

pub const VERBOSE: bool = false;

pub use compressor::{CompressionLevel, Compressor};
pub use decompressor::Decompressor;
pub use error::{CompressError, DecompressError};

/// Reads just a frame's header and returns its declared content size,
/// `None` when the frame doesn't declare one.
pub fn get_decompressed_size(input: &[u8]) -> Result<Option<u64>, DecompressError> {
    Decompressor::get_decompressed_size(input)
}
