//! Round-trip and interop tests exercising the public `Compressor`/
//! `Decompressor` pair against both itself and a real Zstandard
//! implementation, colocated the way module-level round-trip tests are
//! (`zstd::stream::copy_decode`/`encode_all` as an oracle).
