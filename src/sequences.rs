//! Sequence store: accumulates one block's literals and
//! `(literalsLength, matchLength, offset)` triples, then serializes the
//! sequences section (or parses one back out) by driving three interleaved
//! FSE channels over a single shared bitstream.
//!
//! Built on `fse::FseEncodeTable`/`FseDecodeTable` for
//! the per-channel state machinery, with the channel interleave order taken
//! per the FSE state-ordering rule for sequence decode init: init
//! reads LL, then OF, then ML; each sequence's extra bits read OF, then ML,
//! then LL; state refresh updates LL, then ML, then OF. The encoder mirrors
//! this by writing every group in the exact reverse of that order, the same
//! reverse-write/forward-read duality `fse::encode` relies on for a single
//! channel.

use crate::bitio::{BitReaderReversed, BitWriter};
use crate::blocks::sequence_section::{CompressionModes, ModeType, Sequence, SequencesHeader};
use crate::fse::code_tables::{code_for_literals_length, code_for_match_length, code_for_offset};
use crate::fse::{
    code_tables, next_position as _, normalize_counts, predefined, write_normalized_counts,
    FseDecodeTable, FseDecoder, FseEncodeTable, FseTableError, LL_MAX_LOG, ML_MAX_LOG, OF_MAX_LOG,
};

/// One block's worth of literals plus the sequence triples that reference
/// them. Cleared and reused across blocks within a frame.
#[derive(Default)]
pub struct SequenceStore {
    pub literals: Vec<u8>,
    pub sequences: Vec<Sequence>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.literals.clear();
        self.sequences.clear();
    }

    pub fn push_literals(&mut self, data: &[u8]) {
        self.literals.extend_from_slice(data);
    }

    pub fn push_sequence(&mut self, ll: u32, ml: u32, of: u32) {
        self.sequences.push(Sequence { ll, ml, of });
    }
}

/// The three installed per-channel decode tables, persisted across blocks
/// within a frame so `REPEAT` mode has something to reuse.
#[derive(Default)]
pub struct ChannelTables {
    pub ll: FseDecodeTable,
    pub ml: FseDecodeTable,
    pub of: FseDecodeTable,
}

impl ChannelTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.ll.reset();
        self.ml.reset();
        self.of.reset();
    }
}

/// Parse the sequences section (header + per-channel tables + bitstream)
/// and return the decoded triples. `tables` carries `REPEAT`-mode state
/// across blocks; `offsets` carries the repeated-offset history across
/// blocks within a frame the same way, and must only be reset between
/// frames.
pub fn decode_sequences_section(
    source: &[u8],
    tables: &mut ChannelTables,
    offsets: &mut crate::repeated_offsets::Offsets,
) -> Result<(Vec<Sequence>, usize), FseTableError> {
    let header =
        SequencesHeader::decode(source).map_err(|_| FseTableError::HeaderTruncated)?;
    let mut pos = header.header_size as usize;

    if header.num_sequences == 0 {
        return Ok((Vec::new(), pos));
    }

    let ll_bytes = load_channel(
        header.modes.ll_mode(),
        &source[pos..],
        &mut tables.ll,
        predefined::LITERALS_LENGTH_LOG,
        predefined::LITERALS_LENGTH,
        LL_MAX_LOG,
    )?;
    pos += ll_bytes;

    let of_bytes = load_channel(
        header.modes.of_mode(),
        &source[pos..],
        &mut tables.of,
        predefined::OFFSET_LOG,
        predefined::OFFSET,
        OF_MAX_LOG,
    )?;
    pos += of_bytes;

    let ml_bytes = load_channel(
        header.modes.ml_mode(),
        &source[pos..],
        &mut tables.ml,
        predefined::MATCH_LENGTH_LOG,
        predefined::MATCH_LENGTH,
        ML_MAX_LOG,
    )?;
    pos += ml_bytes;

    let bitstream = &source[pos..];
    let triples = decode_bitstream(bitstream, header.num_sequences, tables, offsets)?;
    Ok((triples, source.len()))
}

fn load_channel(
    mode: ModeType,
    source: &[u8],
    table: &mut FseDecodeTable,
    predefined_log: u8,
    predefined_probs: &[i32],
    max_log: u8,
) -> Result<usize, FseTableError> {
    match mode {
        ModeType::Predefined => {
            table.build_from_probabilities(predefined_log, predefined_probs)?;
            Ok(0)
        }
        ModeType::Rle => {
            let &symbol = source.first().ok_or(FseTableError::HeaderTruncated)?;
            table.build_rle(symbol);
            Ok(1)
        }
        ModeType::FseCompressed => table.build_from_header(source, max_log),
        ModeType::Repeat => {
            if !table.is_built() {
                return Err(FseTableError::TableNotBuilt);
            }
            Ok(0)
        }
    }
}

/// Decode the interleaved three-channel bitstream. See the module docs for
/// the exact read order this mirrors. `offsets` is the frame's running
/// repeated-offset history, threaded in rather than reset here, since a
/// repeat-offset code in block N>0 resolves against history left over from
/// earlier blocks in the same frame.
fn decode_bitstream(
    bitstream: &[u8],
    num_sequences: u32,
    tables: &ChannelTables,
    offsets: &mut crate::repeated_offsets::Offsets,
) -> Result<Vec<Sequence>, FseTableError> {
    let mut br = BitReaderReversed::new(bitstream);

    let mut ll_dec = FseDecoder::new(&tables.ll);
    let mut of_dec = FseDecoder::new(&tables.of);
    let mut ml_dec = FseDecoder::new(&tables.ml);
    ll_dec.init_state(&mut br)?;
    of_dec.init_state(&mut br)?;
    ml_dec.init_state(&mut br)?;

    let mut sequences = Vec::with_capacity(num_sequences as usize);

    for i in 0..num_sequences {
        let ll_code = ll_dec.decode_symbol();
        let of_code = of_dec.decode_symbol();
        let ml_code = ml_dec.decode_symbol();

        let of_extra_bits = code_tables::offset_extra_bits(of_code);
        let of_extra = br
            .get_bits(of_extra_bits as usize)
            .map_err(|_| FseTableError::HeaderTruncated)? as u32;
        let wire_offset = (1u32 << of_code) + of_extra;

        let ml_extra_bits = code_tables::MATCH_LENGTH_EXTRA_BITS[ml_code as usize];
        let ml_extra = br
            .get_bits(ml_extra_bits as usize)
            .map_err(|_| FseTableError::HeaderTruncated)? as u32;
        let ml = code_tables::MATCH_LENGTH_BASE[ml_code as usize] + ml_extra;

        let ll_extra_bits = code_tables::LITERALS_LENGTH_EXTRA_BITS[ll_code as usize];
        let ll_extra = br
            .get_bits(ll_extra_bits as usize)
            .map_err(|_| FseTableError::HeaderTruncated)? as u32;
        let ll = code_tables::LITERALS_LENGTH_BASE[ll_code as usize] + ll_extra;

        let of = crate::repeated_offsets::resolve(wire_offset, ll, offsets);
        sequences.push(Sequence { ll, ml, of });

        if i != num_sequences - 1 {
            ll_dec.update_state(&mut br)?;
            ml_dec.update_state(&mut br)?;
            of_dec.update_state(&mut br)?;
        }
    }

    Ok(sequences)
}

/// Build the sequences section from a store's triples: derives per-channel
/// codes, normalizes histograms into fresh FSE tables (RLE when a channel is
/// constant, else FSE-compressed; this implementation never emits
/// `PREDEFINED` or `REPEAT`), and writes the interleaved bitstream.
pub fn encode_sequences_section(store: &SequenceStore, offsets: &mut crate::repeated_offsets::Offsets) -> Vec<u8> {
    let n = store.sequences.len();
    if n == 0 {
        return SequencesHeader::encode(0, CompressionModes::new(ModeType::Predefined, ModeType::Predefined, ModeType::Predefined));
    }

    let mut ll_codes = Vec::with_capacity(n);
    let mut ml_codes = Vec::with_capacity(n);
    let mut of_codes = Vec::with_capacity(n);
    let mut extras = Vec::with_capacity(n);

    for seq in &store.sequences {
        let (ll_code, ll_extra, ll_bits) = code_for_literals_length(seq.ll);
        let (ml_code, ml_extra, ml_bits) = code_for_match_length(seq.ml);
        let wire_offset = crate::repeated_offsets::encode_offset(seq.of, seq.ll, offsets);
        let (of_code, of_extra, of_bits) = code_for_offset(wire_offset);

        ll_codes.push(ll_code);
        ml_codes.push(ml_code);
        of_codes.push(of_code);
        extras.push((of_extra, of_bits, ml_extra, ml_bits, ll_extra, ll_bits));
    }

    let (ll_mode, ll_table, ll_header) = build_channel_table(&ll_codes, LL_MAX_LOG);
    let (ml_mode, ml_table, ml_header) = build_channel_table(&ml_codes, ML_MAX_LOG);
    let (of_mode, of_table, of_header) = build_channel_table(&of_codes, OF_MAX_LOG);

    let modes = CompressionModes::new(ll_mode, of_mode, ml_mode);
    let mut out = SequencesHeader::encode(n as u32, modes);
    out.extend(ll_header);
    out.extend(of_header);
    out.extend(ml_header);
    out.extend(encode_bitstream(
        &ll_table, &ll_codes, &ml_table, &ml_codes, &of_table, &of_codes, &extras,
    ));
    out
}

/// Pick RLE (every code identical) or fresh FSE-compressed, returning the
/// mode tag, the encode table to drive the bitstream, and the header bytes
/// (the RLE byte or the normalized-count header) to splice into the section.
fn build_channel_table(codes: &[u8], max_log: u8) -> (ModeType, FseEncodeTable, Vec<u8>) {
    let alphabet_size = 256;
    let first = codes[0];
    if codes.iter().all(|&c| c == first) {
        let table = FseEncodeTable::build_rle(first, alphabet_size);
        return (ModeType::Rle, table, vec![first]);
    }

    let mut counts = vec![0usize; alphabet_size];
    for &c in codes {
        counts[c as usize] += 1;
    }
    let (probs, acc_log) = normalize_counts(&counts, max_log);
    let table = FseEncodeTable::from_probabilities(&probs, acc_log);

    let mut writer = BitWriter::new();
    write_normalized_counts(&mut writer, &probs, acc_log);
    (ModeType::FseCompressed, table, writer.dump())
}

#[allow(clippy::too_many_arguments)]
fn encode_bitstream(
    ll_table: &FseEncodeTable,
    ll_codes: &[u8],
    ml_table: &FseEncodeTable,
    ml_codes: &[u8],
    of_table: &FseEncodeTable,
    of_codes: &[u8],
    extras: &[(u32, u8, u32, u8, u32, u8)],
) -> Vec<u8> {
    let n = ll_codes.len();
    let mut writer = BitWriter::new();

    let mut ll_state = ll_table.start_index(ll_codes[n - 1]);
    let mut ml_state = ml_table.start_index(ml_codes[n - 1]);
    let mut of_state = of_table.start_index(of_codes[n - 1]);

    // Last sequence: no refresh follows it, only its extra bits, written in
    // the reverse of their read order (OF, ML, LL) -> (LL, ML, OF).
    let (of_extra, of_bits, ml_extra, ml_bits, ll_extra, ll_bits) = extras[n - 1];
    writer.write_bits_64(ll_extra as u64, ll_bits as usize);
    writer.write_bits_64(ml_extra as u64, ml_bits as usize);
    writer.write_bits_64(of_extra as u64, of_bits as usize);

    for i in (0..n - 1).rev() {
        let ll_next = ll_table.state_at(ll_codes[i], ll_state);
        let ml_next = ml_table.state_at(ml_codes[i], ml_state);
        let of_next = of_table.state_at(of_codes[i], of_state);

        // Refresh read order is LL, ML, OF; write the reverse: OF, ML, LL.
        writer.write_bits_64((of_state - of_next.baseline) as u64, of_next.num_bits as usize);
        writer.write_bits_64((ml_state - ml_next.baseline) as u64, ml_next.num_bits as usize);
        writer.write_bits_64((ll_state - ll_next.baseline) as u64, ll_next.num_bits as usize);

        ll_state = ll_next.index;
        ml_state = ml_next.index;
        of_state = of_next.index;

        let (of_extra, of_bits, ml_extra, ml_bits, ll_extra, ll_bits) = extras[i];
        writer.write_bits_64(ll_extra as u64, ll_bits as usize);
        writer.write_bits_64(ml_extra as u64, ml_bits as usize);
        writer.write_bits_64(of_extra as u64, of_bits as usize);
    }

    // Init read order is LL, OF, ML; write the reverse: ML, OF, LL.
    writer.write_bits_64(ml_state as u64, ml_table.accuracy_log() as usize);
    writer.write_bits_64(of_state as u64, of_table.accuracy_log() as usize);
    writer.write_bits_64(ll_state as u64, ll_table.accuracy_log() as usize);

    writer.write_bits(1, 1);
    writer.dump()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> SequenceStore {
        let mut store = SequenceStore::new();
        store.push_literals(b"hello hello hello world");
        store.push_sequence(5, 6, 1); // "hello " repeat, rep0 after first literal offset
        store.push_sequence(0, 6, 1); // another repeat
        store.push_sequence(5, 4, 9); // literal offset into "world"-ish distance
        store
    }

    #[test]
    fn round_trips_a_small_sequence_set() {
        let store = sample_store();
        let mut enc_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let bytes = encode_sequences_section(&store, &mut enc_offsets);

        let mut tables = ChannelTables::new();
        let mut dec_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let (decoded, consumed) = decode_sequences_section(&bytes, &mut tables, &mut dec_offsets).unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.len(), store.sequences.len());
        for (got, want) in decoded.iter().zip(store.sequences.iter()) {
            assert_eq!(got.ll, want.ll);
            assert_eq!(got.ml, want.ml);
            assert_eq!(got.of, want.of);
        }
    }

    #[test]
    fn empty_store_encodes_a_bare_zero_count() {
        let store = SequenceStore::new();
        let mut offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let bytes = encode_sequences_section(&store, &mut offsets);
        assert_eq!(bytes, vec![0]);

        let mut tables = ChannelTables::new();
        let mut dec_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let (decoded, consumed) = decode_sequences_section(&bytes, &mut tables, &mut dec_offsets).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn single_sequence_round_trips() {
        let mut store = SequenceStore::new();
        store.push_literals(b"abcdef");
        store.push_sequence(6, 0, 0);
        let mut enc_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let bytes = encode_sequences_section(&store, &mut enc_offsets);

        let mut tables = ChannelTables::new();
        let mut dec_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let (decoded, _) = decode_sequences_section(&bytes, &mut tables, &mut dec_offsets).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].ll, 6);
    }

    #[test]
    fn repeated_offset_history_carries_across_blocks() {
        let mut first_store = SequenceStore::new();
        first_store.push_literals(b"abcdef");
        first_store.push_sequence(6, 4, 9);

        let mut second_store = SequenceStore::new();
        second_store.push_literals(b"gh");
        second_store.push_sequence(2, 4, 9); // repeat-code 1: resolves to off1 from block 1

        let mut enc_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let first_bytes = encode_sequences_section(&first_store, &mut enc_offsets);
        let second_bytes = encode_sequences_section(&second_store, &mut enc_offsets);

        let mut tables = ChannelTables::new();
        let mut dec_offsets = crate::repeated_offsets::INITIAL_OFFSETS;
        let (first_decoded, _) =
            decode_sequences_section(&first_bytes, &mut tables, &mut dec_offsets).unwrap();
        assert_eq!(first_decoded[0].of, 9);

        // A fresh `ChannelTables` per block (this implementation never emits
        // REPEAT mode) but the same `dec_offsets`, carried forward exactly as
        // `Decompressor::decode_frame` carries it across blocks.
        let mut tables = ChannelTables::new();
        let (second_decoded, _) =
            decode_sequences_section(&second_bytes, &mut tables, &mut dec_offsets).unwrap();
        assert_eq!(second_decoded[0].of, 9);
    }
}
