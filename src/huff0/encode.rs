use std::collections::VecDeque;

use crate::bitio::BitWriter;
use crate::fse::{normalize_counts, write_normalized_counts, FseEncodeTable, FseEncoder};

#[derive(Clone, Copy, Debug, Default)]
struct Code {
    bits: u32,
    num_bits: u8,
}

/// A canonical Huffman table built from a symbol histogram, ready to encode.
/// Depth-limited tree-join construction:
/// join the two smallest frontiers, then repay any code length that
/// overshoots `max_num_bits` by deepening shallower codes.
#[derive(Clone, Debug)]
pub struct HuffmanEncodeTable {
    codes: Vec<Code>,
    weights: Vec<u8>,
    max_num_bits: u8,
}

struct TreeNode {
    weight: u64,
    symbol: Option<u8>,
    left: usize,
    right: usize,
}

impl HuffmanEncodeTable {
    pub fn max_num_bits(&self) -> u8 {
        self.max_num_bits
    }

    /// Weights for symbols `0..maxSymbol`; the table serializer omits the
    /// last one (its weight is always derivable from the others).
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    pub fn build(counts: &[usize], max_num_bits: u8) -> Self {
        let symbols: Vec<(u8, usize)> = counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(s, &c)| (s as u8, c))
            .collect();
        assert!(!symbols.is_empty(), "cannot build a huffman table with no symbols");

        let max_symbol_plus_one = counts.iter().rposition(|&c| c > 0).map(|p| p + 1).unwrap_or(0);

        if symbols.len() == 1 {
            let mut lengths = vec![0u8; max_symbol_plus_one];
            lengths[symbols[0].0 as usize] = 1;
            return Self::from_lengths(&lengths);
        }

        let lengths = build_code_lengths(&symbols, max_num_bits, max_symbol_plus_one);
        Self::from_lengths(&lengths)
    }

    fn from_lengths(lengths: &[u8]) -> Self {
        let max_len = lengths.iter().copied().max().unwrap_or(1).max(1);
        let weights: Vec<u8> = lengths
            .iter()
            .map(|&l| if l == 0 { 0 } else { max_len + 1 - l })
            .collect();

        let mut codes = vec![Code::default(); lengths.len()];
        let mut by_rank: Vec<Vec<u8>> = vec![Vec::new(); max_len as usize + 1];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                by_rank[len as usize].push(symbol as u8);
            }
        }

        // Canonical assignment from the longest rank down: sequential codes
        // within a rank, the rolling value halves when the rank shortens.
        let mut code = 0u32;
        for len in (1..=max_len).rev() {
            for &symbol in &by_rank[len as usize] {
                codes[symbol as usize] = Code { bits: code, num_bits: len };
                code += 1;
            }
            code >>= 1;
        }

        Self {
            codes,
            weights,
            max_num_bits: max_len,
        }
    }

    pub fn encode_symbol(&self, symbol: u8, writer: &mut BitWriter) {
        let code = self.codes[symbol as usize];
        writer.write_bits_64(code.bits as u64, code.num_bits as usize);
    }
}

fn build_code_lengths(symbols: &[(u8, usize)], max_num_bits: u8, alphabet_size: usize) -> Vec<u8> {
    let mut sorted = symbols.to_vec();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut nodes: Vec<TreeNode> = sorted
        .iter()
        .map(|&(symbol, count)| TreeNode {
            weight: count as u64,
            symbol: Some(symbol),
            left: usize::MAX,
            right: usize::MAX,
        })
        .collect();

    let mut leaves: VecDeque<usize> = (0..nodes.len()).collect();
    let mut internal: VecDeque<usize> = VecDeque::new();

    while leaves.len() + internal.len() > 1 {
        let a = pop_smallest(&mut leaves, &mut internal, &nodes);
        let b = pop_smallest(&mut leaves, &mut internal, &nodes);
        let weight = nodes[a].weight + nodes[b].weight;
        let idx = nodes.len();
        nodes.push(TreeNode {
            weight,
            symbol: None,
            left: a,
            right: b,
        });
        internal.push_back(idx);
    }

    let root = nodes.len() - 1;
    let mut lengths = vec![0u8; alphabet_size];
    assign_depths(&nodes, root, 0, &mut lengths);

    cap_lengths(&mut lengths, &sorted, max_num_bits);
    lengths
}

fn pop_smallest(leaves: &mut VecDeque<usize>, internal: &mut VecDeque<usize>, nodes: &[TreeNode]) -> usize {
    match (leaves.front(), internal.front()) {
        (Some(&l), Some(&i)) => {
            if nodes[l].weight <= nodes[i].weight {
                leaves.pop_front().unwrap()
            } else {
                internal.pop_front().unwrap()
            }
        }
        (Some(_), None) => leaves.pop_front().unwrap(),
        (None, Some(_)) => internal.pop_front().unwrap(),
        (None, None) => unreachable!("ran out of nodes before the huffman tree closed"),
    }
}

fn assign_depths(nodes: &[TreeNode], idx: usize, depth: u8, lengths: &mut [u8]) {
    let node = &nodes[idx];
    if let Some(symbol) = node.symbol {
        lengths[symbol as usize] = depth.max(1);
        return;
    }
    assign_depths(nodes, node.left, depth + 1, lengths);
    assign_depths(nodes, node.right, depth + 1, lengths);
}

/// Clip any code length over `max_num_bits` and repay the cost by deepening
/// shallower codes (`rankLast` stack, both `totalCost > 0` and `< 0`
/// branches — skipping either produces an invalid table).
fn cap_lengths(lengths: &mut [u8], sorted: &[(u8, usize)], max_num_bits: u8) {
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    if max_len <= max_num_bits {
        return;
    }

    let mut total_cost: i64 = 0;
    for &(symbol, _) in sorted {
        let len = &mut lengths[symbol as usize];
        if *len > max_num_bits {
            total_cost += (1i64 << (*len - max_num_bits - 1)) - 1;
            *len = max_num_bits;
        }
    }

    let mut rank_last: Vec<Option<usize>> = vec![None; max_num_bits as usize + 1];
    for (i, &(symbol, _)) in sorted.iter().enumerate() {
        let len = lengths[symbol as usize];
        if len > 0 && len <= max_num_bits {
            let n = max_num_bits - len;
            if (n as usize) < rank_last.len() {
                rank_last[n as usize] = Some(i);
            }
        }
    }

    while total_cost > 0 {
        let mut n = 1u8;
        while n <= max_num_bits && rank_last[n as usize].is_none() {
            n += 1;
        }
        if n > max_num_bits {
            break;
        }
        let i = rank_last[n as usize].unwrap();
        let symbol = sorted[i].0;
        lengths[symbol as usize] += 1;
        total_cost -= 1i64 << (n - 1);

        rank_last[n as usize] = if i == 0 {
            None
        } else if lengths[sorted[i - 1].0 as usize] == max_num_bits - n {
            Some(i - 1)
        } else {
            None
        };
    }

    while total_cost < 0 {
        let n = (1..=max_num_bits)
            .find(|&n| rank_last[n as usize].is_some())
            .expect("a deepened symbol must still be available to shorten");
        let i = rank_last[n as usize].unwrap();
        let symbol = sorted[i].0;
        lengths[symbol as usize] -= 1;
        total_cost += 1i64 << (n - 1);
        rank_last[n as usize] = if i == 0 { None } else { Some(i - 1) };
    }
}

/// Serialize a weight table: prefer FSE compression when it
/// pays for itself (strictly smaller than raw and under 127 bytes), else
/// fall back to 4-bit-per-symbol raw encoding.
pub fn write_weights(weights: &[u8], max_symbol_plus_one: usize) -> Vec<u8> {
    // The last symbol's weight is implicit and never serialized.
    let to_serialize = &weights[..max_symbol_plus_one - 1];

    let mut counts = [0usize; 16];
    for &w in to_serialize {
        counts[w as usize] += 1;
    }
    let distinct = counts.iter().filter(|&&c| c > 0).count();

    if distinct > 1 {
        let (probs, acc_log) = normalize_counts(&counts, super::MAX_WEIGHTS_TABLE_LOG);
        let enc_table = FseEncodeTable::from_probabilities(&probs, acc_log);

        let mut body = BitWriter::new();
        FseEncoder::new(&enc_table).encode(to_serialize, &mut body);
        body.write_bits(1, 1);

        let mut header = BitWriter::new();
        write_normalized_counts(&mut header, &probs, acc_log);
        let mut bytes = header.dump();
        bytes.extend(body.dump());

        if bytes.len() > 1 && bytes.len() <= to_serialize.len() / 2 && bytes.len() <= 127 {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(bytes.len() as u8);
            out.extend(bytes);
            return out;
        }
    }

    let mut out = Vec::with_capacity(1 + to_serialize.len().div_ceil(2));
    out.push(127 + to_serialize.len() as u8);
    for pair in to_serialize.chunks(2) {
        let hi = pair[0] & 0xF;
        let lo = pair.get(1).copied().unwrap_or(0) & 0xF;
        out.push((hi << 4) | lo);
    }
    out
}

/// Encode a single independent Huffman stream. Symbols are processed in
/// reverse so that a backward reader recovers them in original order, the
/// same reverse-write/forward-read duality `fse::encode` relies on.
pub fn encode_stream(table: &HuffmanEncodeTable, data: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for &symbol in data.iter().rev() {
        table.encode_symbol(symbol, &mut writer);
    }
    writer.write_bits(1, 1);
    writer.dump()
}

/// Encode the 4-stream jump-table layout: four independently-coded quarters
/// (the last absorbing any remainder) behind a 6-byte length header.
pub fn encode_4streams(table: &HuffmanEncodeTable, data: &[u8]) -> Vec<u8> {
    let stream_len = data.len().div_ceil(4);
    let (s1, rest) = data.split_at(stream_len);
    let (s2, rest) = rest.split_at(stream_len);
    let (s3, s4) = rest.split_at(stream_len);

    let e1 = encode_stream(table, s1);
    let e2 = encode_stream(table, s2);
    let e3 = encode_stream(table, s3);
    let e4 = encode_stream(table, s4);

    let mut out = Vec::with_capacity(6 + e1.len() + e2.len() + e3.len() + e4.len());
    out.extend_from_slice(&(e1.len() as u16).to_le_bytes());
    out.extend_from_slice(&(e2.len() as u16).to_le_bytes());
    out.extend_from_slice(&(e3.len() as u16).to_le_bytes());
    out.extend(e1);
    out.extend(e2);
    out.extend(e3);
    out.extend(e4);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitReaderReversed;
    use crate::huff0::HuffmanDecodeTable;

    #[test]
    fn round_trips_a_single_stream() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut counts = [0usize; 256];
        for &b in data {
            counts[b as usize] += 1;
        }
        let max_symbol_plus_one = counts.iter().rposition(|&c| c > 0).unwrap() + 1;
        let enc_table = HuffmanEncodeTable::build(&counts, 11);

        let weight_bytes = write_weights(enc_table.weights(), max_symbol_plus_one);
        let stream = encode_stream(&enc_table, data);

        let mut dec_table = HuffmanDecodeTable::new();
        let consumed = dec_table.build(&weight_bytes).unwrap();
        assert_eq!(consumed, weight_bytes.len());

        let decoded = super::super::decode_stream(&dec_table, &stream, data.len()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn single_symbol_alphabet_gets_one_bit_codes() {
        let mut counts = [0usize; 256];
        counts[b'x' as usize] = 5;
        let enc_table = HuffmanEncodeTable::build(&counts, 11);
        assert_eq!(enc_table.codes[b'x' as usize].num_bits, 1);
    }

    #[test]
    fn bit_reader_accepts_the_written_stream() {
        let mut counts = [0usize; 256];
        counts[0] = 1;
        counts[1] = 1;
        let enc_table = HuffmanEncodeTable::build(&counts, 11);
        let stream = encode_stream(&enc_table, &[0, 1, 0, 1]);
        let mut br = BitReaderReversed::new(&stream);
        // Just confirm the sentinel/padding can be found; full round trip is
        // exercised above with a real Huffman table.
        let mut skipped = 0;
        loop {
            let bit = br.get_bits(1).unwrap();
            skipped += 1;
            if bit == 1 || skipped > 8 {
                break;
            }
        }
        assert!(skipped <= 8);
    }
}
