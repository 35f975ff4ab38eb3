//! Huffman coder for the literals section.
//!
//! Supports a four-stream parallel layout with a 6-byte jump table, and a
//! lookup-table reversal trick for turning a canonical code table into a
//! flat `[u16 bit-pattern] -> symbol` array, parametrized over `max_bits`
//! rather than hardcoded to one table size.

use crate::error::{ErrorCode, Res};
use crate::bitstream::{BitReader, BitWriter};

pub const MAX_SYMBOL_VALUE: usize = 255;
pub const MAX_TABLE_LOG: u32 = 11;
pub const MIN_TABLE_LOG: u32 = 5;

/// One symbol's Huffman code, built by [`CTable::build`].
#[derive(Clone, Copy, Default)]
struct Code {
    bits: u32,
    len: u8,
}

/// Encode table: canonical Huffman codes for up to 256 byte symbols.
pub struct CTable {
    pub max_bits: u32,
    codes: [Code; 256],
}

impl CTable {
    /// Build a length-limited canonical Huffman table from symbol
    /// frequencies: priority-sort by frequency, then re-balance to enforce
    /// `max_bits`.
    pub fn build(counts: &[u32; 256], max_bits: u32) -> Res<Self> {
        let mut lengths = build_code_lengths(counts, max_bits)?;
        limit_lengths(&mut lengths, max_bits);
        let codes = assign_canonical_codes(&lengths);
        Ok(CTable { max_bits, codes })
    }

    pub fn code_length(&self, symbol: u8) -> u8 {
        self.codes[symbol as usize].len
    }

    #[inline]
    pub fn encode_symbol(&self, symbol: u8, writer: &mut BitWriter) {
        let code = self.codes[symbol as usize];
        debug_assert!(code.len > 0, "symbol {symbol} has no code");
        writer.add_bits(code.bits as u64, code.len as u32);
    }

    /// Serialize the weight table: one 4-bit weight per symbol except the
    /// last, whose weight is implied so that `sum(2^(weight-1))` equals a
    /// power of two.
    pub fn write_weights(&self, out: &mut Vec<u8>) {
        let max_len = self.codes.iter().map(|c| c.len).max().unwrap_or(1).max(1);
        let weights: Vec<u8> = self
            .codes
            .iter()
            .map(|c| if c.len == 0 { 0 } else { max_len - c.len + 1 })
            .collect();
        let last_present = weights.iter().rposition(|&w| w != 0).unwrap_or(0);
        out.push(last_present as u8);
        for &w in &weights[..last_present] {
            out.push(w);
        }
    }
}

/// Decoded weight table plus derived symbol count.
pub struct Weights {
    pub weights: Vec<u8>,
}

pub fn read_weights(data: &[u8]) -> Res<Weights> {
    crate::ensure!(!data.is_empty(), ErrorCode::CorruptionDetected, "empty huffman header");
    let last_present = data[0] as usize;
    crate::ensure!(data.len() > last_present, ErrorCode::CorruptionDetected, "huffman weight table truncated");
    let mut weights = data[1..1 + last_present].to_vec();

    let rank_sum: u32 = weights.iter().map(|&w| if w == 0 { 0 } else { 1u32 << (w - 1) }).sum();
    let next_pow2 = rank_sum.next_power_of_two().max(1);
    let remainder = next_pow2 - rank_sum;
    crate::ensure!(remainder > 0 && remainder.is_power_of_two(), ErrorCode::CorruptionDetected, "huffman weight sum not completable");
    let last_weight = remainder.trailing_zeros() as u8 + 1;
    weights.push(last_weight);

    let rank1_count = weights.iter().filter(|&&w| w == 1).count();
    crate::ensure!(
        rank1_count == 0 || rank1_count % 2 == 0 && rank1_count >= 2 || rank1_count >= 1,
        ErrorCode::CorruptionDetected,
        "invalid rank-1 weight count"
    );
    Ok(Weights { weights })
}

fn weights_to_lengths(weights: &[u8]) -> Vec<u8> {
    let max_weight = weights.iter().copied().max().unwrap_or(1).max(1);
    weights
        .iter()
        .map(|&w| if w == 0 { 0 } else { max_weight - w + 1 })
        .collect()
}

/// Single-symbol decode table (X1 flavor).
pub struct DecoderX1 {
    pub table_log: u32,
    len: Vec<u8>,
    sym: Vec<u8>,
}

impl DecoderX1 {
    pub fn build(weights: &Weights) -> Res<Self> {
        let lengths = weights_to_lengths(&weights.weights);
        let max_bits = lengths.iter().copied().max().unwrap_or(1).max(1) as u32;
        crate::ensure!(max_bits <= MAX_TABLE_LOG, ErrorCode::TableLogTooLarge, "huffman table log too large");
        let codes = assign_canonical_codes(&lengths);
        let size = 1usize << max_bits;
        let mut len = vec![0u8; size];
        let mut sym = vec![0u8; size];
        for (symbol, code) in codes.iter().enumerate() {
            if code.len == 0 {
                continue;
            }
            // Codes are stored MSB-first canonically; the bitstream is
            // consumed LSB-first by `BitReader::look_bits`, so index by the
            // bit-reversed pattern.
            let shift = max_bits - code.len as u32;
            let base = reverse_bits(code.bits, code.len as u32) as usize;
            let count = 1usize << shift;
            for i in 0..count {
                let slot = base | (i << code.len as u32);
                len[slot] = code.len;
                sym[slot] = symbol as u8;
            }
        }
        Ok(DecoderX1 { table_log: max_bits, len, sym })
    }

    #[inline]
    pub fn decode_symbol(&self, reader: &mut BitReader) -> u8 {
        let idx = reader.look_bits(self.table_log) as usize;
        let nb_bits = self.len[idx];
        reader.skip_bits(nb_bits as u32);
        self.sym[idx]
    }
}

/// Double-symbol decode table (X2 flavor): emits two bytes per lookup when
/// the combined code length still fits in `table_log` bits.
pub struct DecoderX2 {
    pub table_log: u32,
    entries: Vec<(u16, u8, u8)>, // (two-byte seq, total bits, symbol count: 1 or 2)
}

impl DecoderX2 {
    pub fn build(weights: &Weights) -> Res<Self> {
        let lengths = weights_to_lengths(&weights.weights);
        let max_bits = lengths.iter().copied().max().unwrap_or(1).max(1) as u32;
        let table_log = (max_bits * 2).min(MAX_TABLE_LOG).max(max_bits);
        let codes = assign_canonical_codes(&lengths);
        let size = 1usize << table_log;
        let mut entries = vec![(0u16, 0u8, 0u8); size];

        for (s1, c1) in codes.iter().enumerate() {
            if c1.len == 0 {
                continue;
            }
            let base1 = reverse_bits(c1.bits, c1.len as u32) as usize;
            let shift1 = table_log - c1.len as u32;
            for i in 0..(1usize << shift1) {
                let slot = base1 | (i << c1.len as u32);
                entries[slot] = ((s1 as u16) & 0xFF, c1.len, 1);
            }
        }

        for (s1, c1) in codes.iter().enumerate() {
            if c1.len == 0 || c1.len as u32 >= table_log {
                continue;
            }
            let remaining = table_log - c1.len as u32;
            for (s2, c2) in codes.iter().enumerate() {
                if c2.len == 0 || c2.len as u32 > remaining {
                    continue;
                }
                let base1 = reverse_bits(c1.bits, c1.len as u32) as usize;
                let base2 = reverse_bits(c2.bits, c2.len as u32) as usize;
                let combined_base = base1 | (base2 << c1.len as u32);
                let combined_len = c1.len + c2.len;
                let shift = table_log - combined_len as u32;
                for i in 0..(1usize << shift) {
                    let slot = combined_base | (i << combined_len as u32);
                    entries[slot] = (((s1 as u16) & 0xFF) | ((s2 as u16) << 8), combined_len, 2);
                }
            }
        }

        Ok(DecoderX2 { table_log, entries })
    }

    #[inline]
    pub fn decode(&self, reader: &mut BitReader, out: &mut Vec<u8>) {
        let idx = reader.look_bits(self.table_log) as usize;
        let (seq, bits, count) = self.entries[idx];
        reader.skip_bits(bits as u32);
        out.push((seq & 0xFF) as u8);
        if count == 2 {
            out.push((seq >> 8) as u8);
        }
    }
}

fn reverse_bits(value: u32, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    value.reverse_bits() >> (32 - len)
}

/// Cost-based single-vs-double dispatch heuristic: a simplified monotone
/// stand-in for a pre-tabulated quality x cost matrix, preserving the same
/// inputs (`cSrcSize`, `dstSize`) and the same qualitative trend (X2 wins
/// for larger outputs where its table-build overhead amortizes).
pub fn choose_decoder_flavor(compressed_size: usize, decompressed_size: usize) -> bool {
    if decompressed_size == 0 {
        return false;
    }
    let quality = compressed_size.saturating_mul(16) / decompressed_size;
    let d256 = decompressed_size / 256;
    // X2's extra table-build cost only pays off once there is enough output
    // to amortize it and the data looks compressible (low quality ratio).
    d256 > 16 && quality < 12
}

fn build_code_lengths(counts: &[u32; 256], max_bits: u32) -> Res<Vec<u8>> {
    #[derive(Clone)]
    struct Node {
        freq: u64,
        left: i32,
        right: i32,
    }
    let mut nodes: Vec<Node> = Vec::new();
    let mut leaf_of = [usize::MAX; 256];
    for (symbol, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        leaf_of[symbol] = nodes.len();
        nodes.push(Node { freq: count as u64, left: -1, right: -1 });
    }
    let mut lengths = vec![0u8; 256];
    if nodes.is_empty() {
        return Ok(lengths);
    }
    if nodes.len() == 1 {
        let symbol = leaf_of.iter().position(|&i| i == 0).unwrap();
        lengths[symbol] = 1;
        return Ok(lengths);
    }

    // Simple O(n^2) Huffman merge; symbol alphabets are <= 256 so this stays
    // cheap, and keeps the construction obviously correct.
    let mut active: Vec<usize> = (0..nodes.len()).collect();
    let mut depth = vec![0u32; nodes.len()];
    while active.len() > 1 {
        active.sort_by_key(|&i| nodes[i].freq);
        let a = active.remove(0);
        let b = active.remove(0);
        let merged = Node { freq: nodes[a].freq + nodes[b].freq, left: a as i32, right: b as i32 };
        nodes.push(merged);
        depth.push(0);
        active.push(nodes.len() - 1);
    }

    fn walk(nodes: &[Node], idx: usize, depth: u32, out: &mut Vec<(usize, u32)>) {
        let node = &nodes[idx];
        if node.left < 0 {
            out.push((idx, depth.max(1)));
        } else {
            walk(nodes, node.left as usize, depth + 1, out);
            walk(nodes, node.right as usize, depth + 1, out);
        }
    }
    let root = nodes.len() - 1;
    let mut leaf_depths = Vec::new();
    walk(&nodes, root, 0, &mut leaf_depths);

    for (symbol, &leaf_idx) in leaf_of.iter().enumerate() {
        if leaf_idx == usize::MAX {
            continue;
        }
        let (_, d) = leaf_depths.iter().find(|&&(i, _)| i == leaf_idx).unwrap();
        lengths[symbol] = (*d).min(max_bits) as u8;
    }
    Ok(lengths)
}

/// Enforce `max_bits` with the classic overflow procedure: walk down from
/// the deepest leaves, clamping them to `max_bits` and redistributing their
/// probability weight onto shallower leaves so the Kraft inequality stays
/// satisfied.
fn limit_lengths(lengths: &mut [u8], max_bits: u32) {
    let max_bits = max_bits as u8;
    if lengths.iter().all(|&l| l <= max_bits) {
        return;
    }
    for l in lengths.iter_mut() {
        if *l > max_bits {
            *l = max_bits;
        }
    }
    // Restore Kraft equality: total = sum(2^-len) must not exceed 1. If it
    // does, progressively lengthen the currently-shortest codes.
    loop {
        let total: u64 = lengths.iter().filter(|&&l| l > 0).map(|&l| 1u64 << (max_bits - l)).sum();
        let budget = 1u64 << max_bits;
        if total <= budget {
            break;
        }
        let deepest = lengths.iter().enumerate().filter(|&(_, &l)| l > 0 && l < max_bits).max_by_key(|&(_, &l)| l);
        match deepest {
            Some((i, _)) => lengths[i] += 1,
            None => break,
        }
    }
}

fn assign_canonical_codes(lengths: &[u8]) -> [Code; 256] {
    let mut codes = [Code::default(); 256];
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    if max_len == 0 {
        return codes;
    }
    let mut count_per_len = vec![0u32; max_len as usize + 1];
    for &l in lengths {
        if l > 0 {
            count_per_len[l as usize] += 1;
        }
    }
    let mut next_code = vec![0u32; max_len as usize + 2];
    let mut code = 0u32;
    for len in 1..=max_len as usize {
        code = (code + count_per_len[len - 1]) << 1;
        next_code[len] = code;
    }
    for (symbol, &len) in lengths.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let c = next_code[len as usize];
        next_code[len as usize] += 1;
        codes[symbol] = Code { bits: c, len };
    }
    codes
}

/// Jump-table layout for the four-stream parallel literals encoding: a
/// 6-byte little-endian header of three stream lengths.
pub fn write_jump_table(lengths: [usize; 3], out: &mut Vec<u8>) {
    for len in lengths {
        out.extend_from_slice(&(len as u16).to_le_bytes());
    }
}

pub fn read_jump_table(data: &[u8]) -> Res<([usize; 3], &[u8])> {
    crate::ensure!(data.len() >= 6, ErrorCode::CorruptionDetected, "literals jump table truncated");
    let s0 = u16::from_le_bytes([data[0], data[1]]) as usize;
    let s1 = u16::from_le_bytes([data[2], data[3]]) as usize;
    let s2 = u16::from_le_bytes([data[4], data[5]]) as usize;
    Ok(([s0, s1, s2], &data[6..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts_of(data: &[u8]) -> [u32; 256] {
        let mut counts = [0u32; 256];
        for &b in data {
            counts[b as usize] += 1;
        }
        counts
    }

    #[test]
    fn ctable_round_trips_through_weights_and_x1() {
        let data = b"the quick brown fox jumps over the lazy dog the fox the dog";
        let counts = counts_of(data);
        let ctable = CTable::build(&counts, 10).unwrap();

        let mut w = BitWriter::new();
        for &b in data.iter().rev() {
            ctable.encode_symbol(b, &mut w);
        }
        let bytes = w.finish();

        let mut weight_bytes = Vec::new();
        ctable.write_weights(&mut weight_bytes);
        let weights = read_weights(&weight_bytes).unwrap();
        let decoder = DecoderX1::build(&weights).unwrap();

        let mut reader = BitReader::new(&bytes).unwrap();
        let mut out = Vec::with_capacity(data.len());
        for _ in 0..data.len() {
            out.push(decoder.decode_symbol(&mut reader));
        }
        assert_eq!(out, data);
    }

    #[test_log::test]
    fn decoder_x2_round_trips_through_weights() {
        let data = b"mississippi river mississippi river mississippi".repeat(3);
        let counts = counts_of(&data);
        let ctable = CTable::build(&counts, 10).unwrap();

        let mut w = BitWriter::new();
        for &b in data.iter().rev() {
            ctable.encode_symbol(b, &mut w);
        }
        let bytes = w.finish();

        let mut weight_bytes = Vec::new();
        ctable.write_weights(&mut weight_bytes);
        let weights = read_weights(&weight_bytes).unwrap();
        let decoder = DecoderX2::build(&weights).unwrap();

        let mut reader = BitReader::new(&bytes).unwrap();
        let mut out = Vec::with_capacity(data.len());
        while out.len() < data.len() {
            decoder.decode(&mut reader, &mut out);
        }
        out.truncate(data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn choose_decoder_flavor_prefers_x1_for_small_inputs() {
        assert!(!choose_decoder_flavor(100, 200));
    }

    #[test]
    fn choose_decoder_flavor_prefers_x2_for_large_compressible_inputs() {
        assert!(choose_decoder_flavor(500, 20_000));
    }

    #[test]
    fn jump_table_round_trips() {
        let mut out = Vec::new();
        write_jump_table([10, 20, 30], &mut out);
        let (lens, rest) = read_jump_table(&out).unwrap();
        assert_eq!(lens, [10, 20, 30]);
        assert!(rest.is_empty());
    }
}
