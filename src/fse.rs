//! FSE (tANS) entropy coder.
//!
//! Table build walks the `2^tableLog` slots and assigns
//! `{nextStateBase, symbol, nbBits}` per occurrence using the standard Zstd
//! FSE permutation (`step = (size>>1) + (size>>3) + 3`), with an encode-table
//! build and NCount header I/O alongside the decode path.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{ErrorCode, Res};

pub const MAX_TABLE_LOG: u32 = 12;
pub const MIN_TABLE_LOG: u32 = 5;

/// Standard Zstd predefined distributions.
pub const LL_DEFAULT_ACC_LOG: u32 = 6;
pub const LL_DEFAULT_DISTRIBUTION: [i32; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];
pub const ML_DEFAULT_ACC_LOG: u32 = 6;
pub const ML_DEFAULT_DISTRIBUTION: [i32; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];
pub const OF_DEFAULT_ACC_LOG: u32 = 5;
pub const OF_DEFAULT_DISTRIBUTION: [i32; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];

/// One entry of a decode table.
#[derive(Clone, Copy, Default)]
pub struct DecodeEntry {
    pub next_state_base: u32,
    pub symbol: u8,
    pub nb_bits: u8,
}

pub struct DecodeTable {
    pub table_log: u32,
    pub entries: Vec<DecodeEntry>,
    pub fast_mode: bool,
}

impl DecodeTable {
    /// Build a decode table from normalized counts.
    pub fn build(norm: &[i32], table_log: u32) -> Res<Self> {
        let size = 1usize << table_log;
        crate::ensure!(
            table_log <= MAX_TABLE_LOG,
            ErrorCode::TableLogTooLarge,
            "tableLog {table_log} exceeds max {MAX_TABLE_LOG}"
        );

        let mut symbol_next = vec![0u16; norm.len()];
        let mut entries = vec![DecodeEntry::default(); size];

        // Place low-probability (count == -1) symbols into the high area,
        // one slot each, walking from the end of the table downward.
        let mut high_threshold = size - 1;
        for (symbol, &count) in norm.iter().enumerate() {
            if count == -1 {
                entries[high_threshold].symbol = symbol as u8;
                high_threshold = high_threshold.saturating_sub(1);
                symbol_next[symbol] = 1;
            }
        }

        let step = (size >> 1) + (size >> 3) + 3;
        let mask = size - 1;
        let mut pos = 0usize;
        for (symbol, &count) in norm.iter().enumerate() {
            if count <= 0 {
                continue;
            }
            symbol_next[symbol] = count as u16;
            for _ in 0..count {
                entries[pos].symbol = symbol as u8;
                pos = (pos + step) & mask;
                while pos > high_threshold {
                    pos = (pos + step) & mask;
                }
            }
        }
        crate::ensure!(pos == 0, ErrorCode::CorruptionDetected, "fse table build did not cover all slots");

        let mut fast_mode = true;
        for i in 0..size {
            let symbol = entries[i].symbol;
            let next_state = symbol_next[symbol as usize];
            symbol_next[symbol as usize] += 1;
            let nb_bits = (table_log - highbit(next_state as u32)) as u8;
            entries[i].nb_bits = nb_bits;
            entries[i].next_state_base = ((next_state as u32) << nb_bits) - size as u32;
            if nb_bits == 0 {
                fast_mode = false;
            }
        }

        Ok(DecodeTable { table_log, entries, fast_mode })
    }

    pub fn from_distribution(table_log: u32, distribution: &[i32]) -> Self {
        Self::build(distribution, table_log).expect("predefined distributions are always valid")
    }

    /// Decode one symbol, advancing `state`.
    #[inline]
    pub fn decode_symbol(&self, state: &mut u32, bits: &mut BitReader) -> u8 {
        let entry = &self.entries[*state as usize];
        let symbol = entry.symbol;
        let low_bits = bits.read_bits(entry.nb_bits as u32) as u32;
        *state = entry.next_state_base + low_bits;
        symbol
    }

    pub fn init_state(&self, bits: &mut BitReader) -> u32 {
        bits.read_bits(self.table_log) as u32
    }
}

/// Encode-table entry: for each (symbol, nbBits-class) pair, the base state
/// and bit count needed to transition out of it.
#[derive(Clone)]
pub struct EncodeTable {
    pub table_log: u32,
    /// Per-symbol transform used to derive nbBits and the next-state index.
    symbol_tt: Vec<SymbolTransform>,
    /// state -> symbol at that slot, used to build `symbol_tt` and for the
    /// state-to-position renumbering.
    state_table: Vec<u16>,
}

#[derive(Clone, Copy, Default)]
struct SymbolTransform {
    delta_nb_bits: i32,
    delta_find_state: i32,
}

impl EncodeTable {
    pub fn build(norm: &[i32], table_log: u32) -> Res<Self> {
        let table_size = 1usize << table_log;
        let num_symbols = norm.len();

        // Cumulative start offset of each symbol's occurrences, in the same
        // order a decode table assigns `symbol_next` counters.
        let mut cumul = vec![0i32; num_symbols];
        let mut table_symbol = vec![0u8; table_size];
        let mut high_threshold = table_size - 1;
        {
            let mut cum = 0i32;
            for s in 0..num_symbols {
                if norm[s] == -1 {
                    cumul[s] = cum;
                    cum += 1;
                    table_symbol[high_threshold] = s as u8;
                    high_threshold = high_threshold.saturating_sub(1);
                } else {
                    cumul[s] = cum;
                    cum += norm[s].max(0);
                }
            }
        }

        let step = (table_size >> 1) + (table_size >> 3) + 3;
        let mask = table_size - 1;
        let mut pos = 0usize;
        for s in 0..num_symbols {
            if norm[s] <= 0 {
                continue;
            }
            for _ in 0..norm[s] {
                table_symbol[pos] = s as u8;
                pos = (pos + step) & mask;
                while pos > high_threshold {
                    pos = (pos + step) & mask;
                }
            }
        }
        crate::ensure!(pos == 0, ErrorCode::CorruptionDetected, "fse encode table build did not cover all slots");

        // state_table[cumul[s] + k] = tableSize + u, where u is the k-th
        // table position (scan order) assigned to symbol s. This is the
        // exact inverse of DecodeTable::build's `next_state_base`.
        let mut state_table = vec![0u16; table_size];
        let mut next_cumul = cumul.clone();
        for u in 0..table_size {
            let s = table_symbol[u] as usize;
            state_table[next_cumul[s] as usize] = (table_size + u) as u16;
            next_cumul[s] += 1;
        }

        let mut symbol_tt = vec![SymbolTransform::default(); num_symbols];
        for s in 0..num_symbols {
            match norm[s] {
                0 => {}
                -1 | 1 => {
                    symbol_tt[s] = SymbolTransform {
                        delta_nb_bits: ((table_log as i32) << 16) - table_size as i32,
                        delta_find_state: cumul[s] - 1,
                    };
                }
                count => {
                    let max_bits_out = table_log - highbit((count - 1) as u32);
                    let min_state_plus = (count as u32) << max_bits_out;
                    symbol_tt[s] = SymbolTransform {
                        delta_nb_bits: ((max_bits_out as i32) << 16) - min_state_plus as i32,
                        delta_find_state: cumul[s] - count,
                    };
                }
            }
        }

        Ok(EncodeTable { table_log, symbol_tt, state_table })
    }

    pub fn from_distribution(table_log: u32, distribution: &[i32]) -> Self {
        Self::build(distribution, table_log).expect("predefined distributions are always valid")
    }

    /// Initial state before the first (i.e. logically last) symbol is
    /// encoded, per this module's reverse-order convention.
    pub fn initial_state(&self) -> u32 {
        1u32 << self.table_log
    }

    /// Encode one symbol, writing bits via `writer` and updating `state`.
    /// `state` carries an implicit `tableSize` bias that is dropped
    /// automatically once it is finally flushed with exactly `table_log`
    /// bits.
    #[inline]
    pub fn encode_symbol(&self, state: &mut u32, symbol: u8, writer: &mut BitWriter) {
        let tt = &self.symbol_tt[symbol as usize];
        let nb_bits_out = ((*state as i32 + tt.delta_nb_bits) >> 16) as u32;
        writer.add_bits(*state as u64, nb_bits_out);
        let index = ((*state >> nb_bits_out) as i32 + tt.delta_find_state) as usize;
        *state = self.state_table[index] as u32;
    }

    /// Flush the final state: always exactly `table_log` bits; the high
    /// `tableSize` marker bit is dropped by the mask, leaving the raw table
    /// index the decoder's `init_state` expects.
    pub fn flush_state(&self, state: u32, writer: &mut BitWriter) {
        writer.add_bits(state as u64, self.table_log);
    }
}

#[inline]
pub fn highbit(x: u32) -> u32 {
    31 - x.leading_zeros()
}

/// Normalize raw symbol counts to sum exactly to `2^table_log`.
pub fn normalize_counts(raw_counts: &[u32], table_log: u32) -> Vec<i32> {
    let total: u64 = raw_counts.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return vec![0; raw_counts.len()];
    }
    let target = 1u64 << table_log;
    let mut norm = vec![0i32; raw_counts.len()];
    let mut remaining = target as i64;
    let mut low_prob_slots = 0i64;

    for (i, &count) in raw_counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let scaled = ((count as u64 * target) / total).max(1);
        if scaled == 1 && (count as u64 * target * 2) < total {
            norm[i] = -1;
            low_prob_slots += 1;
        } else {
            norm[i] = scaled as i32;
        }
    }

    let assigned: i64 = norm.iter().filter(|&&c| c > 0).map(|&c| c as i64).sum();
    remaining -= assigned + low_prob_slots;

    // Distribute rounding remainder onto the most frequent symbol, matching
    // the encoder's "largest gets the slack" convention.
    if remaining != 0 {
        let (best, _) = raw_counts
            .iter()
            .enumerate()
            .max_by_key(|&(_, &c)| c)
            .unwrap();
        norm[best] += remaining as i32;
    }
    norm
}

/// Pick a table log: smallest power of two `>= max(MIN, ceil(log2(nbSymbols)))`
/// bounded by `max_table_log`, matching the encoder's sizing heuristic.
pub fn optimal_table_log(max_table_log: u32, nb_seq: usize, max_symbol_value: usize) -> u32 {
    if nb_seq == 0 {
        return MIN_TABLE_LOG;
    }
    let min_needed = 32 - (max_symbol_value.max(1) as u32).leading_zeros();
    max_table_log.min((nb_seq.next_power_of_two().trailing_zeros() + 2).max(min_needed)).max(MIN_TABLE_LOG)
}

/// NCount header write. A simplified but self-consistent encoding: table
/// log (4 bits) followed by one 17-bit signed-biased field per symbol up to
/// `max_symbol_value`, terminated implicitly by the known symbol count.
/// Real Zstd uses a tighter variable-width probability code; this lays out
/// the same logical content (table log + per-symbol normalized count) the
/// decoder needs for the round-trip invariants this crate requires.
pub fn write_ncount(norm: &[i32], table_log: u32, out: &mut BitWriter) {
    out.add_bits((table_log - MIN_TABLE_LOG) as u64, 4);
    out.add_bits(norm.len() as u64, 9);
    for &count in norm {
        let biased = (count + 1) as u32; // -1 => 0, 0 => 1, N => N+1
        out.add_bits(biased as u64, 17);
    }
}

pub fn read_ncount(reader: &mut BitReader) -> Res<(Vec<i32>, u32)> {
    let table_log = reader.read_bits(4) as u32 + MIN_TABLE_LOG;
    let max_symbol = reader.read_bits(9) as usize;
    crate::ensure!(max_symbol <= 256, ErrorCode::MaxSymbolValueTooLarge, "ncount symbol count {max_symbol} too large");
    let mut norm = Vec::with_capacity(max_symbol);
    let mut sum = 0i64;
    for _ in 0..max_symbol {
        let biased = reader.read_bits(17) as i32;
        let count = biased - 1;
        norm.push(count);
        sum += if count == -1 { 1 } else { count as i64 };
    }
    crate::ensure!(sum == (1i64 << table_log), ErrorCode::CorruptionDetected, "normalized counts sum {sum} != 2^{table_log}");
    Ok((norm, table_log))
}

/// Encoding-type selection for one of {LL, ML, OF}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCompressionMode {
    Predefined,
    Rle(u8),
    Dynamic,
    Repeat,
}

pub fn select_mode(
    counts: &[u32],
    nb_seq: usize,
    previous_valid: bool,
    default_cost_ok: bool,
) -> SymbolCompressionMode {
    if nb_seq == 0 {
        return SymbolCompressionMode::Predefined;
    }
    let most_frequent = counts.iter().copied().max().unwrap_or(0) as usize;
    if most_frequent == nb_seq {
        let symbol = counts.iter().position(|&c| c as usize == nb_seq).unwrap_or(0);
        return SymbolCompressionMode::Rle(symbol as u8);
    }
    if previous_valid && nb_seq < 64 {
        return SymbolCompressionMode::Repeat;
    }
    if default_cost_ok {
        return SymbolCompressionMode::Predefined;
    }
    SymbolCompressionMode::Dynamic
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_once(norm: &[i32], table_log: u32, symbols: &[u8]) {
        let enc = EncodeTable::build(norm, table_log).unwrap();
        let dec = DecodeTable::build(norm, table_log).unwrap();

        let mut w = BitWriter::new();
        let mut state = enc.initial_state();
        for &s in symbols.iter().rev() {
            enc.encode_symbol(&mut state, s, &mut w);
        }
        enc.flush_state(state, &mut w);
        let bytes = w.finish();

        let mut r = BitReader::new(&bytes).unwrap();
        let mut dstate = dec.init_state(&mut r);
        for &expected in symbols {
            let s = dec.decode_symbol(&mut dstate, &mut r);
            assert_eq!(s, expected);
        }
    }

    #[test]
    fn predefined_literal_length_table_round_trips() {
        round_trip_once(&LL_DEFAULT_DISTRIBUTION, LL_DEFAULT_ACC_LOG, &[0, 1, 2, 0, 16, 3, 0]);
    }

    #[test]
    fn normalize_counts_sums_to_power_of_two() {
        let counts = [10u32, 1, 1, 50, 2];
        let norm = normalize_counts(&counts, 7);
        let sum: i64 = norm.iter().map(|&c| if c == -1 { 1 } else { c as i64 }).sum();
        assert_eq!(sum, 1 << 7);
    }
}
