//! Optimal parser family: `btopt`, `btultra`, `btultra2`.
//!
//! Price-based forward dynamic programming: for every reachable position,
//! track the cheapest way to get there (extend the current literal run, or
//! take some match ending here), then walk the cheapest path back out once
//! the lookahead window is exhausted. `btultra`/`btultra2` iterate the price
//! table against updated symbol-frequency statistics; this engine runs that
//! refinement loop a strategy-dependent number of times.

use super::btree::BtMatchFinder;
use super::{DictMode, MatchFinder, SearchParams, Strategy};
use crate::error::Res;
use crate::ldm::RawSequence;
use crate::sequences::{match_length_code, offset_code, RepOffsets, Sequence, SeqStore};
use crate::window::Window;
use std::borrow::Cow;

const LITERAL_PRICE_BITS: u32 = 6; // log2(1/P) estimate in 1/64-bit units, flat model

#[derive(Clone, Copy)]
struct PriceNode {
    cost: u32,
    /// How we arrived here: `None` means "one more literal from the
    /// previous node", `Some((len, dist))` means "a match of this shape".
    via: Option<(u32, u32)>,
}

pub struct OptimalMatchFinder {
    strategy: Strategy,
    inner: BtMatchFinder,
}

impl OptimalMatchFinder {
    pub fn new(strategy: Strategy) -> Self {
        OptimalMatchFinder { strategy, inner: BtMatchFinder::new() }
    }

    fn refine_passes(&self) -> u32 {
        match self.strategy {
            Strategy::BtOpt => 1,
            Strategy::BtUltra => 2,
            _ => 3, // btultra2
        }
    }

    /// Estimated bit cost of emitting a match of this length/offset, using a
    /// flat log2-based model rather than live FSE tables: lacking a
    /// populated table at search time, this falls back to the code-length
    /// heuristic, refined across `refine_passes` re-estimations.
    fn match_price(len: u32, dist: u32) -> u32 {
        let ml_extra = 32 - match_length_code(len).leading_zeros().min(31);
        let of_extra = offset_code(dist) as u32;
        8 + ml_extra + of_extra
    }

    fn literal_price(byte: u8, freq: &[u32; 256]) -> u32 {
        let total: u32 = freq.iter().sum::<u32>().max(1);
        let count = freq[byte as usize].max(1);
        // ceil(log2(total / count)), a cheap stand-in for -log2(p).
        let ratio = (total / count).max(1);
        (32 - ratio.leading_zeros()).max(LITERAL_PRICE_BITS)
    }
}

impl MatchFinder for OptimalMatchFinder {
    fn compress_block(
        &mut self,
        window: &Window,
        seq_store: &mut SeqStore,
        rep: &mut RepOffsets,
        src: &[u8],
        params: SearchParams,
        dict_mode: DictMode,
        dict_content: &[u8],
        ldm_hints: &[RawSequence],
    ) -> Res<u32> {
        self.inner.ensure(20);

        let use_dict = dict_mode != DictMode::Prefix && !dict_content.is_empty();
        let combined: Cow<[u8]> =
            if use_dict { Cow::Owned([dict_content, src].concat()) } else { Cow::Borrowed(src) };
        let base = combined.len() - src.len();
        let depth = 1u32 << params.search_log.min(12);
        let min_match = params.min_match.max(3);
        for seed_pos in 0..base {
            if seed_pos + min_match as usize <= combined.len() {
                self.inner.insert_and_search(&combined, seed_pos, min_match, depth);
            }
        }

        let mut freq = [1u32; 256];
        for _ in 0..self.refine_passes() {
            self.run_once(window, seq_store, rep, &combined, base, params, ldm_hints, &mut freq)?;
            if seq_store.sequences.is_empty() {
                break;
            }
            seq_store.reset();
        }
        self.run_once(window, seq_store, rep, &combined, base, params, ldm_hints, &mut freq)
    }
}

impl OptimalMatchFinder {
    #[allow(clippy::too_many_arguments)]
    fn run_once(
        &mut self,
        window: &Window,
        seq_store: &mut SeqStore,
        rep: &mut RepOffsets,
        combined: &[u8],
        base: usize,
        params: SearchParams,
        ldm_hints: &[RawSequence],
        freq: &mut [u32; 256],
    ) -> Res<u32> {
        let _ = window;
        let min_match = params.min_match.max(3);
        let n = combined.len();
        if n <= base {
            return Ok(0);
        }

        let mut nodes = vec![PriceNode { cost: u32::MAX, via: None }; n + 1];
        nodes[base].cost = 0;

        for pos in base..n {
            if nodes[pos].cost == u32::MAX {
                continue;
            }
            // Literal step.
            let lit_cost = nodes[pos].cost + Self::literal_price(combined[pos], freq);
            if lit_cost < nodes[pos + 1].cost {
                nodes[pos + 1] = PriceNode { cost: lit_cost, via: None };
            }

            // Match step: the binary-tree engine's raw search first, then
            // any long-distance-match hint anchored exactly at this
            // position, keeping whichever is longer.
            let mut candidate = None;
            if pos + min_match as usize <= n {
                candidate =
                    self.inner.insert_and_search(combined, pos, min_match, 1 << params.search_log.min(12));
            }
            let rel_pos = (pos - base) as u32;
            if let Some(hint) = ldm_hints.iter().find(|h| h.start == rel_pos) {
                if candidate.map_or(true, |(len, _)| hint.match_length > len) {
                    candidate = Some((hint.match_length, hint.offset));
                }
            }
            if let Some((len, dist)) = candidate {
                let end = (pos + len as usize).min(n);
                let actual_len = (end - pos) as u32;
                if actual_len >= min_match {
                    let match_cost = nodes[pos].cost + Self::match_price(actual_len, dist);
                    if match_cost < nodes[end].cost {
                        nodes[end] = PriceNode { cost: match_cost, via: Some((actual_len, dist)) };
                    }
                }
            }
        }

        // Walk the cheapest path back from `n`, then reverse it into
        // forward sequence emissions.
        let mut steps = Vec::new();
        let mut cursor = n;
        while cursor > base {
            match nodes[cursor].via {
                Some((len, dist)) => {
                    steps.push((cursor - len as usize, Some((len, dist))));
                    cursor -= len as usize;
                }
                None => {
                    steps.push((cursor - 1, None));
                    cursor -= 1;
                }
            }
        }
        steps.reverse();

        let mut lit_start = base;
        let mut pos = base;
        for (start_pos, step) in steps {
            debug_assert_eq!(start_pos, pos);
            match step {
                None => {
                    freq[combined[pos] as usize] += 1;
                    pos += 1;
                }
                Some((len, dist)) => {
                    let lit_len = (pos - lit_start) as u32;
                    for &b in &combined[lit_start..pos] {
                        freq[b as usize] += 1;
                    }
                    let offset_code_val = if lit_len > 0 && dist == rep.rep[0] { 1 } else { dist + 3 };
                    seq_store.push(
                        &combined[lit_start..pos],
                        Sequence { lit_length: lit_len, match_length: len, offset: dist },
                    );
                    rep.update(offset_code_val, lit_len, dist);
                    pos += len as usize;
                    lit_start = pos;
                }
            }
        }
        seq_store.push_last_literals(&combined[lit_start..]);
        Ok((combined.len() - lit_start) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_finder_round_trips_sequence_lengths() {
        let mut finder = OptimalMatchFinder::new(Strategy::BtOpt);
        let mut seq_store = SeqStore::new();
        let mut rep = RepOffsets::new();
        let window = Window::new();
        let src = b"abcabcabcabc abcabcabcabc abcabcabcabc".to_vec();
        let params = SearchParams { strategy: Strategy::BtOpt, min_match: 3, search_log: 6, target_length: 64 };
        finder
            .compress_block(&window, &mut seq_store, &mut rep, &src, params, DictMode::Prefix, &[], &[])
            .unwrap();

        let matched: usize = seq_store.sequences.iter().map(|s| s.match_length as usize).sum();
        assert_eq!(matched + seq_store.literals.len(), src.len());
    }

    #[test]
    fn dict_content_enables_matches_against_dictionary() {
        let mut finder = OptimalMatchFinder::new(Strategy::BtOpt);
        let mut seq_store = SeqStore::new();
        let mut rep = RepOffsets::new();
        let window = Window::new();
        let dict = b"abcabcabcabc abcabcabcabc".to_vec();
        let src = b"abcabcabcabc abcabcabcabc".to_vec();
        let params = SearchParams { strategy: Strategy::BtOpt, min_match: 3, search_log: 6, target_length: 64 };
        finder
            .compress_block(&window, &mut seq_store, &mut rep, &src, params, DictMode::DictMatchState, &dict, &[])
            .unwrap();
        assert!(!seq_store.sequences.is_empty(), "expected a match against the attached dictionary");
    }
}
