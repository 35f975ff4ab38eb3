//! Hash-chain engine covering `fast`, `dfast`, `greedy`, `lazy`, `lazy2`:
//! one generic probe-and-extend loop parameterized by how many chain links
//! to walk and how many bytes of lazy deferral to allow, rather than nine
//! near-duplicate functions.

use super::hash_tables::{read_u32_le, ChainTable, HashTable, Hash3Table};
use super::{DictMode, MatchFinder, SearchParams, Strategy};
use crate::error::Res;
use crate::ldm::RawSequence;
use crate::sequences::{RepOffsets, Sequence, SeqStore};
use crate::window::Window;
use std::borrow::Cow;

pub struct ChainMatchFinder {
    double_hash: bool,
    hash: Option<HashTable>,
    hash3: Option<Hash3Table>,
    chain: Option<ChainTable>,
}

impl ChainMatchFinder {
    pub fn new(double_hash: bool) -> Self {
        ChainMatchFinder { double_hash, hash: None, hash3: None, chain: None }
    }

    fn ensure_tables(&mut self, hash_log: u32, chain_log: u32) {
        if self.hash.is_none() {
            self.hash = Some(HashTable::new(hash_log));
        }
        if self.double_hash && self.hash3.is_none() {
            self.hash3 = Some(Hash3Table::new(hash_log));
        }
        if !self.double_hash && self.chain.is_none() {
            self.chain = Some(ChainTable::new(chain_log));
        }
    }

    fn find_best(&self, src: &[u8], pos: usize, depth: u32, min_match: u32) -> Option<(u32, u32)> {
        // Returns (match_length, distance).
        let key = read_u32_le(src, pos);
        let chain = self.chain.as_ref()?;
        let hash = self.hash.as_ref()?;
        let h = hash.hash(key);
        let mut candidate = hash.get(h);
        let mut best: Option<(u32, u32)> = None;
        let mut steps = 0u32;
        while candidate != 0 && (candidate as usize) < pos && steps < depth {
            let cand_pos = candidate as usize;
            let len = super::hash_tables::match_length(src, cand_pos, src, pos);
            if len >= min_match {
                let dist = (pos - cand_pos) as u32;
                if best.map_or(true, |(best_len, best_dist)| len > best_len || (len == best_len && dist < best_dist)) {
                    best = Some((len, dist));
                }
            }
            candidate = chain.prev(candidate);
            steps += 1;
        }
        best
    }

    fn find_double(&self, src: &[u8], pos: usize, min_match: u32) -> Option<(u32, u32)> {
        let hash = self.hash.as_ref()?;
        let hash3 = self.hash3.as_ref()?;
        let key = read_u32_le(src, pos);
        let long = hash.get(hash.hash(key));
        let short = hash3.get(hash3.hash3(key));
        let mut best: Option<(u32, u32)> = None;
        for candidate in [long, short] {
            if candidate != 0 && (candidate as usize) < pos {
                let len = super::hash_tables::match_length(src, candidate as usize, src, pos);
                if len >= min_match {
                    let dist = (pos - candidate as usize) as u32;
                    if best.map_or(true, |(bl, _)| len > bl) {
                        best = Some((len, dist));
                    }
                }
            }
        }
        best
    }

    fn insert(&mut self, src: &[u8], pos: usize) {
        let key = read_u32_le(src, pos);
        if let Some(hash) = &mut self.hash {
            let h = hash.hash(key);
            let prev = hash.get(h);
            hash.put(h, pos as u32);
            if let Some(chain) = &mut self.chain {
                chain.insert(pos as u32, prev);
            }
        }
        if let Some(hash3) = &mut self.hash3 {
            let h3 = hash3.hash3(key);
            hash3.put(h3, pos as u32);
        }
    }
}

impl MatchFinder for ChainMatchFinder {
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
        let _ = window;

        // Under an attached dict, search over dict-content-then-src as one
        // buffer so matches can reach back into the dictionary; `base` is
        // where the real block begins within it.
        let use_dict = dict_mode != DictMode::Prefix && !dict_content.is_empty();
        let combined: Cow<[u8]> =
            if use_dict { Cow::Owned([dict_content, src].concat()) } else { Cow::Borrowed(src) };
        let base = combined.len() - src.len();

        self.ensure_tables(
            20.min((combined.len().max(4) as f64).log2().ceil() as u32 + 1),
            20,
        );

        let depth = 1u32 << params.search_log.min(10);
        let defer = match params.strategy {
            Strategy::Lazy => 1,
            Strategy::Lazy2 => 2,
            _ => 0,
        };

        let min_match = params.min_match.max(3) as usize;
        let end = combined.len();

        // Seed the tables over the dictionary region so the first real
        // position can already find matches into it.
        for seed_pos in 0..base {
            if seed_pos + min_match <= end {
                self.insert(&combined, seed_pos);
            }
        }

        let mut pos = base;
        let mut lit_start = base;
        let mut ldm_cursor = 0usize;

        while pos + min_match <= end {
            let rel_pos = (pos - base) as u32;
            while ldm_cursor < ldm_hints.len() && ldm_hints[ldm_cursor].start < rel_pos {
                ldm_cursor += 1;
            }
            let ldm_candidate = if ldm_cursor < ldm_hints.len() && ldm_hints[ldm_cursor].start == rel_pos {
                ldm_cursor += 1;
                Some((ldm_hints[ldm_cursor - 1].match_length, ldm_hints[ldm_cursor - 1].offset))
            } else {
                None
            };

            let local_best = if self.double_hash {
                self.find_double(&combined, pos, min_match as u32)
            } else {
                self.find_best(&combined, pos, depth, min_match as u32)
            };
            let best = match (local_best, ldm_candidate) {
                (Some(l), Some(h)) if h.0 > l.0 => Some(h),
                (None, Some(h)) => Some(h),
                (l, _) => l,
            };

            let chosen = match best {
                Some(candidate) if defer > 0 && pos + 1 + min_match <= end => {
                    self.insert(&combined, pos);
                    let next_best = if self.double_hash {
                        self.find_double(&combined, pos + 1, min_match as u32)
                    } else {
                        self.find_best(&combined, pos + 1, depth, min_match as u32)
                    };
                    match next_best {
                        Some((len2, _)) if len2 > candidate.0 => None, // defer
                        _ => Some(candidate),
                    }
                }
                other => {
                    self.insert(&combined, pos);
                    other
                }
            };

            match chosen {
                Some((len, dist)) => {
                    let lit_len = (pos - lit_start) as u32;
                    let offset_code = resolve_offset_code(rep, dist, lit_len);
                    seq_store.push(
                        &combined[lit_start..pos],
                        Sequence { lit_length: lit_len, match_length: len, offset: dist },
                    );
                    rep.update(offset_code, lit_len, dist);

                    let match_end = pos + len as usize;
                    let mut fill = pos + 1;
                    while fill < match_end && fill + min_match <= end {
                        self.insert(&combined, fill);
                        fill += 1;
                    }
                    pos = match_end;
                    lit_start = pos;
                }
                None => pos += 1,
            }
        }

        seq_store.push_last_literals(&combined[lit_start..]);
        Ok((combined.len() - lit_start) as u32)
    }
}

/// Inverse of `RepOffsets::resolve`: given a concrete winning offset, figure
/// out which code would have produced it, so `rep.update` receives the
/// right code without the finder re-deriving repeat-offset arithmetic
/// inline.
fn resolve_offset_code(rep: &RepOffsets, offset: u32, lit_length: u32) -> u32 {
    // Mirrors `RepOffsets::resolve`'s branching exactly: which rep slot a
    // given code maps to depends on whether this sequence has zero literals,
    // so the zero/nonzero cases must not share a single set of comparisons.
    if lit_length == 0 {
        if offset == rep.rep[1] {
            return 1;
        }
        if offset == rep.rep[2] {
            return 2;
        }
        if offset == rep.rep[0].saturating_sub(1).max(1) {
            return 3;
        }
    } else {
        if offset == rep.rep[0] {
            return 1;
        }
        if offset == rep.rep[1] {
            return 2;
        }
        if offset == rep.rep[2] {
            return 3;
        }
    }
    offset + 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_offset_code_guards_zero_lit_length_against_rep0() {
        let rep = RepOffsets::new();
        // offset == rep[0] exactly, with zero literals: must NOT collapse to
        // code 1 (that would wrongly claim a verbatim rep[0] reuse with no
        // literal gap); it falls through to a literal offset code.
        let code = resolve_offset_code(&rep, rep.rep[0], 0);
        assert_eq!(code, rep.rep[0] + 3);

        // The same offset with a nonzero literal length legitimately is
        // rep[0] reused.
        let code = resolve_offset_code(&rep, rep.rep[0], 5);
        assert_eq!(code, 1);
    }

    #[test]
    fn finds_repeated_pattern() {
        let mut finder = ChainMatchFinder::new(false);
        let mut seq_store = SeqStore::new();
        let mut rep = RepOffsets::new();
        let window = Window::new();
        let src = b"abcdefgh abcdefgh abcdefgh";
        let params = SearchParams { strategy: Strategy::Greedy, min_match: 3, search_log: 6, target_length: 0 };
        finder.compress_block(&window, &mut seq_store, &mut rep, src, params, DictMode::Prefix, &[], &[]).unwrap();
        assert!(!seq_store.sequences.is_empty());
    }

    #[test]
    fn dict_content_enables_matches_against_dictionary() {
        let mut finder = ChainMatchFinder::new(false);
        let mut seq_store = SeqStore::new();
        let mut rep = RepOffsets::new();
        let window = Window::new();
        let dict = b"the quick brown fox jumps over the lazy dog".to_vec();
        let src = b"the quick brown fox jumps over the lazy dog again";
        let params = SearchParams { strategy: Strategy::Greedy, min_match: 4, search_log: 6, target_length: 0 };
        finder
            .compress_block(&window, &mut seq_store, &mut rep, src, params, DictMode::DictMatchState, &dict, &[])
            .unwrap();
        assert!(!seq_store.sequences.is_empty(), "expected a match against the attached dictionary");
    }

    #[test]
    fn ldm_hint_is_consumed_at_its_start_position() {
        let mut finder = ChainMatchFinder::new(false);
        let mut seq_store = SeqStore::new();
        let mut rep = RepOffsets::new();
        let window = Window::new();
        // No natural match in a small window; only the LDM hint should
        // surface a sequence at all.
        let src: Vec<u8> = (0..64u8).collect();
        let params = SearchParams { strategy: Strategy::Greedy, min_match: 4, search_log: 6, target_length: 0 };
        let hints = [RawSequence { start: 0, match_length: 8, offset: 40 }];
        finder
            .compress_block(&window, &mut seq_store, &mut rep, &src, params, DictMode::Prefix, &[], &hints)
            .unwrap();
        assert!(seq_store.sequences.iter().any(|s| s.offset == 40));
    }
}
