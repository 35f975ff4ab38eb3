//! Match finder strategy family.
//!
//! One [`MatchFinder`] trait is dispatched per `(DictMode, Strategy)` pair.
//! The nine named strategies collapse onto three engines the way real
//! Zstd's function-pointer table reuses code: `fast`/`dfast` are one-probe
//! engines (`hash_tables`), `greedy`/`lazy`/`lazy2` share the chain-walking
//! engine in [`chain`], and `btlazy2`/`btopt`/`btultra`/`btultra2` share the
//! binary-tree engines in [`btree`] and [`optimal`].

mod btree;
mod chain;
pub(crate) mod hash_tables;
mod optimal;

pub use hash_tables::{ChainTable, HashTable};

use crate::error::Res;
use crate::ldm::RawSequence;
use crate::sequences::{RepOffsets, SeqStore};
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strategy {
    Fast = 1,
    DFast = 2,
    Greedy = 3,
    Lazy = 4,
    Lazy2 = 5,
    BtLazy2 = 6,
    BtOpt = 7,
    BtUltra = 8,
    BtUltra2 = 9,
}

impl Strategy {
    pub fn from_level_class(strategy: u32) -> Self {
        use Strategy::*;
        match strategy {
            1 => Fast,
            2 => DFast,
            3 => Greedy,
            4 => Lazy,
            5 => Lazy2,
            6 => BtLazy2,
            7 => BtOpt,
            8 => BtUltra,
            _ => BtUltra2,
        }
    }

    /// `cycleLog = chainLog - (strategy >= btlazy2 ? 1 : 0)`.
    pub fn cycle_log(self, chain_log: u32) -> u32 {
        if self >= Strategy::BtLazy2 {
            chain_log.saturating_sub(1)
        } else {
            chain_log
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictMode {
    /// Current segment only.
    Prefix,
    /// Current segment plus an attached CDict's frozen tables.
    DictMatchState,
    /// Segmented window with a possible wrap into the ext-dict region.
    ExtDict,
}

/// Parameters that shape the search, independent of dict mode.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub strategy: Strategy,
    pub min_match: u32,
    pub search_log: u32,
    pub target_length: u32,
}

/// Shared contract every strategy/dict-mode variant implements:
/// `compressBlock(ms, seqStore, rep, src) -> lastLiteralsLen`.
///
/// `dict_content` is the attached dictionary's raw bytes (empty under
/// [`DictMode::Prefix`]) and `ldm_hints` are long-distance-match candidates,
/// sorted ascending and non-overlapping by [`RawSequence::start`], that this
/// call should fold in alongside whatever the engine's own tables find.
pub trait MatchFinder {
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
    ) -> Res<u32>;
}

/// Select the engine that implements a given `(dict_mode, strategy)` pair.
///
/// The strategy picks the engine family; `dict_mode` is threaded through to
/// each call's `compress_block` rather than selecting a different engine
/// type here, since all three engines support all three dict modes by
/// searching over a combined dict-then-source buffer.
pub fn dispatch(params: SearchParams, dict_mode: DictMode) -> Box<dyn MatchFinder> {
    let _ = dict_mode;
    let finder: Box<dyn MatchFinder> = match params.strategy {
        Strategy::Fast | Strategy::DFast => {
            Box::new(chain::ChainMatchFinder::new(params.strategy == Strategy::DFast))
        }
        Strategy::Greedy | Strategy::Lazy | Strategy::Lazy2 => {
            Box::new(chain::ChainMatchFinder::new(false))
        }
        Strategy::BtLazy2 => Box::new(btree::BtMatchFinder::new()),
        Strategy::BtOpt | Strategy::BtUltra | Strategy::BtUltra2 => {
            Box::new(optimal::OptimalMatchFinder::new(params.strategy))
        }
    };
    finder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_log_drops_one_bit_for_bt_strategies() {
        assert_eq!(Strategy::Greedy.cycle_log(10), 10);
        assert_eq!(Strategy::BtLazy2.cycle_log(10), 9);
        assert_eq!(Strategy::BtUltra2.cycle_log(10), 9);
    }
}
