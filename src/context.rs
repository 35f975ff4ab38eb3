//! Compression context: parameter resolution and dictionary attach/copy
//! policy ("Compressed Block State").
//!
//! A single owner holds the window for the life of a stream, carrying the
//! repeat-offset and entropy-table state a block needs from the block
//! before it across the whole frame.

use crate::capability::Capability;
use crate::error::Res;
use crate::fse::{EncodeTable, LL_DEFAULT_ACC_LOG, LL_DEFAULT_DISTRIBUTION, ML_DEFAULT_ACC_LOG, ML_DEFAULT_DISTRIBUTION, OF_DEFAULT_ACC_LOG, OF_DEFAULT_DISTRIBUTION};
use crate::huffman::CTable;
use crate::ldm::{LdmParams, LongDistanceMatcher};
use crate::matchfinder;
use crate::params::CCtxParams;
use crate::sequences::{RepOffsets, SeqStore};
use crate::window::Window;
use crate::xxhash::Xxh64;

/// Repeat status for one of the three entropy tables carried across blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    None,
    Valid,
    Check,
    Repeat,
}

/// Prebuilt match-state tables plus prior entropy state digested from a
/// dictionary blob.
pub struct CDict {
    pub content: Vec<u8>,
    pub rep: RepOffsets,
    pub huffman: Option<CTable>,
    pub ll_table: Option<EncodeTable>,
    pub ml_table: Option<EncodeTable>,
    pub of_table: Option<EncodeTable>,
    pub c_params: crate::params::CParams,
}

impl CDict {
    /// Digest a raw dictionary blob: the content becomes prefix material for
    /// match finding; a single default-distribution entropy seed is used
    /// since full header parsing of a trained dictionary's stored tables is
    /// a dictionary-training-path concern, out of scope here.
    pub fn load(content: Vec<u8>, c_params: crate::params::CParams) -> Self {
        CDict {
            content,
            rep: RepOffsets::new(),
            huffman: None,
            ll_table: Some(EncodeTable::from_distribution(LL_DEFAULT_ACC_LOG, &LL_DEFAULT_DISTRIBUTION)),
            ml_table: Some(EncodeTable::from_distribution(ML_DEFAULT_ACC_LOG, &ML_DEFAULT_DISTRIBUTION)),
            of_table: Some(EncodeTable::from_distribution(OF_DEFAULT_ACC_LOG, &OF_DEFAULT_DISTRIBUTION)),
            c_params,
        }
    }
}

/// Attach-vs-copy decision. Cutoffs by strategy (KiB): fast 8, dfast 16,
/// greedy/lazy/lazy2/btlazy2/btopt 32, btultra/btultra2 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictAttachMode {
    Attach,
    Copy,
}

pub fn decide_attach_mode(
    strategy: matchfinder::Strategy,
    pledged_src_size: Option<u64>,
    force_attach: bool,
    force_copy: bool,
) -> DictAttachMode {
    use matchfinder::Strategy::*;
    if force_copy {
        return DictAttachMode::Copy;
    }
    if force_attach {
        return DictAttachMode::Attach;
    }
    let cutoff_kib: u64 = match strategy {
        Fast => 8,
        DFast => 16,
        Greedy | Lazy | Lazy2 | BtLazy2 | BtOpt => 32,
        BtUltra | BtUltra2 => 8,
    };
    match pledged_src_size {
        Some(size) if size <= cutoff_kib * 1024 => DictAttachMode::Attach,
        _ => DictAttachMode::Copy,
    }
}

/// One compression stream's mutable state: the window, match tables,
/// sequence store, repeat-offsets, and prior-block entropy carry-over.
pub struct CCtx {
    pub params: CCtxParams,
    pub window: Window,
    pub rep: RepOffsets,
    pub seq_store: SeqStore,
    pub ldm: LongDistanceMatcher,
    pub checksum: Option<Xxh64>,
    pub capability: Capability,
    pub dict: Option<(CDict, DictAttachMode)>,
    ll_repeat: RepeatMode,
    ml_repeat: RepeatMode,
    of_repeat: RepeatMode,
}

impl CCtx {
    pub fn new(params: CCtxParams) -> Self {
        let ldm_params = if params.enable_ldm {
            LdmParams {
                enabled: true,
                hash_log: params.ldm_hash_log.max(6),
                min_match_length: params.ldm_min_match.max(16),
                bucket_size_log: params.ldm_bucket_size_log.max(1),
                hash_rate_log: params.ldm_hash_rate_log,
            }
        } else {
            LdmParams::disabled()
        };

        CCtx {
            checksum: if params.checksum_flag { Some(Xxh64::new(0)) } else { None },
            window: Window::new(),
            rep: RepOffsets::new(),
            seq_store: SeqStore::new(),
            ldm: LongDistanceMatcher::new(ldm_params),
            capability: Capability::probe(),
            dict: None,
            params,
            ll_repeat: RepeatMode::None,
            ml_repeat: RepeatMode::None,
            of_repeat: RepeatMode::None,
        }
    }

    pub fn attach_dict(&mut self, dict: CDict, force_attach: bool, force_copy: bool) {
        let mode = decide_attach_mode(self.params.c_params.strategy, None, force_attach, force_copy);
        log::debug!("attaching {} byte dictionary as {:?}", dict.content.len(), mode);
        self.rep = dict.rep;
        self.dict = Some((dict, mode));
    }

    /// Reset per-stream state for a new frame.
    pub fn reset_stream(&mut self) {
        log::debug!("resetting stream state for a new frame");
        self.window = Window::new();
        self.rep = self.dict.as_ref().map(|(d, _)| d.rep).unwrap_or_else(RepOffsets::new);
        self.seq_store.reset();
        if let Some(hasher) = &mut self.checksum {
            *hasher = Xxh64::new(0);
        }
        self.ll_repeat = RepeatMode::None;
        self.ml_repeat = RepeatMode::None;
        self.of_repeat = RepeatMode::None;
    }

    /// Compress one block's worth of input, returning the block body bytes
    /// (already entropy-coded) or `None` if it should be emitted raw.
    pub fn compress_block(&mut self, src: &[u8]) -> Res<Option<Vec<u8>>> {
        log::trace!("compressing block of {} bytes", src.len());
        self.seq_store.reset();
        let search_params = matchfinder::SearchParams {
            strategy: self.params.c_params.strategy,
            min_match: self.params.c_params.min_match,
            search_log: self.params.c_params.search_log,
            target_length: self.params.c_params.target_length,
        };
        let dict_mode =
            if self.dict.is_some() { matchfinder::DictMode::DictMatchState } else { matchfinder::DictMode::Prefix };
        let dict_content: &[u8] = self.dict.as_ref().map(|(d, _)| d.content.as_slice()).unwrap_or(&[]);
        let ldm_hints = if self.params.enable_ldm { self.ldm.scan(src) } else { Vec::new() };
        if !ldm_hints.is_empty() {
            log::debug!("long-distance matcher produced {} hints", ldm_hints.len());
        }

        let mut finder = matchfinder::dispatch(search_params, dict_mode);
        finder.compress_block(
            &self.window,
            &mut self.seq_store,
            &mut self.rep,
            src,
            search_params,
            dict_mode,
            dict_content,
            &ldm_hints,
        )?;

        self.window.advance(src.len() as u32);
        self.window.enforce_window_log(self.params.c_params.window_log);

        if let Some(hasher) = &mut self.checksum {
            hasher.update(src);
        }

        let literals = self.seq_store.literals.clone();
        Ok(crate::block::encode_block_body(&self.seq_store, &literals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_mode_respects_strategy_cutoff() {
        let mode = decide_attach_mode(matchfinder::Strategy::Fast, Some(4 * 1024), false, false);
        assert_eq!(mode, DictAttachMode::Attach);
        let mode = decide_attach_mode(matchfinder::Strategy::Fast, Some(64 * 1024), false, false);
        assert_eq!(mode, DictAttachMode::Copy);
    }

    #[test]
    fn forced_flags_override_cutoff() {
        let mode = decide_attach_mode(matchfinder::Strategy::Fast, Some(64 * 1024), true, false);
        assert_eq!(mode, DictAttachMode::Attach);
    }

    #[test_log::test]
    fn ccx_compresses_small_block() {
        let params = CCtxParams::from_level(3, 1024);
        let mut ctx = CCtx::new(params);
        let body = ctx.compress_block(b"hello hello hello hello").unwrap();
        assert!(body.is_some());
    }
}
