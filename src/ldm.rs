//! Long-distance matcher: a coarse rolling-hash pre-scanner that finds
//! matches far outside what the per-block strategy's tables can reach,
//! publishing them as a sparse sequence stream the block matcher treats as
//! hints.
//!
//! Uses a round-robin bucket table (several candidate slots per hash,
//! cycled on insert) rather than a single-slot direct-mapped table, so a
//! recent insert doesn't immediately evict the match that made the bucket
//! useful.

use crate::matchfinder::hash_tables::match_length;

const LDM_HASH_RATE_PRIME: u64 = 0x9E3779B185EBCA87;

#[derive(Debug, Clone, Copy)]
pub struct LdmParams {
    pub enabled: bool,
    pub hash_log: u32,
    pub min_match_length: u32,
    pub bucket_size_log: u32,
    pub hash_rate_log: u32,
}

impl LdmParams {
    pub fn disabled() -> Self {
        LdmParams { enabled: false, hash_log: 0, min_match_length: 64, bucket_size_log: 0, hash_rate_log: 0 }
    }

    pub fn default_enabled(window_log: u32) -> Self {
        let hash_log = window_log.saturating_sub(7).clamp(6, 27);
        LdmParams {
            enabled: true,
            hash_log,
            min_match_length: 64,
            bucket_size_log: 3,
            hash_rate_log: (window_log.saturating_sub(hash_log)).min(31),
        }
    }

    /// Clamp invariant from `hashLog >= bucketSizeLog` and
    /// `hashRateLog < 32`.
    pub fn validate(&self) -> bool {
        !self.enabled || (self.hash_log >= self.bucket_size_log && self.hash_rate_log < 32)
    }
}

/// Absolute-offset match hint the LDM pre-scan hands to the block matcher.
#[derive(Debug, Clone, Copy)]
pub struct RawSequence {
    pub start: u32,
    pub match_length: u32,
    pub offset: u32,
}

struct Bucket {
    slots: Vec<u32>,
    next: usize,
}

pub struct LongDistanceMatcher {
    params: LdmParams,
    buckets: Vec<Bucket>,
}

impl LongDistanceMatcher {
    pub fn new(params: LdmParams) -> Self {
        let n_buckets = if params.enabled { 1usize << params.hash_log } else { 0 };
        let bucket_size = if params.enabled { 1usize << params.bucket_size_log } else { 0 };
        let buckets = (0..n_buckets).map(|_| Bucket { slots: vec![0u32; bucket_size], next: 0 }).collect();
        LongDistanceMatcher { params, buckets }
    }

    fn rolling_hash(bytes: &[u8]) -> u64 {
        let mut h: u64 = 0;
        for &b in bytes {
            h = h.wrapping_mul(LDM_HASH_RATE_PRIME).wrapping_add(b as u64);
        }
        h
    }

    fn publish(&mut self, hash: u64, pos: u32) {
        let n_buckets = self.buckets.len();
        if n_buckets == 0 {
            return;
        }
        let idx = (hash as usize) & (n_buckets - 1);
        let bucket = &mut self.buckets[idx];
        let slot = bucket.next % bucket.slots.len().max(1);
        bucket.slots[slot] = pos;
        bucket.next = bucket.next.wrapping_add(1);
    }

    fn lookup(&self, hash: u64) -> impl Iterator<Item = u32> + '_ {
        let n_buckets = self.buckets.len();
        let idx = if n_buckets > 0 { (hash as usize) & (n_buckets - 1) } else { 0 };
        self.buckets.get(idx).into_iter().flat_map(|b| b.slots.iter().copied().filter(|&p| p != 0))
    }

    /// Pre-scan `src`, publishing rolling-hash positions and emitting any
    /// matches at least `min_match_length` long as `RawSequence` hints.
    pub fn scan(&mut self, src: &[u8]) -> Vec<RawSequence> {
        if !self.params.enabled || src.len() < self.params.min_match_length as usize {
            return Vec::new();
        }
        log::trace!("long-distance pre-scan over {} bytes, min match {}", src.len(), self.params.min_match_length);
        let min_len = self.params.min_match_length as usize;
        let mut out = Vec::new();
        let mut pos = 0usize;
        while pos + min_len <= src.len() {
            let window = &src[pos..pos + min_len];
            let hash = Self::rolling_hash(window);

            let mut best: Option<(usize, u32)> = None;
            for candidate in self.lookup(hash) {
                let cpos = candidate as usize;
                if cpos >= pos {
                    continue;
                }
                let len = match_length(src, cpos, src, pos);
                if len as usize >= min_len && best.map_or(true, |(bl, _)| len as usize > bl) {
                    best = Some((len as usize, (pos - cpos) as u32));
                }
            }

            self.publish(hash, pos as u32);

            match best {
                Some((len, dist)) => {
                    out.push(RawSequence { start: pos as u32, match_length: len as u32, offset: dist });
                    pos += len;
                }
                None => pos += 1 << self.params.hash_rate_log.min(6),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_invariant_holds_for_default_params() {
        let p = LdmParams::default_enabled(24);
        assert!(p.validate());
    }

    #[test_log::test]
    fn finds_a_far_repeated_block() {
        let mut first = vec![0u8; 70];
        first[..4].copy_from_slice(b"abcd");
        let mut src = first.clone();
        src.extend(vec![1u8; 500]);
        src.extend(first);
        let mut ldm = LongDistanceMatcher::new(LdmParams::default_enabled(20));
        let hints = ldm.scan(&src);
        assert!(!hints.is_empty());
    }
}
