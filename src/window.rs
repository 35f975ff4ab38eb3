//! Logical window bookkeeping.
//!
//! Tracks a position against a backing buffer using three limits, so a
//! match finder can tell a prefix match from a dictionary match from a
//! stale, overwritten one.

/// Tracks how far back a match is still legally reachable.
///
/// - positions `< low_limit` have been evicted (beyond the window).
/// - positions in `[low_limit, dict_limit)` belong to an attached dictionary
/// or an extDict segment.
/// - positions `>= dict_limit` belong to the current contiguous prefix.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub low_limit: u32,
    pub dict_limit: u32,
    pub next_src: u32,
}

impl Window {
    pub fn new() -> Self {
        Window { low_limit: 0, dict_limit: 0, next_src: 0 }
    }

    /// Register `len` freshly-appended bytes of the prefix.
    pub fn advance(&mut self, len: u32) {
        self.next_src += len;
    }

    /// True if `pos` is still reachable (not evicted below `low_limit`).
    pub fn is_valid(&self, pos: u32) -> bool {
        pos >= self.low_limit
    }

    /// True if `pos` lies in the current contiguous prefix rather than an
    /// attached dictionary / extDict segment.
    pub fn in_prefix(&self, pos: u32) -> bool {
        pos >= self.dict_limit
    }

    /// Start a fresh contiguous segment (used when extDict mode swaps the
    /// dictionary buffer out for a new source buffer) at `new_dict_limit`.
    pub fn start_new_segment(&mut self, new_dict_limit: u32) {
        self.low_limit = self.low_limit.max(self.dict_limit);
        self.dict_limit = new_dict_limit;
        self.next_src = new_dict_limit;
    }

    /// Window-log-derived eviction: anything more than `1 << window_log`
    /// bytes behind `next_src` is no longer addressable by any offset code.
    pub fn enforce_window_log(&mut self, window_log: u32) {
        let window_size = 1u64 << window_log;
        let cutoff = (self.next_src as u64).saturating_sub(window_size);
        if (self.low_limit as u64) < cutoff {
            self.low_limit = cutoff.min(u32::MAX as u64) as u32;
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_respects_window_log() {
        let mut w = Window::new();
        w.advance(1 << 20);
        w.enforce_window_log(10); // 1 KiB window
        assert!(w.low_limit > 0);
        assert!(w.is_valid(w.next_src - 1));
        assert!(!w.is_valid(0));
    }

    #[test]
    fn new_segment_moves_dict_limit_forward() {
        let mut w = Window::new();
        w.advance(100);
        w.start_new_segment(100);
        assert!(!w.in_prefix(50));
        assert!(w.in_prefix(100));
    }
}
