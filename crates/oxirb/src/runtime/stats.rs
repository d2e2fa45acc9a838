//! Dispatch and cache counters.

/// Counters accumulated by a [`Runtime`](crate::Runtime) since boot (or the
/// last [`reset_stats`](crate::Runtime::reset_stats)).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Method sends, including hook and `method_missing` dispatches.
    pub dispatches: usize,

    /// Method lookups answered from a per-class cache.
    pub method_cache_hits: usize,

    /// Method lookups that walked the ancestor list.
    pub method_cache_misses: usize,

    /// Qualified and relative constant lookups answered from a cache.
    pub const_cache_hits: usize,

    /// Constant lookups that walked scopes.
    pub const_cache_misses: usize,

    /// Calls routed to `method_missing`.
    pub method_missing_calls: usize,

    /// Alias trampolines taken.
    pub alias_hops: usize,
}

fn rate(hits: usize, misses: usize) -> Option<f64> {
    let total = hits + misses;
    if total == 0 {
        None
    } else {
        #[allow(clippy::cast_precision_loss)]
        Some(hits as f64 / total as f64)
    }
}

impl RuntimeStats {
    /// Method cache hit rate in `0.0..=1.0`, or `None` before any lookup.
    #[must_use]
    pub fn method_hit_rate(&self) -> Option<f64> {
        rate(self.method_cache_hits, self.method_cache_misses)
    }

    /// Constant cache hit rate in `0.0..=1.0`, or `None` before any lookup.
    #[must_use]
    pub fn const_hit_rate(&self) -> Option<f64> {
        rate(self.const_cache_hits, self.const_cache_misses)
    }
}
