use serde::Serialize;

/// Counters for one cache store, or several stores added together.
///
/// All counters except `size` are monotonic for the life of a store.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    /// Entries removed to make room for a new one.
    pub eviction_count: u64,
    /// Entries dropped because their TTL ran out.
    pub expired_count: u64,
    pub insert_count: u64,
    /// Entries removed explicitly or by `clear`.
    pub invalidation_count: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    /// Hits over lookups, 0.0 before the first lookup.
    pub(crate) fn ratio(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Sum the counters of several stores.
    pub fn combine<'a>(stats: impl IntoIterator<Item = &'a CacheStats>) -> CacheStats {
        let mut total = stats.into_iter().fold(CacheStats::default(), |mut acc, s| {
            acc.size += s.size;
            acc.hit_count += s.hit_count;
            acc.miss_count += s.miss_count;
            acc.eviction_count += s.eviction_count;
            acc.expired_count += s.expired_count;
            acc.insert_count += s.insert_count;
            acc.invalidation_count += s.invalidation_count;
            acc
        });
        total.hit_rate = Self::ratio(total.hit_count, total.miss_count);
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_recomputes_hit_rate() {
        let a = CacheStats {
            size: 2,
            hit_count: 3,
            miss_count: 1,
            hit_rate: 0.75,
            ..Default::default()
        };
        let b = CacheStats {
            size: 1,
            hit_count: 0,
            miss_count: 4,
            ..Default::default()
        };

        let total = CacheStats::combine([&a, &b]);
        assert_eq!(total.size, 3);
        assert_eq!(total.hit_count, 3);
        assert_eq!(total.miss_count, 5);
        assert!((total.hit_rate - 0.375).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_ratio_is_zero() {
        assert_eq!(CacheStats::ratio(0, 0), 0.0);
        assert_eq!(CacheStats::combine([]).hit_rate, 0.0);
    }
}
