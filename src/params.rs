//! Sizing parameters for auto-constructed tables.
//!
//! Maps common expected item counts to a hash count and a per-item cell
//! overhead, tuned empirically so that decoding fails on less than 1% of
//! tables filled to the expected count. Counts without an entry fall back
//! to the default pair.

/// Hash count and per-item cell overhead for one expected size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableParams {
    pub hash_count: usize,
    pub overhead: f64,
}

/// Fallback for expected counts without a tuned entry.
pub const DEFAULT_PARAMS: TableParams = TableParams {
    hash_count: 4,
    overhead: 1.36,
};

/// Small tables need proportionally more headroom; the asymptotic
/// overhead only pays off past a few hundred items.
const TUNED: &[(usize, TableParams)] = &[
    (5, TableParams { hash_count: 3, overhead: 4.4 }),
    (10, TableParams { hash_count: 3, overhead: 3.0 }),
    (50, TableParams { hash_count: 4, overhead: 1.8 }),
    (100, TableParams { hash_count: 4, overhead: 1.6 }),
    (1000, TableParams { hash_count: 4, overhead: 1.4 }),
    (10000, TableParams { hash_count: 4, overhead: 1.36 }),
];

/// Tuning pair for an expected item count.
pub fn params_for(expected_items: usize) -> TableParams {
    TUNED
        .iter()
        .find(|(count, _)| *count == expected_items)
        .map(|(_, params)| *params)
        .unwrap_or(DEFAULT_PARAMS)
}

/// Number of cells an auto-sized table allocates for an expected item
/// count: the tuned overhead times the count, rounded up, and never
/// below the hash count so every element can land on distinct cells.
pub fn cell_count(expected_items: usize) -> usize {
    let params = params_for(expected_items);
    let cells = (expected_items as f64 * params.overhead).ceil() as usize;
    cells.max(params.hash_count)
}
