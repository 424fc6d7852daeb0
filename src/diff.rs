//! Symmetric-difference collector populated during decoding.
//!
//! Two deduplicated sets of fixed-width byte strings: alpha holds the
//! elements the decoded table carried with a net positive count, beta the
//! net negative ones. After subtracting table B from table A and decoding,
//! alpha is A-only and beta is B-only.
//!
//! Each set pairs an authoritative slice with a cuckoo-filter prefilter
//! sized to the table's cell count, so membership tests during decoding
//! stay near O(1). The filter can false-positive (resolved by a linear
//! scan of the slice) and is never trusted for a positive answer alone.

use crate::bucket::Bucket;
use cuckoofilter::CuckooFilter;
use std::collections::hash_map::DefaultHasher;
use std::fmt;

struct ByteSet {
    items: Vec<Vec<u8>>,
    filter: CuckooFilter<DefaultHasher>,
    /// Set when the filter refused an insert at capacity; membership
    /// tests then always fall through to the slice scan.
    degraded: bool,
}

impl ByteSet {
    fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            filter: CuckooFilter::with_capacity(capacity.max(1)),
            degraded: false,
        }
    }

    fn insert(&mut self, element: &[u8]) {
        if self.test(element) {
            return;
        }
        if self.filter.add(element).is_err() && !self.degraded {
            self.degraded = true;
            tracing::warn!("membership prefilter full, falling back to linear scans");
        }
        self.items.push(element.to_vec());
    }

    fn test(&self, element: &[u8]) -> bool {
        if !self.degraded && !self.filter.contains(element) {
            return false;
        }
        self.items.iter().any(|item| item == element)
    }

    fn remove(&mut self, element: &[u8]) {
        self.filter.delete(element);
        if let Some(position) = self.items.iter().position(|item| item == element) {
            self.items.remove(position);
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Both sides of a decoded symmetric difference.
pub struct Diff {
    alpha: ByteSet,
    beta: ByteSet,
    cancelled: Vec<Vec<u8>>,
}

impl Diff {
    /// The cell count of the decoded table is a good capacity bound for
    /// the prefilters: a table never yields more elements than cells.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            alpha: ByteSet::new(capacity),
            beta: ByteSet::new(capacity),
            cancelled: Vec::new(),
        }
    }

    /// Record a pure cell.
    ///
    /// A positive cell witnesses an alpha element, a negative cell a beta
    /// element. When the same element surfaces from both signs it belongs
    /// to neither side: the earlier entry is withdrawn, the element lands
    /// on the cancellation channel, and decoding carries on.
    pub(crate) fn encode(&mut self, bucket: &Bucket) {
        let element = bucket.data_sum();
        match bucket.count() {
            1 => {
                if self.beta.test(element) {
                    self.beta.remove(element);
                    self.cancel(element);
                } else {
                    self.alpha.insert(element);
                }
            }
            -1 => {
                if self.alpha.test(element) {
                    self.alpha.remove(element);
                    self.cancel(element);
                } else {
                    self.beta.insert(element);
                }
            }
            // Callers only hand over pure cells.
            _ => {}
        }
    }

    fn cancel(&mut self, element: &[u8]) {
        tracing::warn!(
            element = %hex::encode(element),
            "element surfaced from both sides and cancels out"
        );
        self.cancelled.push(element.to_vec());
    }

    pub fn alpha_slice(&self) -> &[Vec<u8>] {
        &self.alpha.items
    }

    pub fn beta_slice(&self) -> &[Vec<u8>] {
        &self.beta.items
    }

    pub fn alpha_len(&self) -> usize {
        self.alpha.len()
    }

    pub fn beta_len(&self) -> usize {
        self.beta.len()
    }

    pub fn alpha_contains(&self, element: &[u8]) -> bool {
        self.alpha.test(element)
    }

    pub fn beta_contains(&self, element: &[u8]) -> bool {
        self.beta.test(element)
    }

    /// Elements that surfaced from both sides and net-cancelled. Empty on
    /// a clean decode.
    pub fn cancelled(&self) -> &[Vec<u8>] {
        &self.cancelled
    }
}

impl fmt::Debug for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diff")
            .field("alpha_len", &self.alpha_len())
            .field("beta_len", &self.beta_len())
            .field("cancelled", &self.cancelled.len())
            .finish()
    }
}
