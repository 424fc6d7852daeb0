//! The table: a cell array summarizing a multiset of fixed-width byte
//! strings, with subtraction and a peeling decoder on top.
//!
//! Every element lands on k distinct cells chosen by a salted keyed hash.
//! Inserting updates those k cells symmetrically; deleting applies the
//! exact inverse, so a balanced insert and delete leaves no trace. Two
//! tables of identical shape can be subtracted cell-wise, after which
//! decoding recovers the symmetric difference of the multisets they
//! summarized: net-positive elements on one side, net-negative on the
//! other.
//!
//! Decoding is self-destructive. It repeatedly harvests pure cells (cells
//! holding exactly one element), records their element, and removes that
//! element from the other cells it occupies, which exposes further pure
//! cells. The loop converges because every peel strictly shrinks the total
//! occupancy; it fails cleanly when the difference outgrew the table.

use crate::bitset::BitSet;
use crate::bucket::Bucket;
use crate::diff::Diff;
use crate::hash;
use crate::params;
use crate::SketchError;
use std::collections::VecDeque;

/// Default element width in bytes for auto-sized tables.
pub const DEFAULT_DATA_BYTES: usize = 6;
/// Default checksum-prefix width in bytes for auto-sized tables.
pub const DEFAULT_HASH_BYTES: usize = 3;

/// Serialized header: cell count, data width, hash width, hash count,
/// each big-endian u16.
const HEADER_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Table {
    cells: usize,
    data_len: usize,
    hash_len: usize,
    hash_count: usize,
    buckets: Vec<Option<Bucket>>,
    /// Scratch mask holding the k-index set of the element currently
    /// being applied. Reused across operations to avoid reallocation.
    scratch: BitSet,
}

impl Table {
    /// Build a table with an explicit shape: `cells` cells, `data_len`-byte
    /// elements, `hash_len`-byte checksum prefixes, `hash_count` cells per
    /// element.
    ///
    /// Panics when the shape is unusable: zero-width elements, a hash
    /// count of zero or larger than the cell count, a checksum wider than
    /// the digest, or a cell count that cannot be serialized.
    pub fn new_table(cells: usize, data_len: usize, hash_len: usize, hash_count: usize) -> Self {
        assert!(data_len >= 1, "element width must be at least one byte");
        assert!(hash_count >= 1, "at least one hash function is required");
        assert!(
            hash_count <= cells,
            "hash count must not exceed the cell count"
        );
        assert!(
            hash_len <= hash::DIGEST_LEN,
            "checksum width must not exceed the digest width"
        );
        assert!(
            cells <= u16::MAX as usize && data_len <= u16::MAX as usize,
            "table shape must fit the serialized header"
        );

        Self {
            cells,
            data_len,
            hash_len,
            hash_count,
            buckets: vec![None; cells],
            scratch: BitSet::new(cells),
        }
    }

    /// Build a table sized for an expected number of items, using the
    /// tuned parameter table and the default element and checksum widths.
    pub fn new(expected_items: usize) -> Self {
        let params = params::params_for(expected_items);
        Self::new_table(
            params::cell_count(expected_items),
            DEFAULT_DATA_BYTES,
            DEFAULT_HASH_BYTES,
            params.hash_count,
        )
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    pub fn hash_len(&self) -> usize {
        self.hash_len
    }

    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    /// True when no cell holds anything.
    pub fn is_empty(&self) -> bool {
        self.buckets
            .iter()
            .all(|cell| cell.as_ref().map_or(true, Bucket::empty))
    }

    /// Add one copy of the element to the multiset.
    pub fn insert(&mut self, element: &[u8]) -> Result<(), SketchError> {
        self.apply(element, true)
    }

    /// Remove one copy of the element. Deleting an element that was never
    /// inserted is legal and drives the touched counts negative; the
    /// decoder reports such elements on the beta side.
    pub fn delete(&mut self, element: &[u8]) -> Result<(), SketchError> {
        self.apply(element, false)
    }

    fn apply(&mut self, element: &[u8], insert: bool) -> Result<(), SketchError> {
        self.fill_index_mask(element)?;
        let (data_len, hash_len) = (self.data_len, self.hash_len);
        for index in self.scratch.ones() {
            let bucket = self.buckets[index].get_or_insert_with(|| Bucket::new(data_len, hash_len));
            bucket.update(element, insert);
        }
        Ok(())
    }

    /// Materialize the element's k distinct cell indices into the scratch
    /// mask. The salt increments on every draw, including draws rejected
    /// as duplicates; tables that disagree on this sequence cannot be
    /// reconciled against each other.
    fn fill_index_mask(&mut self, element: &[u8]) -> Result<(), SketchError> {
        if element.len() != self.data_len {
            return Err(SketchError::LengthMismatch {
                expected: self.data_len,
                got: element.len(),
            });
        }

        self.scratch.clear_all();
        let mut salt = 1u64;
        let mut found = 0;
        while found < self.hash_count {
            let seed = hash::index_seed(element, salt);
            salt += 1;
            let index = (seed % self.cells as u64) as usize;
            if !self.scratch.test(index) {
                self.scratch.set(index);
                found += 1;
            }
        }
        Ok(())
    }

    /// Cell-wise subtraction: afterwards this table summarizes the
    /// difference of the two multisets, and decoding it yields alpha =
    /// elements only in `self`, beta = elements only in `other`.
    ///
    /// The operand is untouched; cells present only in the operand are
    /// grafted into this table as negated copies.
    pub fn subtract(&mut self, other: &Table) -> Result<(), SketchError> {
        self.check_shape(other)?;

        for (mine, theirs) in self.buckets.iter_mut().zip(&other.buckets) {
            let Some(theirs) = theirs else { continue };
            match mine {
                Some(bucket) => bucket.subtract(theirs),
                None => {
                    let mut grafted = theirs.clone();
                    grafted.negate();
                    *mine = Some(grafted);
                }
            }
        }
        Ok(())
    }

    fn check_shape(&self, other: &Table) -> Result<(), SketchError> {
        if self.cells != other.cells {
            return Err(SketchError::ShapeMismatch("cell count"));
        }
        if self.data_len != other.data_len {
            return Err(SketchError::ShapeMismatch("data length"));
        }
        if self.hash_len != other.hash_len {
            return Err(SketchError::ShapeMismatch("hash length"));
        }
        if self.hash_count != other.hash_count {
            return Err(SketchError::ShapeMismatch("hash count"));
        }
        if self.buckets.len() != other.buckets.len() {
            return Err(SketchError::ShapeMismatch("bucket array length"));
        }
        Ok(())
    }

    /// Recover the symmetric difference by peeling. Consumes the table:
    /// every recorded element is removed from its cells as it surfaces,
    /// and a successful decode drains the table completely.
    ///
    /// Fails with [`SketchError::NoPureCells`] when a non-empty table
    /// offers nothing to peel, and with [`SketchError::DirtyResidue`]
    /// when peeling stalls with occupied cells left. Both mean the
    /// difference exceeded the table's designed capacity.
    pub fn decode(mut self) -> Result<Diff, SketchError> {
        let mut diff = Diff::new(self.cells);
        if self.is_empty() {
            return Ok(diff);
        }

        let mut queue = VecDeque::new();
        self.enqueue_pure(&mut queue)?;
        if queue.is_empty() {
            return Err(SketchError::NoPureCells);
        }

        let mut round = 0usize;
        while !queue.is_empty() {
            round += 1;
            tracing::debug!(round, pending = queue.len(), "peeling round");
            while let Some(snapshot) = queue.pop_front() {
                diff.encode(&snapshot);
                // The inverse of the net operation that built this cell:
                // insert for a negative count, delete for a positive one.
                self.apply(snapshot.data_sum(), snapshot.count() < 0)?;
            }
            // Peeling may have exposed new pure cells; when it did not,
            // the loop exits and the residue check below decides.
            self.enqueue_pure(&mut queue)?;
        }

        if !self.is_empty() {
            return Err(SketchError::DirtyResidue);
        }
        Ok(diff)
    }

    /// Scan cells in ascending order and queue a snapshot of every pure
    /// cell that survives two guards:
    ///
    /// - re-deriving the cell indices of the surfaced value must include
    ///   the cell it was found in, otherwise the checksum matched by
    ///   coincidence (a false pure) and the cell is skipped;
    /// - positions covered by an already-queued element's index set are
    ///   skipped, since the same element is pure at each of its cells.
    fn enqueue_pure(&mut self, queue: &mut VecDeque<Bucket>) -> Result<(), SketchError> {
        let mut pure_mask = BitSet::new(self.cells);
        for index in 0..self.buckets.len() {
            if pure_mask.test(index) {
                continue;
            }
            let snapshot = match &self.buckets[index] {
                Some(bucket) if bucket.pure() => bucket.clone(),
                _ => continue,
            };
            self.fill_index_mask(snapshot.data_sum())?;
            if !self.scratch.test(index) {
                continue;
            }
            pure_mask.union_with(&self.scratch);
            queue.push_back(snapshot);
        }
        Ok(())
    }

    /// Serialize to the sparse wire format (big-endian throughout):
    ///
    /// ```text
    /// header:  cells | data_len | hash_len | hash_count   (u16 each)
    /// record:  index | count | data_sum | hash_sum        (per non-empty cell)
    ///           u16     u16    D bytes    H bytes
    /// ```
    ///
    /// The count is stored as the low 16 bits of the signed counter.
    /// Empty and absent cells are omitted.
    pub fn serialize(&self) -> Vec<u8> {
        let live = self
            .buckets
            .iter()
            .flatten()
            .filter(|bucket| !bucket.empty())
            .count();
        let record_len = 4 + self.data_len + self.hash_len;
        let mut buf = Vec::with_capacity(HEADER_LEN + live * record_len);

        for field in [
            self.cells as u16,
            self.data_len as u16,
            self.hash_len as u16,
            self.hash_count as u16,
        ] {
            buf.extend_from_slice(&field.to_be_bytes());
        }

        for (index, cell) in self.buckets.iter().enumerate() {
            let Some(bucket) = cell else { continue };
            if bucket.empty() {
                continue;
            }
            buf.extend_from_slice(&(index as u16).to_be_bytes());
            buf.extend_from_slice(&(bucket.count() as u16).to_be_bytes());
            buf.extend_from_slice(bucket.data_sum());
            buf.extend_from_slice(bucket.hash_sum());
        }
        buf
    }

    /// Rebuild a table from its serialized form. The end of the stream is
    /// detected by exhausting the buffer; a partial record, an out-of-range
    /// cell index, or an unusable header is an error.
    pub fn deserialize(data: &[u8]) -> Result<Table, SketchError> {
        if data.len() < HEADER_LEN {
            return Err(SketchError::Truncated {
                need: HEADER_LEN,
                got: data.len(),
            });
        }

        let cells = u16::from_be_bytes([data[0], data[1]]) as usize;
        let data_len = u16::from_be_bytes([data[2], data[3]]) as usize;
        let hash_len = u16::from_be_bytes([data[4], data[5]]) as usize;
        let hash_count = u16::from_be_bytes([data[6], data[7]]) as usize;

        if data_len == 0 {
            return Err(SketchError::ShapeMismatch("data length"));
        }
        if hash_count == 0 || hash_count > cells {
            return Err(SketchError::ShapeMismatch("hash count"));
        }
        if hash_len > hash::DIGEST_LEN {
            return Err(SketchError::ShapeMismatch("hash length"));
        }

        let mut table = Table::new_table(cells, data_len, hash_len, hash_count);
        let record_len = 4 + data_len + hash_len;
        let mut offset = HEADER_LEN;
        while offset < data.len() {
            if data.len() - offset < record_len {
                return Err(SketchError::Truncated {
                    need: offset + record_len,
                    got: data.len(),
                });
            }
            let index = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
            if index >= cells {
                return Err(SketchError::CellIndexOutOfRange { index, cells });
            }
            let count = i16::from_be_bytes([data[offset + 2], data[offset + 3]]) as i64;
            let data_sum = data[offset + 4..offset + 4 + data_len].to_vec();
            let hash_sum = data[offset + 4 + data_len..offset + record_len].to_vec();
            table.buckets[index] = Some(Bucket {
                data_sum,
                hash_sum,
                count,
            });
            offset += record_len;
        }
        Ok(table)
    }
}

/// Cell-wise equality. An absent cell and a present-but-empty cell are
/// the same state (serialization cannot tell them apart), so they compare
/// equal here too.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
            && self.data_len == other.data_len
            && self.hash_len == other.hash_len
            && self.hash_count == other.hash_count
            && self
                .buckets
                .iter()
                .zip(&other.buckets)
                .all(|pair| match pair {
                    (Some(a), Some(b)) => a == b,
                    (None, None) => true,
                    (Some(present), None) | (None, Some(present)) => present.empty(),
                })
    }
}

impl Eq for Table {}
