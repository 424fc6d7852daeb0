//! Invertible Bloom Lookup Table (IBLT) for set reconciliation.
//!
//! An IBLT compactly summarizes a multiset of fixed-width byte strings and
//! lets two parties recover the symmetric difference of their sets in space
//! proportional to the number of differences, not the size of the sets.
//!
//! Protocol:
//! 1. Alice builds a [`Table`] over her element IDs and ships the serialized
//!    bytes to Bob
//! 2. Bob builds a table with the same shape over his own IDs and calls
//!    [`Table::subtract`] with Alice's copy
//! 3. [`Table::decode`] peels the result into a [`Diff`]: the elements only
//!    Bob holds surface on one side, the elements only Alice holds on the
//!    other
//!
//! Theory: each cell stores the XOR of all elements hashed to it, the XOR of
//! their checksums, and a signed occupancy count. A cell holding exactly one
//! element can be recognized (it is "pure") and its element extracted;
//! removing that element from the other cells it occupies exposes further
//! pure cells, until the table drains or decoding stalls. Decoding succeeds
//! with high probability while the number of differences stays within the
//! capacity the table was sized for; past that point failure is detected and
//! reported, never masked.

pub mod bucket;
pub mod diff;
pub mod hash;
pub mod params;
pub mod table;

mod bitset;

pub use bucket::Bucket;
pub use diff::Diff;
pub use params::TableParams;
pub use table::{Table, DEFAULT_DATA_BYTES, DEFAULT_HASH_BYTES};

use thiserror::Error;

/// Errors surfaced by table operations and decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// The element's byte length does not match the table's data width.
    #[error("element length mismatch: table stores {expected}-byte elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Subtract operands (or a serialized header) disagree on table shape.
    #[error("table shape mismatch: {0}")]
    ShapeMismatch(&'static str),

    /// Decoding started on a non-empty table holding no pure cells.
    /// The symmetric difference exceeded the table's capacity; retry with
    /// a larger table.
    #[error("no pure cells in a non-empty table")]
    NoPureCells,

    /// Peeling converged but non-empty cells remained.
    #[error("dirty cells remained after peeling")]
    DirtyResidue,

    /// A serialized table ended mid-record.
    #[error("serialized table truncated: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    /// A serialized record names a cell outside the table.
    #[error("cell index {index} out of range for {cells} cells")]
    CellIndexOutOfRange { index: usize, cells: usize },
}
