//! Unified error type for msmfem public APIs.
//!
//! Every fallible public operation in this crate returns [`Result`]. Input
//! contract violations (malformed CSR maps, out-of-range block ids) are
//! reported at construction time; numeric failures (non-positive-definite
//! inner-product blocks, singular local systems) are propagated as typed
//! domain errors instead of falling through silently.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for msmfem operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A grid was constructed with zero cells or zero faces.
    #[error("grid must contain at least one cell and one face")]
    EmptyGrid,
    /// A CSR offset array is not non-decreasing.
    #[error("CSR offsets for `{array}` decrease at position {position}")]
    NonMonotoneOffsets {
        /// Name of the offending offset array.
        array: &'static str,
        /// First position where the offsets decrease.
        position: usize,
    },
    /// An input array has the wrong length for the grid it accompanies.
    #[error("array `{array}` has length {found}, expected {expected}")]
    ArrayLength {
        /// Name of the offending array.
        array: &'static str,
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// An index stored in a topology array is out of range.
    #[error("index {index} in `{array}` exceeds bound {bound}")]
    IndexOutOfBounds {
        /// Name of the offending array.
        array: &'static str,
        /// Offending value.
        index: usize,
        /// Exclusive upper bound.
        bound: usize,
    },
    /// A partition array was empty.
    #[error("partition must cover at least one cell")]
    EmptyPartition,
    /// A coarse block id in `[0, nblocks)` has no fine cells.
    #[error("coarse block {block} has no cells")]
    EmptyBlock {
        /// Offending block id.
        block: usize,
    },
    /// The basis-function weighting of a block summed to zero.
    #[error("basis-function weight of block {block} integrates to zero")]
    ZeroBlockWeight {
        /// Offending block id.
        block: usize,
    },
    /// A fine-scale inner-product block failed its Cholesky factorization.
    #[error("inner-product block of cell {cell} is not positive definite")]
    NonPositiveDefiniteCell {
        /// Offending fine cell.
        cell: usize,
    },
    /// A coarse inner-product block failed its Cholesky factorization.
    #[error("coarse inner-product block {block} is not positive definite")]
    NonPositiveDefiniteBlock {
        /// Offending coarse block.
        block: usize,
    },
    /// The reduced local system of a basis function could not be factored.
    #[error("local basis system for coarse face {coarse_face} is singular")]
    SingularLocalSystem {
        /// Coarse face whose basis function was being constructed.
        coarse_face: usize,
    },
    /// Assembly addressed a matrix entry absent from the sparsity pattern.
    #[error("sparsity pattern has no entry at ({row}, {col})")]
    MissingSparsityEntry {
        /// Row of the missing entry.
        row: usize,
        /// Column of the missing entry.
        col: usize,
    },
}
