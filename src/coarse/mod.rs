//! Coarse-scale multiscale machinery.
//!
//! This module takes a fine [`Grid`](crate::grid::Grid) and a cell
//! [`Partition`](crate::partition::Partition) and produces everything the
//! coarse pressure solve consumes:
//! - [`topology::CoarseTopology`] — the coarse block/face incidence;
//! - [`system::CoarseSys`] — basis-function fluxes, per-cell inner
//!   products, and per-block inverse coarse inner products;
//! - [`builder::construct`] — the construction pass tying them together.
//!
//! The remaining submodules are its internals: the fine-face hash set and
//! block adjacency used while deriving the topology, the per-construction
//! metadata, and the source weighting.

pub mod adjacency;
pub mod builder;
pub mod face_set;
pub mod meta;
pub mod system;
pub mod topology;
pub mod weight;

pub use builder::construct;
pub use system::{BinvWorkspace, CoarseSys};
pub use topology::CoarseTopology;
