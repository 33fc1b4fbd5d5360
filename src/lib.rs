//! # msmfem
//!
//! msmfem is a Rust library for multiscale mixed finite-element pressure
//! discretizations on polyhedral reservoir grids. It assembles hybridized
//! mimetic cell systems, reduces them by Schur complement to face-pressure
//! form, and constructs coarse-scale basis functions over an arbitrary cell
//! partition so that large heterogeneous models can be solved on a much
//! smaller coarse system.
//!
//! ## Features
//! - Fine-scale mimetic (SIMPLE) inner products and two-point
//!   transmissibilities on general cell-face grids
//! - Hybridized per-cell systems with Schur-complement reduction and
//!   pressure/flux recovery
//! - Coarse topology derivation from any cell partition
//! - Multiscale basis functions driven by permeability- or source-based
//!   weighting, with mobility-independent coarse inner products
//! - Cheap coarse-operator updates when total mobility changes
//!
//! ## Usage
//! Add `msmfem` as a dependency in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! msmfem = "0.1"
//! ```
//!
//! The typical pipeline is: build a [`grid::Grid`], choose a
//! [`partition::Partition`], derive a [`coarse::CoarseTopology`], then call
//! [`coarse::construct`] and [`coarse::CoarseSys::compute_binv`].

pub mod coarse;
pub mod error;
pub mod grid;
pub mod hybsys;
pub mod mimetic;
pub mod partition;
pub mod sparse;
pub mod tpfa;

/// Convenient re-exports of the main entry points.
pub mod prelude {
    pub use crate::coarse::{BinvWorkspace, CoarseSys, CoarseTopology, construct};
    pub use crate::error::{Error, Result};
    pub use crate::grid::Grid;
    pub use crate::hybsys::HybridSystem;
    pub use crate::partition::{BlockCells, Partition};
}
