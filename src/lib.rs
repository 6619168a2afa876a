//! 2D unstructured triangular mesh generation by spring relaxation.
//!
//! The mesher treats every triangle edge as an axial spring whose rest
//! length comes from a spatially varying desired-length field, and iterates:
//!
//! 1. solve the assembled truss for new node positions,
//! 2. re-triangulate the point set (Delaunay),
//! 3. add or remove nodes to track the desired nodal density,
//! 4. smooth interior nodes to lift triangle quality,
//!
//! until every triangle reaches the quality tolerance or the iteration cap
//! is hit. The desired-length field is supplied either as a constant (`h0`)
//! or by piecewise-linear interpolation over a small static guide mesh.
//!
//! # Example
//!
//! ```ignore
//! use springmesh::{MeshDriver, MesherSettings, Rect};
//!
//! let settings = MesherSettings::regular(Rect::UNIT, 0.1);
//! let result = MeshDriver::new(settings)?.run()?;
//! assert!(result.report.converged);
//! println!("{} nodes, worst q {:.3}", result.mesh.node_count(), result.report.worst_q);
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod assembly;
mod core;
mod delaunay;
mod density;
mod diagnostics;
mod driver;
mod error;
mod guide;
mod mesh;
mod quality;
mod seed;
mod settings;
mod smooth;

pub use crate::core::{Point2, Rect, Tolerance, Vec2, barycentric, orient2d, signed_area};
pub use assembly::{displaced_positions, find_inverted, solve_displacements};
pub use delaunay::triangulate;
pub use density::{DensityOutcome, add_reject_pass};
pub use diagnostics::MeshDiagnostics;
pub use driver::{ConvergenceReport, MeshDriver, MeshingResult};
pub use error::MeshError;
pub use guide::GuideMesh;
pub use mesh::{NodeClass, TriMesh, extract_bars};
pub use quality::{BarMetrics, QualityReport, bar_metrics, evaluate_quality, triangle_quality};
pub use seed::{seed_mesh, side_segment_count};
pub use settings::{ConfigError, MesherSettings, Refinement};
pub use smooth::{SmoothOutcome, smooth_pass};

#[cfg(test)]
mod tests;
