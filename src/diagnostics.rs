//! Diagnostics for generated meshes.
//!
//! `MeshDiagnostics` snapshots counts, quality aggregates and bar misfit for
//! a mesh, independent of the driver's convergence report. Hosts use it for
//! logging and validation; the core never branches on it.

use std::fmt;

use crate::mesh::TriMesh;
use crate::quality::{BarMetrics, QualityReport, bar_metrics, evaluate_quality};

/// Topology and quality snapshot of a mesh.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshDiagnostics {
    /// Total node count.
    pub node_count: usize,
    /// Interior (unconstrained) node count.
    pub interior_count: usize,
    /// Triangle count.
    pub triangle_count: usize,
    /// Bar count.
    pub bar_count: usize,
    /// Minimum triangle quality.
    pub worst_q: f64,
    /// Mean triangle quality.
    pub mean_q: f64,
    /// Mean relative bar-length misfit.
    pub mean_misfit_bar_length: f64,
    /// Number of triangles with non-positive signed area.
    pub inverted_triangle_count: usize,
    /// Human-readable warnings.
    pub warnings: Vec<String>,
}

impl MeshDiagnostics {
    /// Measure a mesh. `rest_length_scale` matches the driver setting so the
    /// misfit numbers agree with the iteration's own.
    #[must_use]
    pub fn measure(mesh: &TriMesh, rest_length_scale: f64) -> Self {
        let quality: QualityReport = evaluate_quality(mesh);
        let metrics: BarMetrics = bar_metrics(mesh, rest_length_scale);
        let inverted = quality.q.iter().filter(|&&q| q <= 0.0).count();

        let mut warnings = Vec::new();
        if inverted > 0 {
            warnings.push(format!("mesh has {inverted} inverted triangle(s)"));
        }
        if mesh.triangles.is_empty() {
            warnings.push("mesh has no triangles".to_string());
        }

        Self {
            node_count: mesh.node_count(),
            interior_count: mesh.interior_count(),
            triangle_count: mesh.triangle_count(),
            bar_count: mesh.bar_count(),
            worst_q: quality.worst,
            mean_q: quality.mean,
            mean_misfit_bar_length: metrics.mean_misfit,
            inverted_triangle_count: inverted,
            warnings,
        }
    }

    /// Returns `true` when every triangle has strictly positive area.
    #[must_use]
    pub fn is_orientable(&self) -> bool {
        self.inverted_triangle_count == 0
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Short one-line summary suitable for logging.
    ///
    /// Format: `"N:{nodes} T:{triangles} B:{bars} q:{worst}/{mean} misfit:{m}"`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "N:{} T:{} B:{} q:{:.3}/{:.3} misfit:{:.3}",
            self.node_count,
            self.triangle_count,
            self.bar_count,
            self.worst_q,
            self.mean_q,
            self.mean_misfit_bar_length
        )
    }
}

impl fmt::Display for MeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(
            f,
            "  Nodes: {} ({} interior)",
            self.node_count, self.interior_count
        )?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Bars: {}", self.bar_count)?;
        writeln!(f, "  Quality: worst {:.4}, mean {:.4}", self.worst_q, self.mean_q)?;
        writeln!(
            f,
            "  Bar misfit: mean {:.4}",
            self.mean_misfit_bar_length
        )?;
        if self.inverted_triangle_count > 0 {
            writeln!(f, "  Inverted triangles: {}", self.inverted_triangle_count)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point2;
    use crate::mesh::NodeClass;

    fn small_mesh() -> TriMesh {
        let mut mesh = TriMesh::from_points(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.5, 0.9),
            ],
            vec![NodeClass::Corner, NodeClass::Corner, NodeClass::Interior],
        );
        mesh.l0 = vec![1.0; 3];
        mesh.retriangulate().unwrap();
        mesh
    }

    #[test]
    fn measure_counts_and_quality() {
        let diag = MeshDiagnostics::measure(&small_mesh(), 1.0);

        assert_eq!(diag.node_count, 3);
        assert_eq!(diag.interior_count, 1);
        assert_eq!(diag.triangle_count, 1);
        assert_eq!(diag.bar_count, 3);
        assert!(diag.worst_q > 0.8);
        assert!(diag.is_orientable());
        assert!(!diag.has_warnings());
    }

    #[test]
    fn summary_contains_counts() {
        let diag = MeshDiagnostics::measure(&small_mesh(), 1.0);
        let summary = diag.summary();
        assert!(summary.contains("N:3"));
        assert!(summary.contains("T:1"));
        assert!(summary.contains("B:3"));
    }

    #[test]
    fn display_reports_warnings() {
        let mut diag = MeshDiagnostics::measure(&small_mesh(), 1.0);
        diag.warnings.push("test warning".to_string());
        let output = format!("{diag}");
        assert!(output.contains("Nodes: 3"));
        assert!(output.contains("test warning"));
    }
}
