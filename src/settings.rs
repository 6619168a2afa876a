//! Mesher configuration.
//!
//! `MesherSettings` carries every core-visible knob. Values are plain data;
//! validation is explicit via [`MesherSettings::validate`] so that settings
//! deserialized from a host config surface errors in one place.

use serde::{Deserialize, Serialize};

use crate::core::Rect;

/// How the desired edge-length field is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refinement {
    /// Constant edge length `h0` everywhere.
    #[default]
    Regular,
    /// Edge length interpolated from a guide mesh.
    GuideMesh,
}

/// Errors for invalid mesher configuration. Fatal, surfaced before the loop
/// starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("q_tol must be in (0, 1], got {value}")]
    QTolOutOfRange { value: f64 },
    #[error("mean_q_tol must be in (0, 1], got {value}")]
    MeanQTolOutOfRange { value: f64 },
    #[error("mean_misfit_bar_length_tol must be positive, got {value}")]
    MisfitTolOutOfRange { value: f64 },
    #[error("h0 must be positive and finite, got {value}")]
    InvalidH0 { value: f64 },
    #[error("itmax must be at least 1")]
    ZeroIterations,
    #[error("alpha_add ({alpha_add}) must exceed alpha_reject ({alpha_reject})")]
    AlphaOrder { alpha_add: f64, alpha_reject: f64 },
    #[error("rest_length_scale must be positive and finite, got {value}")]
    InvalidRestLengthScale { value: f64 },
    #[error("domain extents are invalid: x [{x_min}, {x_max}], y [{y_min}, {y_max}]")]
    InvalidDomain {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },
    #[error("guide mesh has no vertices")]
    EmptyGuideMesh,
    #[error("guide mesh has no triangles")]
    GuideMeshWithoutTriangles,
    #[error("guide mesh triangle {triangle} references vertex {vertex} out of range")]
    GuideMeshIndexOutOfRange { triangle: usize, vertex: usize },
    #[error("guide mesh vertex {vertex} has non-positive desired length {value}")]
    NonPositiveGuideLength { vertex: usize, value: f64 },
    #[error("guide mesh vertex {vertex} has non-finite coordinates")]
    NonFiniteGuideVertex { vertex: usize },
    #[error("refinement is guide_mesh but no guide mesh was supplied")]
    MissingGuideMesh,
    #[error("refined window must lie inside the domain")]
    WindowOutsideDomain,
}

/// Every core-visible knob of the mesher.
///
/// Defaults follow the reference parameterization; `rest_length_scale`,
/// `cross_bar_stiffness`, `balloon_coefficient` and `assembly_block_size` are
/// the tunables the iteration itself does not prescribe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherSettings {
    /// Iteration cap for the outer fixed-point loop.
    pub itmax: u32,
    /// Per-triangle quality target; the mesh converges when every triangle
    /// reaches it.
    pub q_tol: f64,
    /// Mean quality target over all triangles.
    pub mean_q_tol: f64,
    /// Mean relative bar-length misfit below which the driver switches from
    /// the density phase to the smoothing phase.
    pub mean_misfit_bar_length_tol: f64,
    /// Uniform desired edge length; used only when `refinement` is `Regular`.
    pub h0: f64,
    /// Source of the desired edge-length field.
    pub refinement: Refinement,
    /// Inject shear-resisting virtual bars per triangle.
    pub cross_bars: bool,
    /// Add area-deficit pressure forces per triangle.
    pub balloon_forces: bool,
    /// A bar longer than `alpha_add` times its rest length spawns a midpoint
    /// node.
    pub alpha_add: f64,
    /// A node whose incident bars are all shorter than `alpha_reject` times
    /// their rest lengths is deleted.
    pub alpha_reject: f64,
    /// Rectangular domain extents.
    pub domain: Rect,
    /// Global factor applied to bar rest lengths so the relaxed mesh targets
    /// an average triangle area slightly above `L0²·√3/4`.
    pub rest_length_scale: f64,
    /// Stiffness multiplier for cross-bars.
    pub cross_bar_stiffness: f64,
    /// Scale for balloon forces.
    pub balloon_coefficient: f64,
    /// Number of element contributions accumulated locally before scattering
    /// into the global sparse assembly. Performance knob only.
    pub assembly_block_size: usize,
}

impl Default for MesherSettings {
    fn default() -> Self {
        Self {
            itmax: 10,
            q_tol: 0.60,
            mean_q_tol: 0.90,
            mean_misfit_bar_length_tol: 0.15,
            h0: 0.1,
            refinement: Refinement::Regular,
            cross_bars: false,
            balloon_forces: false,
            alpha_add: 1.4,
            alpha_reject: 0.6,
            domain: Rect::UNIT,
            rest_length_scale: 1.2,
            cross_bar_stiffness: 1.0,
            balloon_coefficient: 0.05,
            assembly_block_size: 256,
        }
    }
}

impl MesherSettings {
    /// Settings for a regular (constant `h0`) mesh over `domain`.
    #[must_use]
    pub fn regular(domain: Rect, h0: f64) -> Self {
        Self {
            domain,
            h0,
            refinement: Refinement::Regular,
            ..Self::default()
        }
    }

    /// Settings for a guide-mesh-driven mesh over `domain`.
    #[must_use]
    pub fn guided(domain: Rect) -> Self {
        Self {
            domain,
            refinement: Refinement::GuideMesh,
            ..Self::default()
        }
    }

    /// Check every knob; returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.q_tol > 0.0 && self.q_tol <= 1.0) {
            return Err(ConfigError::QTolOutOfRange { value: self.q_tol });
        }
        if !(self.mean_q_tol > 0.0 && self.mean_q_tol <= 1.0) {
            return Err(ConfigError::MeanQTolOutOfRange {
                value: self.mean_q_tol,
            });
        }
        if !(self.mean_misfit_bar_length_tol > 0.0) || !self.mean_misfit_bar_length_tol.is_finite()
        {
            return Err(ConfigError::MisfitTolOutOfRange {
                value: self.mean_misfit_bar_length_tol,
            });
        }
        if self.itmax == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.refinement == Refinement::Regular && !(self.h0 > 0.0 && self.h0.is_finite()) {
            return Err(ConfigError::InvalidH0 { value: self.h0 });
        }
        if self.alpha_add <= self.alpha_reject {
            return Err(ConfigError::AlphaOrder {
                alpha_add: self.alpha_add,
                alpha_reject: self.alpha_reject,
            });
        }
        if !(self.rest_length_scale > 0.0 && self.rest_length_scale.is_finite()) {
            return Err(ConfigError::InvalidRestLengthScale {
                value: self.rest_length_scale,
            });
        }
        if !self.domain.is_valid() {
            return Err(ConfigError::InvalidDomain {
                x_min: self.domain.x_min,
                x_max: self.domain.x_max,
                y_min: self.domain.y_min,
                y_max: self.domain.y_max,
            });
        }
        Ok(())
    }
}
