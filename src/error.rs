use crate::settings::ConfigError;

/// Fatal failures of the mesh generator.
///
/// Non-convergence at the iteration cap is deliberately NOT an error; it is
/// reported through [`crate::driver::ConvergenceReport::converged`].
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("degenerate geometry: {points} points yielded {triangles} triangles")]
    DegenerateGeometry { points: usize, triangles: usize },
    #[error("stiffness system could not be factorized: {0}")]
    SingularSystem(String),
    #[error("triangle inverted at node {node} after position update")]
    InvertedTriangle { node: usize },
}
