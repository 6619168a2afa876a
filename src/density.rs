//! Density controller: node insertion and rejection.
//!
//! Uses the post-solve bar measurements. Bars much longer than their rest
//! length spawn midpoint nodes; nodes whose incident bars are all much
//! shorter than rest are deleted. Either change invalidates connectivity, so
//! the caller retriangulates afterwards.

use crate::core::{Point2, Rect};
use crate::error::MeshError;
use crate::guide::GuideMesh;
use crate::mesh::{NodeClass, TriMesh};
use crate::quality::BarMetrics;
use crate::settings::MesherSettings;

/// What one add/reject pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DensityOutcome {
    pub added: usize,
    pub removed: usize,
}

impl DensityOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// One add/reject pass over the mesh.
///
/// Rejection runs first on the measured bars, then insertion on the same
/// measurements (deleted endpoints suppress their bars' insertions). The
/// mesh is retriangulated before returning when anything changed.
pub fn add_reject_pass(
    mesh: &mut TriMesh,
    metrics: &BarMetrics,
    guide: &GuideMesh,
    settings: &MesherSettings,
) -> Result<DensityOutcome, MeshError> {
    let removed_nodes = collect_rejections(mesh, metrics, settings.alpha_reject);
    let insertions = collect_insertions(mesh, metrics, &removed_nodes, settings);

    let outcome = DensityOutcome {
        added: insertions.len(),
        removed: removed_nodes.len(),
    };
    if !outcome.changed() {
        return Ok(outcome);
    }

    for (p, class) in insertions {
        let l0 = guide.interpolate(p);
        mesh.push_node(p, class, l0);
    }

    // Swap-remove from the highest index down so earlier indices stay valid.
    let mut doomed: Vec<usize> = removed_nodes;
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    for index in doomed {
        mesh.swap_remove_node(index);
    }

    mesh.retriangulate()?;
    Ok(outcome)
}

/// Deletion candidates: interior nodes whose incident bars are all shorter
/// than `alpha_reject` times their rest length.
///
/// Candidates are taken greedily, most-compressed first; accepting one makes
/// its bar-neighbors ineligible for this pass so a dense cluster collapses
/// one node at a time.
fn collect_rejections(mesh: &TriMesh, metrics: &BarMetrics, alpha_reject: f64) -> Vec<usize> {
    let incident = mesh.incident_bars();
    let neighbors = mesh.neighbor_lists();

    // (mean compression ratio, node). Lower ratio = more compressed.
    let mut candidates: Vec<(f64, usize)> = Vec::new();
    for (i, class) in mesh.classes.iter().enumerate() {
        if class.is_boundary() || incident[i].is_empty() {
            continue;
        }
        let mut ratio_sum = 0.0;
        let mut all_compressed = true;
        for &bi in &incident[i] {
            let rest = metrics.rest_lengths[bi];
            let ratio = if rest > 0.0 {
                metrics.lengths[bi] / rest
            } else {
                1.0
            };
            ratio_sum += ratio;
            if metrics.lengths[bi] >= alpha_reject * rest {
                all_compressed = false;
                break;
            }
        }
        if all_compressed {
            candidates.push((ratio_sum / incident[i].len() as f64, i));
        }
    }

    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut blocked = vec![false; mesh.node_count()];
    let mut accepted = Vec::new();
    for (_, node) in candidates {
        if blocked[node] {
            continue;
        }
        accepted.push(node);
        for &nb in &neighbors[node] {
            blocked[nb] = true;
        }
    }
    accepted
}

/// Midpoint insertions for bars stretched beyond `alpha_add` times rest.
///
/// Bars touching a node doomed for deletion are skipped, and candidate
/// midpoints closer than half the suggesting bar's rest length to an already
/// accepted candidate are dropped.
fn collect_insertions(
    mesh: &TriMesh,
    metrics: &BarMetrics,
    removed_nodes: &[usize],
    settings: &MesherSettings,
) -> Vec<(Point2, NodeClass)> {
    let mut doomed = vec![false; mesh.node_count()];
    for &i in removed_nodes {
        doomed[i] = true;
    }

    let mut accepted: Vec<(Point2, NodeClass, f64)> = Vec::new();
    for (bi, &[a, b]) in mesh.bars.iter().enumerate() {
        if doomed[a] || doomed[b] {
            continue;
        }
        let rest = metrics.rest_lengths[bi];
        if !(metrics.lengths[bi] > settings.alpha_add * rest) {
            continue;
        }

        let midpoint = mesh.points[a].midpoint(mesh.points[b]);
        let dedupe_radius = 0.5 * rest;
        let duplicate = accepted.iter().any(|(p, _, r)| {
            let radius = dedupe_radius.min(*r);
            p.distance_squared_to(midpoint) < radius * radius
        });
        if duplicate {
            continue;
        }

        let class = boundary_bar_class(mesh, a, b, settings.domain);
        accepted.push((midpoint, class, dedupe_radius));
    }

    accepted.into_iter().map(|(p, c, _)| (p, c)).collect()
}

/// Class of a node inserted at the midpoint of bar `(a, b)`.
///
/// A bar lying along a boundary segment (both endpoints on that segment's
/// extent, which is exact after snapping) produces a boundary node of that
/// segment; everything else is interior.
fn boundary_bar_class(mesh: &TriMesh, a: usize, b: usize, domain: Rect) -> NodeClass {
    let (ca, cb) = (mesh.classes[a], mesh.classes[b]);
    if !ca.is_boundary() || !cb.is_boundary() {
        return NodeClass::Interior;
    }
    let (pa, pb) = (mesh.points[a], mesh.points[b]);

    let on = |side: NodeClass, aligned: bool| aligned && segment_side(ca, cb, side);
    for (class, aligned) in [
        (
            NodeClass::Bottom,
            pa.y == domain.y_min && pb.y == domain.y_min,
        ),
        (
            NodeClass::Top,
            pa.y == domain.y_max && pb.y == domain.y_max,
        ),
        (
            NodeClass::Left,
            pa.x == domain.x_min && pb.x == domain.x_min,
        ),
        (
            NodeClass::Right,
            pa.x == domain.x_max && pb.x == domain.x_max,
        ),
    ] {
        if on(class, aligned) {
            return class;
        }
    }
    NodeClass::Interior
}

/// True when both endpoint classes are compatible with `side` (either on the
/// side itself or a corner terminating it).
fn segment_side(ca: NodeClass, cb: NodeClass, side: NodeClass) -> bool {
    let fits = |c: NodeClass| c == side || c == NodeClass::Corner;
    fits(ca) && fits(cb)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
