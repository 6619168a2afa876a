//! Guide-mesh-driven refinement scenarios.

use crate::core::{Point2, Rect};
use crate::driver::MeshDriver;
use crate::guide::GuideMesh;
use crate::seed;
use crate::settings::MesherSettings;

fn count_nodes_in(points: &[Point2], window: Rect) -> usize {
    points.iter().filter(|p| window.contains(**p)).count()
}

#[test]
fn refined_window_attracts_nodes() {
    // 4× refinement inside a centered 0.3×0.3 window, starting from a
    // coarse host-provided mesh; the density controller has to build the
    // refinement by insertion.
    let domain = Rect::UNIT;
    let window = Rect::new(0.35, 0.65, 0.35, 0.65);
    let guide = GuideMesh::rect_with_refined_window(domain, window, 0.15, 0.1, 0.025).unwrap();

    let mut settings = MesherSettings::guided(domain);
    settings.itmax = 30;
    let driver = MeshDriver::with_guide(settings, guide).unwrap();

    let coarse = GuideMesh::uniform(domain, 0.1).unwrap();
    let start = seed::seed_mesh(domain, &coarse);
    let result = driver.run_from(start).unwrap();

    assert!(result.mesh.all_triangles_positive());
    assert!(result.mesh.validate().is_ok());

    // Equal-area corner window for comparison. The refined field is 4×
    // shorter, so nodal density inside the window runs roughly 16× the
    // coarse region's and comfortably clears the 8× bound.
    let corner = Rect::new(0.0, 0.3, 0.0, 0.3);
    let inside = count_nodes_in(&result.mesh.points, window);
    let outside = count_nodes_in(&result.mesh.points, corner);

    assert!(
        inside >= 8 * outside.max(1),
        "window {inside} nodes vs corner {outside}"
    );
    assert!(
        result.report.worst_q >= 0.55,
        "worst_q {}",
        result.report.worst_q
    );
}

#[test]
fn mild_refinement_runs_end_to_end() {
    // Gentle 1.5× refinement exercises the full seeded pipeline.
    let domain = Rect::UNIT;
    let window = Rect::new(0.4, 0.6, 0.4, 0.6);
    let guide = GuideMesh::rect_with_refined_window(domain, window, 0.2, 0.12, 0.08).unwrap();

    let settings = MesherSettings::guided(domain);
    let result = MeshDriver::with_guide(settings, guide).unwrap().run().unwrap();

    assert!(result.mesh.all_triangles_positive());
    assert!(result.mesh.validate().is_ok());
    assert!(result.report.mean_q > 0.8, "mean_q {}", result.report.mean_q);
}

#[test]
fn guided_driver_requires_guide() {
    let settings = MesherSettings::guided(Rect::UNIT);
    assert!(MeshDriver::new(settings).is_err());
}

#[test]
fn guide_field_tracks_node_l0() {
    let domain = Rect::UNIT;
    let window = Rect::new(0.4, 0.6, 0.4, 0.6);
    let guide = GuideMesh::rect_with_refined_window(domain, window, 0.2, 0.12, 0.08).unwrap();

    let settings = MesherSettings::guided(domain);
    let result = MeshDriver::with_guide(settings, guide.clone())
        .unwrap()
        .run()
        .unwrap();

    // Every node's stored desired length equals the field at its position.
    for (p, &l0) in result.mesh.points.iter().zip(&result.mesh.l0) {
        assert!((guide.interpolate(*p) - l0).abs() < 1e-12);
    }
}
