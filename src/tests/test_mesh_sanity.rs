//! Universal invariants every returned mesh must satisfy.

use crate::core::Rect;
use crate::driver::MeshDriver;
use crate::mesh::{NodeClass, TriMesh};
use crate::settings::MesherSettings;

fn assert_mesh_invariants(mesh: &TriMesh, domain: Rect) {
    assert!(mesh.validate().is_ok());

    // Every triangle has strictly positive signed area.
    assert!(mesh.all_triangles_positive());

    // Bars derived from T are unique and canonicalized.
    for w in mesh.bars.windows(2) {
        assert!(w[0] < w[1], "bars not strictly sorted: {:?} {:?}", w[0], w[1]);
    }
    for &[a, b] in &mesh.bars {
        assert!(a < b);
    }

    // Boundary nodes sit exactly on their extent; corners exactly on the
    // domain corners.
    let mut corner_positions = Vec::new();
    for (p, class) in mesh.points.iter().zip(&mesh.classes) {
        match class {
            NodeClass::Bottom => assert_eq!(p.y, domain.y_min),
            NodeClass::Top => assert_eq!(p.y, domain.y_max),
            NodeClass::Left => assert_eq!(p.x, domain.x_min),
            NodeClass::Right => assert_eq!(p.x, domain.x_max),
            NodeClass::Corner => corner_positions.push(*p),
            NodeClass::Interior => assert!(domain.contains(*p)),
        }
    }
    assert_eq!(corner_positions.len(), 4);
    for expected in domain.corners() {
        assert!(
            corner_positions.iter().any(|p| *p == expected),
            "missing corner {expected:?}"
        );
    }
}

#[test]
fn unit_square_result_satisfies_invariants() {
    let settings = MesherSettings::regular(Rect::UNIT, 0.1);
    let result = MeshDriver::new(settings).unwrap().run().unwrap();

    assert_mesh_invariants(&result.mesh, Rect::UNIT);
    assert!(result.report.iterations >= 1);
}

#[test]
fn shifted_rectangle_result_satisfies_invariants() {
    let domain = Rect::new(-2.0, 1.0, 3.0, 5.0);
    let settings = MesherSettings::regular(domain, 0.4);
    let result = MeshDriver::new(settings).unwrap().run().unwrap();

    assert_mesh_invariants(&result.mesh, domain);
}

#[test]
fn converged_flag_implies_quality_targets() {
    let settings = MesherSettings::regular(Rect::UNIT, 0.2);
    let result = MeshDriver::new(settings).unwrap().run().unwrap();

    if result.report.converged {
        assert!(result.report.worst_q >= settings.q_tol);
        assert!(result.report.mean_q >= settings.mean_q_tol);
    }
}

#[test]
fn cancelled_driver_returns_valid_partial_mesh() {
    let settings = MesherSettings::regular(Rect::UNIT, 0.1);
    let driver = MeshDriver::new(settings).unwrap();
    driver
        .cancel_flag()
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let result = driver.run().unwrap();
    assert!(!result.report.converged);
    assert_eq!(result.report.iterations, 0);
    assert_mesh_invariants(&result.mesh, Rect::UNIT);
}
