use std::f64::consts::PI;

use nalgebra::Point3;
use tracing::{debug, info};

use crate::{
    datatypes::{near, Cell, Dimension, Mesh},
    error::LebeError,
};

pub const DEFAULT_AREA_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_MAX_CORRECTIONS: usize = 50;

/// Produces discretized specimen domains. Implementations may run an external
/// mesher; every call must return a fresh mesh.
pub trait MeshGenerator {
    /// Triangulated rectangle spanning `(0, 0)` to `(width, height)`
    fn rectangle(&self, width: f64, height: f64, nx: usize, ny: usize)
        -> Result<Mesh, LebeError>;

    /// Tetrahedral cylinder with its bottom face centered on the origin at
    /// `z = 0` and its top face at `z = height`
    fn cylinder(&self, radius: f64, height: f64, density: usize) -> Result<Mesh, LebeError>;
}

/// In-process mesher producing structured simplicial meshes.
///
/// The cylinder cross section is a regular polygon, so its area is always
/// below the area of the nominal circle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredMesher;

impl StructuredMesher {
    fn segments(density: usize) -> usize {
        4 * density
    }

    /// Extrusion layers along the height, independent of the radius
    fn layers(density: usize) -> usize {
        density.max(1)
    }
}

fn check_extent(name: &str, value: f64) -> Result<(), LebeError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(LebeError::Mesher(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

impl MeshGenerator for StructuredMesher {
    fn rectangle(
        &self,
        width: f64,
        height: f64,
        nx: usize,
        ny: usize,
    ) -> Result<Mesh, LebeError> {
        check_extent("width", width)?;
        check_extent("height", height)?;
        if nx == 0 || ny == 0 {
            return Err(LebeError::Mesher(format!(
                "rectangle needs at least one cell per direction, got {nx}x{ny}"
            )));
        }

        let mut vertices: Vec<Point3<f64>> = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                vertices.push(Point3::new(
                    width * i as f64 / nx as f64,
                    height * j as f64 / ny as f64,
                    0.0,
                ));
            }
        }

        let index = |i: usize, j: usize| j * (nx + 1) + i;
        let mut cells: Vec<Cell> = Vec::with_capacity(2 * nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let v00 = index(i, j);
                let v10 = index(i + 1, j);
                let v01 = index(i, j + 1);
                let v11 = index(i + 1, j + 1);

                cells.push(Cell::Triangle([v00, v10, v11]));
                cells.push(Cell::Triangle([v00, v11, v01]));
            }
        }

        Mesh::new(Dimension::Two, vertices, cells)
    }

    fn cylinder(&self, radius: f64, height: f64, density: usize) -> Result<Mesh, LebeError> {
        check_extent("radius", radius)?;
        check_extent("height", height)?;
        if density == 0 {
            return Err(LebeError::Mesher("mesh density must be at least 1".to_owned()));
        }

        let segments = Self::segments(density);
        let rings = density;
        let layers = Self::layers(density);

        // Disk: center point followed by `rings` rings of `segments` points
        let disk_len = 1 + rings * segments;
        let ring_point = |k: usize, j: usize| 1 + (k - 1) * segments + (j % segments);

        let mut disk: Vec<(f64, f64)> = Vec::with_capacity(disk_len);
        disk.push((0.0, 0.0));
        for k in 1..=rings {
            let ring_radius = radius * k as f64 / rings as f64;
            for j in 0..segments {
                let angle = 2.0 * PI * j as f64 / segments as f64;
                disk.push((ring_radius * angle.cos(), ring_radius * angle.sin()));
            }
        }

        let mut triangles: Vec<[usize; 3]> = Vec::new();
        for j in 0..segments {
            triangles.push([0, ring_point(1, j), ring_point(1, j + 1)]);
        }
        for k in 1..rings {
            for j in 0..segments {
                let a = ring_point(k, j);
                let b = ring_point(k, j + 1);
                let c = ring_point(k + 1, j);
                let d = ring_point(k + 1, j + 1);
                triangles.push([a, c, d]);
                triangles.push([a, d, b]);
            }
        }

        let mut vertices: Vec<Point3<f64>> = Vec::with_capacity(disk_len * (layers + 1));
        for level in 0..=layers {
            let z = height * level as f64 / layers as f64;
            for (x, y) in &disk {
                vertices.push(Point3::new(*x, *y, z));
            }
        }

        // Each prism is split into three tetrahedra. Ordering the base by
        // vertex index makes the quad diagonals of neighbouring prisms agree.
        let mut cells: Vec<Cell> = Vec::with_capacity(3 * triangles.len() * layers);
        for level in 0..layers {
            let bottom = level * disk_len;
            let top = bottom + disk_len;

            for triangle in &triangles {
                let mut t = *triangle;
                t.sort_unstable();
                let [b0, b1, b2] = t.map(|v| v + bottom);
                let [t0, t1, t2] = t.map(|v| v + top);

                cells.push(Cell::Tetrahedron([b0, b1, b2, t0]));
                cells.push(Cell::Tetrahedron([b1, b2, t0, t1]));
                cells.push(Cell::Tetrahedron([b2, t0, t1, t2]));
            }
        }

        Mesh::new(Dimension::Three, vertices, cells)
    }
}

/// Settings of the radius correction loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusCorrection {
    /// Accepted relative deviation between mesh and analytic bottom area
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RadiusCorrection {
    fn default() -> Self {
        RadiusCorrection {
            tolerance: DEFAULT_AREA_TOLERANCE,
            max_iterations: DEFAULT_MAX_CORRECTIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrectedMesh {
    pub mesh: Mesh,
    /// Radius passed to the generator for the accepted mesh
    pub mesh_radius: f64,
    pub bottom_area: f64,
    pub target_area: f64,
    /// Every `(radius, bottom area)` pair tried, in order
    pub history: Vec<(f64, f64)>,
}

/// Area of the boundary facets lying on `z = 0`
pub fn bottom_area(mesh: &Mesh) -> f64 {
    let axis = mesh.dim.loading_axis();
    mesh.boundary_area(|p| near(p[axis], 0.0))
}

/// Generates cylinder meshes until the bottom face area matches the area of a
/// circle of the nominal `radius`.
///
/// The radius handed to the generator is scaled by `sqrt(target / measured)`
/// after each attempt. Fails with [`LebeError::Convergence`] once
/// `correction.max_iterations` meshes were rejected.
pub fn correct_cylinder_radius(
    generator: &dyn MeshGenerator,
    radius: f64,
    height: f64,
    density: usize,
    correction: &RadiusCorrection,
) -> Result<CorrectedMesh, LebeError> {
    check_extent("radius", radius)?;
    if correction.max_iterations == 0 {
        return Err(LebeError::Config(
            "radius correction needs at least one iteration".to_owned(),
        ));
    }

    let target_area = PI * radius * radius;
    let mut effective_radius = radius;
    let mut history: Vec<(f64, f64)> = Vec::new();
    let mut mesh_area = 0.0;

    for iteration in 1..=correction.max_iterations {
        let mesh = generator.cylinder(effective_radius, height, density)?;
        mesh_area = bottom_area(&mesh);
        history.push((effective_radius, mesh_area));

        debug!(
            "radius correction {iteration}: radius {effective_radius:.9}, bottom area {mesh_area:.9}"
        );

        if !(mesh_area.is_finite() && mesh_area > 0.0) {
            return Err(LebeError::Mesher(format!(
                "mesh bottom area must be positive, measured {mesh_area}"
            )));
        }

        if (target_area - mesh_area).abs() <= target_area * correction.tolerance {
            info!(
                "mesh converged after {iteration} iterations: radius {effective_radius:.6} for nominal {radius}"
            );
            return Ok(CorrectedMesh {
                mesh,
                mesh_radius: effective_radius,
                bottom_area: mesh_area,
                target_area,
                history,
            });
        }

        effective_radius *= f64::sqrt(target_area / mesh_area);
    }

    Err(LebeError::Convergence {
        iterations: correction.max_iterations,
        mesh_area,
        target_area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Generator whose bottom face is a single right triangle of a chosen area
    struct AreaLaw<F: Fn(f64) -> f64>(F);

    impl<F: Fn(f64) -> f64> MeshGenerator for AreaLaw<F> {
        fn rectangle(&self, _: f64, _: f64, _: usize, _: usize) -> Result<Mesh, LebeError> {
            unimplemented!()
        }

        fn cylinder(&self, radius: f64, height: f64, _: usize) -> Result<Mesh, LebeError> {
            let leg = f64::sqrt(2.0 * (self.0)(radius));
            Mesh::new(
                Dimension::Three,
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(leg, 0.0, 0.0),
                    Point3::new(0.0, leg, 0.0),
                    Point3::new(0.0, 0.0, height),
                ],
                vec![Cell::Tetrahedron([0, 1, 2, 3])],
            )
        }
    }

    #[test]
    fn structured_rectangle_counts() {
        let mesh = StructuredMesher.rectangle(150.0, 100.0, 4, 4).unwrap();
        assert_eq!(mesh.vertices.len(), 25);
        assert_eq!(mesh.cells.len(), 32);
        assert_eq!(mesh.boundary_facets.len(), 16);
        assert!((bottom_area(&mesh) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn structured_cylinder_is_closed_polygonal_prism() {
        let radius = 75.0;
        let height = 100.0;
        let mesh = StructuredMesher.cylinder(radius, height, 2).unwrap();

        let segments = 8.0;
        let polygon = 0.5 * segments * radius * radius * f64::sin(2.0 * PI / segments);
        assert!((bottom_area(&mesh) - polygon).abs() < 1e-6);

        let top = mesh.boundary_area(|p| near(p.z, height));
        assert!((top - polygon).abs() < 1e-6);

        // A conforming mesh exposes only bottom, top and side faces
        let side = f64::sqrt(2.0 - 2.0 * f64::cos(2.0 * PI / segments)) * radius;
        let total = mesh.boundary_area(|_| true);
        assert!((total - (2.0 * polygon + segments * side * height)).abs() < 1e-6);
    }

    #[test]
    fn slender_cylinder_cell_count_does_not_depend_on_radius() {
        let stout = StructuredMesher.cylinder(75.0, 100.0, 2).unwrap();
        let slender = StructuredMesher.cylinder(1e-3, 100.0, 2).unwrap();

        // 24 triangles per disk, 2 layers, 3 tetrahedra per prism
        assert_eq!(slender.cells.len(), 144);
        assert_eq!(slender.vertices.len(), 51);
        assert_eq!(slender.cells.len(), stout.cells.len());
    }

    #[test]
    fn structured_mesher_rejects_bad_extents() {
        assert!(StructuredMesher.cylinder(-1.0, 10.0, 2).is_err());
        assert!(StructuredMesher.cylinder(1.0, 10.0, 0).is_err());
        assert!(StructuredMesher.rectangle(1.0, 0.0, 2, 2).is_err());
    }

    #[test]
    fn correction_matches_target_area() {
        let corrected = correct_cylinder_radius(
            &StructuredMesher,
            75.0,
            100.0,
            4,
            &RadiusCorrection::default(),
        )
        .unwrap();

        let target = PI * 75.0 * 75.0;
        assert!((corrected.bottom_area - target).abs() <= target * 1e-6);
        assert!(corrected.mesh_radius > 75.0);
        assert!(corrected.history.len() >= 2);
    }

    #[test]
    fn consistently_low_area_raises_radius_monotonically() {
        let nominal = 10.0;
        // Area grows slower than r^2, so each correction stays below the target
        let law = AreaLaw(|r: f64| 0.9 * PI * nominal * nominal * (r / nominal).powf(1.9));

        let corrected =
            correct_cylinder_radius(&law, nominal, 5.0, 1, &RadiusCorrection::default()).unwrap();

        let radii: Vec<f64> = corrected.history.iter().map(|(r, _)| *r).collect();
        assert!(radii.len() > 2);
        assert!(radii.windows(2).all(|w| w[1] > w[0]));
        assert!(corrected.history.iter().all(|(_, a)| *a <= corrected.target_area));
    }

    #[test]
    fn unresponsive_mesher_hits_iteration_cap() {
        let law = AreaLaw(|_| 1.0);
        let correction = RadiusCorrection {
            tolerance: 1e-6,
            max_iterations: 7,
        };

        match correct_cylinder_radius(&law, 10.0, 5.0, 1, &correction) {
            Err(LebeError::Convergence {
                iterations,
                mesh_area,
                ..
            }) => {
                assert_eq!(iterations, 7);
                assert!((mesh_area - 1.0).abs() < 1e-9);
            }
            other => panic!("expected convergence error, got {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn corrected_area_within_tolerance(radius in 1e-3f64..150.0) {
            let corrected = correct_cylinder_radius(
                &StructuredMesher,
                radius,
                100.0,
                2,
                &RadiusCorrection::default(),
            )
            .unwrap();

            let target = PI * radius * radius;
            prop_assert!((target - corrected.bottom_area).abs() <= target * 1e-6);
        }
    }
}
