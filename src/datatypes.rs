use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use nalgebra::Point3;

use crate::error::LebeError;

/// Absolute tolerance used when matching coordinates against planes and points
pub const NEAR_TOLERANCE: f64 = 1e-8;

/// Checks whether two coordinates coincide up to [`NEAR_TOLERANCE`]
pub fn near(a: f64, b: f64) -> bool {
    (a - b).abs() < NEAR_TOLERANCE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Two,
    Three,
}

impl Dimension {
    /// Number of displacement components per vertex
    pub fn size(&self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }

    /// Index of the coordinate the specimen is loaded along (y in 2D, z in 3D)
    pub fn loading_axis(&self) -> usize {
        self.size() - 1
    }
}

impl TryFrom<u64> for Dimension {
    type Error = LebeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimension::Two),
            3 => Ok(Dimension::Three),
            other => Err(LebeError::Config(format!(
                "wrong dimension {other} for problem setup"
            ))),
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.size())
    }
}

/// Named boundary-condition setting of a specimen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcSetting {
    Fixed,
    Free,
}

impl FromStr for BcSetting {
    type Err = LebeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fixed" => Ok(BcSetting::Fixed),
            "free" => Ok(BcSetting::Free),
            other => Err(LebeError::Config(format!(
                "Wrong boundary setting: {other}, for cylinder setup"
            ))),
        }
    }
}

impl Display for BcSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BcSetting::Fixed => write!(f, "fixed"),
            BcSetting::Free => write!(f, "free"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecimenGeometry {
    pub radius: f64,
    pub height: f64,
    pub dim: Dimension,
}

impl SpecimenGeometry {
    /// Analytic cross-sectional area of the round specimen
    pub fn target_area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Triangle([usize; 3]),
    Tetrahedron([usize; 4]),
}

impl Cell {
    pub fn vertices(&self) -> &[usize] {
        match self {
            Cell::Triangle(v) => v,
            Cell::Tetrahedron(v) => v,
        }
    }

    fn facets(&self) -> Vec<Facet> {
        match *self {
            Cell::Triangle([a, b, c]) => vec![
                Facet::Segment([a, b]),
                Facet::Segment([b, c]),
                Facet::Segment([c, a]),
            ],
            Cell::Tetrahedron([a, b, c, d]) => vec![
                Facet::Triangle([a, b, c]),
                Facet::Triangle([a, b, d]),
                Facet::Triangle([a, c, d]),
                Facet::Triangle([b, c, d]),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Segment([usize; 2]),
    Triangle([usize; 3]),
}

impl Facet {
    pub fn vertices(&self) -> &[usize] {
        match self {
            Facet::Segment(v) => v,
            Facet::Triangle(v) => v,
        }
    }

    /// Length of a segment or area of a triangle
    pub fn measure(&self, coordinates: &[Point3<f64>]) -> f64 {
        match *self {
            Facet::Segment([a, b]) => (coordinates[b] - coordinates[a]).norm(),
            Facet::Triangle([a, b, c]) => {
                let ab = coordinates[b] - coordinates[a];
                let ac = coordinates[c] - coordinates[a];
                0.5 * ab.cross(&ac).norm()
            }
        }
    }

    fn key(&self) -> Vec<usize> {
        let mut key = self.vertices().to_vec();
        key.sort_unstable();
        key
    }
}

/// A simplicial mesh. 2D meshes keep `z = 0` on every vertex.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub dim: Dimension,
    pub vertices: Vec<Point3<f64>>,
    pub cells: Vec<Cell>,
    pub boundary_facets: Vec<Facet>,
}

impl Mesh {
    /// Builds a mesh and derives its boundary facets, i.e. the facets that
    /// belong to exactly one cell.
    pub fn new(
        dim: Dimension,
        vertices: Vec<Point3<f64>>,
        cells: Vec<Cell>,
    ) -> Result<Mesh, LebeError> {
        let mut facet_count: BTreeMap<Vec<usize>, (usize, Facet)> = BTreeMap::new();

        for cell in &cells {
            let expected = match dim {
                Dimension::Two => matches!(cell, Cell::Triangle(_)),
                Dimension::Three => matches!(cell, Cell::Tetrahedron(_)),
            };
            if !expected {
                return Err(LebeError::Mesher(format!(
                    "cell {cell:?} does not match mesh dimension {dim}"
                )));
            }
            if let Some(idx) = cell.vertices().iter().find(|i| **i >= vertices.len()) {
                return Err(LebeError::Mesher(format!(
                    "cell references vertex {idx} but the mesh has {} vertices",
                    vertices.len()
                )));
            }

            for facet in cell.facets() {
                facet_count
                    .entry(facet.key())
                    .and_modify(|(count, _)| *count += 1)
                    .or_insert((1, facet));
            }
        }

        let boundary_facets = facet_count
            .into_values()
            .filter(|(count, _)| *count == 1)
            .map(|(_, facet)| facet)
            .collect();

        Ok(Mesh {
            dim,
            vertices,
            cells,
            boundary_facets,
        })
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Sums the measure of all boundary facets whose vertices satisfy `marker`
    pub fn boundary_area<F>(&self, marker: F) -> f64
    where
        F: Fn(&Point3<f64>) -> bool,
    {
        self.boundary_facets
            .iter()
            .filter(|facet| facet.vertices().iter().all(|v| marker(&self.vertices[*v])))
            .map(|facet| facet.measure(&self.vertices))
            .sum()
    }
}

/// Per-solve state. Constraints driven by the applied top displacement read
/// it from here at solve time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationContext {
    pub top_displacement: f64,
}

impl SimulationContext {
    pub fn new(top_displacement: f64) -> SimulationContext {
        SimulationContext { top_displacement }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub youngs_modulus: f64,
    /// Out-of-plane thickness used by 2D meshes
    pub thickness: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tetrahedron() -> Mesh {
        Mesh::new(
            Dimension::Three,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![Cell::Tetrahedron([0, 1, 2, 3])],
        )
        .unwrap()
    }

    #[test]
    fn single_tetrahedron_has_four_boundary_faces() {
        let mesh = unit_tetrahedron();
        assert_eq!(mesh.boundary_facets.len(), 4);
        let bottom = mesh.boundary_area(|p| near(p.z, 0.0));
        assert!((bottom - 0.5).abs() < 1e-12);
    }

    #[test]
    fn shared_edges_are_not_boundary() {
        let mesh = Mesh::new(
            Dimension::Two,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Cell::Triangle([0, 1, 2]), Cell::Triangle([0, 2, 3])],
        )
        .unwrap();

        assert_eq!(mesh.boundary_facets.len(), 4);
        let perimeter = mesh.boundary_area(|_| true);
        assert!((perimeter - 4.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_range_cells() {
        let result = Mesh::new(
            Dimension::Two,
            vec![Point3::new(0.0, 0.0, 0.0)],
            vec![Cell::Triangle([0, 1, 2])],
        );
        assert!(matches!(result, Err(LebeError::Mesher(_))));
    }

    #[test]
    fn dimension_and_setting_parsing() {
        assert_eq!(Dimension::try_from(3).unwrap(), Dimension::Three);
        assert!(matches!(Dimension::try_from(1), Err(LebeError::Config(_))));
        assert_eq!("free".parse::<BcSetting>().unwrap(), BcSetting::Free);
        assert!(matches!(
            "clamped".parse::<BcSetting>(),
            Err(LebeError::Config(_))
        ));
    }
}
