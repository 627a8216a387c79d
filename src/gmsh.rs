use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use nalgebra::Point3;
use tracing::{debug, info};

use crate::{
    datatypes::{Cell, Dimension, Mesh},
    error::LebeError,
    mesher::MeshGenerator,
};

const TRIANGLE_ELEMENT: usize = 2;
const TETRAHEDRON_ELEMENT: usize = 4;

enum MeshParseState {
    Nodes,
    Elements,
    Limbo,
}

/// Mesh generator that drives an external Gmsh executable
#[derive(Debug, Clone)]
pub struct GmshMesher {
    pub executable: String,
}

impl Default for GmshMesher {
    fn default() -> Self {
        GmshMesher {
            executable: "gmsh".to_owned(),
        }
    }
}

/// Builds a .geo script for a rectangle spanning the origin to `(width, height)`
fn build_rectangle_geo(width: f64, height: f64, nx: usize, ny: usize) -> String {
    let characteristic_length = f64::min(width / nx as f64, height / ny as f64);

    format!(
        "SetFactory(\"OpenCASCADE\");\n\
        Rectangle(1) = {{ 0, 0, 0, {width}, {height} }};\n\
        \n// Define Mesh Settings\n\
        Mesh.ElementOrder = 1;\n\
        Mesh.CharacteristicLengthMin = {cl};\n\
        Mesh.CharacteristicLengthMax = {cl};\n\
        Mesh.MshFileVersion = 4.1;\n\
        Mesh 2;\n",
        cl = characteristic_length,
    )
}

/// Builds a .geo script for a cylinder standing on the xy-plane
fn build_cylinder_geo(radius: f64, height: f64, density: usize) -> String {
    let characteristic_length = 2.0 * radius / density as f64;

    format!(
        "SetFactory(\"OpenCASCADE\");\n\
        Cylinder(1) = {{ 0, 0, 0, 0, 0, {height}, {radius} }};\n\
        \n// Define Mesh Settings\n\
        Mesh.ElementOrder = 1;\n\
        Mesh.CharacteristicLengthMin = {cl_min};\n\
        Mesh.CharacteristicLengthMax = {cl_max};\n\
        Mesh.MshFileVersion = 4.1;\n\
        Mesh 3;\n",
        cl_min = 0.5 * characteristic_length,
        cl_max = characteristic_length,
    )
}

fn parse_usize_line(line: &str) -> Result<Vec<usize>, LebeError> {
    line.split_whitespace()
        .map(|i| {
            i.parse().map_err(|_| {
                LebeError::Mesher(format!("Unexpected non-int in mesh data {i}"))
            })
        })
        .collect()
}

fn next_line<'a, I>(lines: &mut I) -> Result<&'a str, LebeError>
where
    I: Iterator<Item = &'a str>,
{
    lines
        .next()
        .ok_or_else(|| LebeError::Mesher("Unexpected end of mesh file".to_owned()))
}

/// Parses the contents of an MSH 4.1 file into a Mesh
///
/// # Arguments
/// * `contents` - The text of the mesh file
/// * `dim` - The dimension of the cells to keep
///
/// # Returns
/// A mesh holding every node and the cells of the requested dimension
pub fn parse_mesh(contents: &str, dim: Dimension) -> Result<Mesh, LebeError> {
    let cell_element = match dim {
        Dimension::Two => TRIANGLE_ELEMENT,
        Dimension::Three => TETRAHEDRON_ELEMENT,
    };

    let mut parser_state = MeshParseState::Limbo;
    let mut parsed_section_metadata = false;
    let mut lines = contents.lines().map(|l| l.trim());

    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut node_indexes: HashMap<usize, usize> = HashMap::new();
    let mut raw_cells: Vec<Vec<usize>> = Vec::new();

    while let Some(line) = lines.next() {
        if line.is_empty() {
            continue;
        }

        if line.starts_with("$End") {
            parser_state = MeshParseState::Limbo;
            continue;
        }

        match parser_state {
            MeshParseState::Limbo => {
                parsed_section_metadata = false;

                if line.starts_with("$Nodes") {
                    parser_state = MeshParseState::Nodes;
                } else if line.starts_with("$Elements") {
                    parser_state = MeshParseState::Elements;
                }
            }
            MeshParseState::Nodes => {
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                // entityDim entityTag parametric numNodesInBlock
                let block = parse_usize_line(line)?;
                if block.len() < 4 {
                    return Err(LebeError::Mesher(format!("Malformed node block: {line}")));
                }
                let num_nodes_local = block[3];

                let mut node_tags: Vec<usize> = Vec::with_capacity(num_nodes_local);
                for _ in 0..num_nodes_local {
                    let tag = parse_usize_line(next_line(&mut lines)?)?;
                    node_tags.push(*tag.first().ok_or_else(|| {
                        LebeError::Mesher("Missing node tag in mesh data".to_owned())
                    })?);
                }

                for tag in node_tags {
                    let node_coords: Vec<f64> = next_line(&mut lines)?
                        .split_whitespace()
                        .map(|c| {
                            c.parse().map_err(|_| {
                                LebeError::Mesher(format!("Non-float coordinate in mesh: {c}"))
                            })
                        })
                        .collect::<Result<_, _>>()?;
                    if node_coords.len() < 3 {
                        return Err(LebeError::Mesher(format!(
                            "Node {tag} has {} coordinates",
                            node_coords.len()
                        )));
                    }

                    node_indexes.insert(tag, vertices.len());
                    vertices.push(Point3::new(node_coords[0], node_coords[1], node_coords[2]));
                }
            }
            MeshParseState::Elements => {
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                // entityDim entityTag elementType numElementsInBlock
                let block = parse_usize_line(line)?;
                if block.len() < 4 {
                    return Err(LebeError::Mesher(format!(
                        "Malformed element block: {line}"
                    )));
                }
                let element_type = block[2];
                let num_elements = block[3];

                for _ in 0..num_elements {
                    let element = parse_usize_line(next_line(&mut lines)?)?;
                    if element.is_empty() {
                        return Err(LebeError::Mesher("Empty element line in mesh data".to_owned()));
                    }
                    if element_type == cell_element {
                        raw_cells.push(element[1..].to_vec());
                    }
                }
            }
        }
    }

    let lookup = |tag: &usize| {
        node_indexes
            .get(tag)
            .copied()
            .ok_or_else(|| LebeError::Mesher(format!("Element references unknown node {tag}")))
    };

    let mut cells: Vec<Cell> = Vec::with_capacity(raw_cells.len());
    for raw in raw_cells {
        let nodes = raw.iter().map(lookup).collect::<Result<Vec<usize>, _>>()?;
        let cell = match (dim, nodes.as_slice()) {
            (Dimension::Two, [a, b, c]) => Cell::Triangle([*a, *b, *c]),
            (Dimension::Three, [a, b, c, d]) => Cell::Tetrahedron([*a, *b, *c, *d]),
            _ => {
                return Err(LebeError::Mesher(format!(
                    "Element has {} nodes, expected a {dim}D simplex",
                    nodes.len()
                )))
            }
        };
        cells.push(cell);
    }

    if cells.is_empty() {
        return Err(LebeError::Mesher(format!(
            "Mesh file contains no {dim}D cells"
        )));
    }

    info!(
        "loaded {} nodes and {} cells",
        vertices.len(),
        cells.len()
    );

    Mesh::new(dim, vertices, cells)
}

impl GmshMesher {
    /// Runs Gmsh on a .geo script and parses the produced mesh
    fn compute_mesh(&self, geo: &str, dim: Dimension) -> Result<Mesh, LebeError> {
        let workdir = tempfile::tempdir()?;
        let geo_filepath = workdir.path().join("geom.geo");
        let mesh_filepath = workdir.path().join("geom.msh");

        let mut geo_file = std::fs::File::create(&geo_filepath)?;
        geo_file.write_all(geo.as_bytes())?;

        debug!("running {} on {}", self.executable, geo_filepath.display());
        self.run_gmsh(&geo_filepath, &mesh_filepath, dim)?;

        let contents = match std::fs::read_to_string(&mesh_filepath) {
            Ok(c) => c,
            Err(err) => {
                return Err(LebeError::Mesher(format!(
                    "Unable to open auto-generated mesh file: {err}"
                )))
            }
        };

        parse_mesh(&contents, dim)
    }

    fn run_gmsh(&self, geo: &Path, output: &Path, dim: Dimension) -> Result<(), LebeError> {
        let output = match std::process::Command::new(&self.executable)
            .arg(geo)
            .arg(format!("-{dim}"))
            .arg("-o")
            .arg(output)
            .output()
        {
            Ok(out) => out,
            Err(err) => return Err(LebeError::Mesher(format!("Gmsh failed: {err}"))),
        };

        if !output.status.success() {
            return Err(LebeError::Mesher(format!(
                "Gmsh exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(())
    }
}

impl MeshGenerator for GmshMesher {
    fn rectangle(
        &self,
        width: f64,
        height: f64,
        nx: usize,
        ny: usize,
    ) -> Result<Mesh, LebeError> {
        if nx == 0 || ny == 0 {
            return Err(LebeError::Mesher(format!(
                "rectangle needs at least one cell per direction, got {nx}x{ny}"
            )));
        }
        self.compute_mesh(&build_rectangle_geo(width, height, nx, ny), Dimension::Two)
    }

    fn cylinder(&self, radius: f64, height: f64, density: usize) -> Result<Mesh, LebeError> {
        if density == 0 {
            return Err(LebeError::Mesher("mesh density must be at least 1".to_owned()));
        }
        self.compute_mesh(&build_cylinder_geo(radius, height, density), Dimension::Three)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRIANGLES: &str = "$MeshFormat
4.1 0 8
$EndMeshFormat
$Entities
0 0 1 0
1 0 0 0 1 1 0 0 0
$EndEntities
$Nodes
1 4 1 4
2 1 0 4
1
2
3
4
0 0 0
1 0 0
1 1 0
0 1 0
$EndNodes
$Elements
2 4 1 4
1 1 1 2
1 1 2
2 2 3
2 1 2 2
3 1 2 3
4 1 3 4
$EndElements
";

    #[test]
    fn parses_triangles_and_skips_other_elements() {
        let mesh = parse_mesh(TWO_TRIANGLES, Dimension::Two).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.cells, vec![Cell::Triangle([0, 1, 2]), Cell::Triangle([0, 2, 3])]);
        assert!((mesh.boundary_area(|_| true) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn missing_cells_is_an_error() {
        assert!(matches!(
            parse_mesh(TWO_TRIANGLES, Dimension::Three),
            Err(LebeError::Mesher(_))
        ));
    }

    #[test]
    fn truncated_file_is_an_error() {
        let truncated = &TWO_TRIANGLES[..TWO_TRIANGLES.find("1 1 0\n0 1 0").unwrap()];
        assert!(parse_mesh(truncated, Dimension::Two).is_err());
    }

    #[test]
    fn cylinder_script_names_geometry() {
        let geo = build_cylinder_geo(75.0, 100.0, 4);
        assert!(geo.contains("Cylinder(1) = { 0, 0, 0, 0, 0, 100, 75 };"));
        assert!(geo.contains("Mesh 3;"));
    }
}
