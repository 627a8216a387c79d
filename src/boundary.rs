//! Displacement boundary conditions for cylinder and prism specimens.
//!
//! Constraints are descriptors only: an external solver (or
//! [`prescribed_dofs`]) resolves them against a mesh and a
//! [`SimulationContext`] at solve time.

use std::collections::BTreeMap;

use nalgebra::Point3;
use tracing::debug;

use crate::{
    datatypes::{near, BcSetting, Dimension, Mesh, SimulationContext},
    error::LebeError,
};

/// Part of the mesh a constraint applies to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// All vertices whose `axis` coordinate equals `level`
    Plane { axis: usize, level: f64 },
    /// A single vertex at exactly this position (pointwise method)
    Point(Point3<f64>),
}

impl Region {
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        match self {
            Region::Plane { axis, level } => near(point[*axis], *level),
            Region::Point(target) => {
                near(point.x, target.x) && near(point.y, target.y) && near(point.z, target.z)
            }
        }
    }
}

/// Displacement components a constraint pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    All,
    Axis(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BcValue {
    Zero,
    /// Resolved from [`SimulationContext::top_displacement`]
    TopDisplacement,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementConstraint {
    pub region: Region,
    pub value: BcValue,
    pub component: Component,
}

impl DisplacementConstraint {
    pub fn new(region: Region, value: BcValue, component: Component) -> DisplacementConstraint {
        DisplacementConstraint {
            region,
            value,
            component,
        }
    }

    pub fn is_pointwise(&self) -> bool {
        matches!(self.region, Region::Point(_))
    }

    pub fn value(&self, ctx: &SimulationContext) -> f64 {
        match self.value {
            BcValue::Zero => 0.0,
            BcValue::TopDisplacement => ctx.top_displacement,
        }
    }

    fn components(&self, dim: Dimension) -> Vec<usize> {
        match self.component {
            Component::All => (0..dim.size()).collect(),
            Component::Axis(axis) => vec![axis],
        }
    }
}

/// Bottom-face vertices used to pin rigid body modes of a free 3D specimen:
/// minimal x, maximal x and minimal y, in that order.
fn rigid_body_points(mesh: &Mesh) -> Result<[Point3<f64>; 3], LebeError> {
    let mut mesh_points: Vec<Point3<f64>> = mesh.coordinates().to_vec();
    mesh_points.sort_by(|a, b| a.z.total_cmp(&b.z));

    let mut bottom_points: Vec<Point3<f64>> = mesh_points
        .into_iter()
        .take_while(|p| near(p.z, 0.0))
        .collect();
    if bottom_points.is_empty() {
        return Err(LebeError::Setup(
            "mesh has no vertices on the bottom face".to_owned(),
        ));
    }

    // x and y extremes are both picked from the z-ordered bottom points
    let mut by_x = bottom_points.clone();
    by_x.sort_by(|a, b| a.x.total_cmp(&b.x));
    let x_min_point = by_x[0];
    let x_max_point = by_x[by_x.len() - 1];

    bottom_points.sort_by(|a, b| a.y.total_cmp(&b.y));
    let y_min_point = bottom_points[0];

    Ok([x_min_point, x_max_point, y_min_point])
}

/// Builds the ordered displacement constraints for a specimen standing on
/// the plane `loading axis = 0` with its top face at `height`
///
/// # Arguments
/// * `mesh` - The specimen mesh, used to pick pinning points
/// * `dim` - Dimension of the displacement field
/// * `setting` - Named boundary setting
/// * `height` - Loading-axis coordinate of the top face
pub fn assemble_constraints(
    mesh: &Mesh,
    dim: Dimension,
    setting: BcSetting,
    height: f64,
) -> Result<Vec<DisplacementConstraint>, LebeError> {
    let axis = dim.loading_axis();
    let top = Region::Plane {
        axis,
        level: height,
    };
    let bottom = Region::Plane { axis, level: 0.0 };

    use BcValue::{TopDisplacement, Zero};
    use Component::{All, Axis};

    let constraints = match (setting, dim) {
        (BcSetting::Fixed, Dimension::Two) => vec![
            DisplacementConstraint::new(top, TopDisplacement, Axis(1)),
            DisplacementConstraint::new(top, Zero, Axis(0)),
            DisplacementConstraint::new(bottom, Zero, All),
        ],
        (BcSetting::Fixed, Dimension::Three) => vec![
            DisplacementConstraint::new(top, TopDisplacement, Axis(2)),
            DisplacementConstraint::new(top, Zero, Axis(0)),
            DisplacementConstraint::new(top, Zero, Axis(1)),
            DisplacementConstraint::new(bottom, Zero, All),
        ],
        (BcSetting::Free, Dimension::Two) => vec![
            DisplacementConstraint::new(top, TopDisplacement, Axis(1)),
            DisplacementConstraint::new(bottom, Zero, Axis(1)),
            DisplacementConstraint::new(Region::Point(Point3::origin()), Zero, Axis(0)),
        ],
        (BcSetting::Free, Dimension::Three) => {
            let [x_min_point, x_max_point, y_min_point] = rigid_body_points(mesh)?;
            vec![
                DisplacementConstraint::new(top, TopDisplacement, Axis(2)),
                DisplacementConstraint::new(bottom, Zero, Axis(2)),
                DisplacementConstraint::new(Region::Point(x_min_point), Zero, Axis(1)),
                DisplacementConstraint::new(Region::Point(x_max_point), Zero, Axis(1)),
                DisplacementConstraint::new(Region::Point(y_min_point), Zero, Axis(0)),
            ]
        }
    };

    debug!(
        "assembled {} displacement constraints for {setting} {dim}D setup",
        constraints.len()
    );

    Ok(constraints)
}

/// Resolves constraints to prescribed degrees of freedom,
/// `dof = vertex * dim + component`. Constraints are applied in order, so a
/// later constraint overrides an earlier one on the same dof.
pub fn prescribed_dofs(
    mesh: &Mesh,
    constraints: &[DisplacementConstraint],
    ctx: &SimulationContext,
) -> BTreeMap<usize, f64> {
    let dim = mesh.dim;
    let mut dofs: BTreeMap<usize, f64> = BTreeMap::new();

    for constraint in constraints {
        let value = constraint.value(ctx);
        let components = constraint.components(dim);

        for (idx, vertex) in mesh.vertices.iter().enumerate() {
            if !constraint.region.contains(vertex) {
                continue;
            }
            for component in &components {
                dofs.insert(idx * dim.size() + component, value);
            }
        }
    }

    dofs
}
