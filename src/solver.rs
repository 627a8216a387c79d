use tracing::debug;

use crate::{
    boundary::{BcValue, DisplacementConstraint, Region},
    datatypes::{near, Dimension, Material, Mesh, SimulationContext},
    error::LebeError,
};

/// Forward model evaluated during calibration. A finite element backend plugs
/// in here; the constraints are resolved against `ctx` on every call.
pub trait Solver {
    /// Reaction force on the face driven by the applied top displacement
    fn reaction_force(
        &self,
        mesh: &Mesh,
        constraints: &[DisplacementConstraint],
        ctx: &SimulationContext,
        material: &Material,
    ) -> Result<f64, LebeError>;
}

/// Linear elastic bar under uniaxial compression: `F = E * A * u / L`.
///
/// `A` is the measured area of the loaded mesh face (times the thickness for
/// 2D meshes) and `L` the level of the loaded plane above the support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniaxialSolver;

/// Finds the plane whose displacement follows the applied top displacement
fn loaded_plane(constraints: &[DisplacementConstraint]) -> Result<(usize, f64), LebeError> {
    constraints
        .iter()
        .find_map(|c| match (c.value, c.region) {
            (BcValue::TopDisplacement, Region::Plane { axis, level }) => Some((axis, level)),
            _ => None,
        })
        .ok_or_else(|| {
            LebeError::Solver("no constraint is driven by the top displacement".to_owned())
        })
}

impl Solver for UniaxialSolver {
    fn reaction_force(
        &self,
        mesh: &Mesh,
        constraints: &[DisplacementConstraint],
        ctx: &SimulationContext,
        material: &Material,
    ) -> Result<f64, LebeError> {
        let (axis, level) = loaded_plane(constraints)?;
        if level <= 0.0 {
            return Err(LebeError::Solver(format!(
                "loaded face must lie above the support, found level {level}"
            )));
        }

        let face = mesh.boundary_area(|p| near(p[axis], level));
        let area = match mesh.dim {
            Dimension::Two => face * material.thickness,
            Dimension::Three => face,
        };
        if area <= 0.0 {
            return Err(LebeError::Solver(format!(
                "mesh has no boundary face at level {level}"
            )));
        }

        let strain = ctx.top_displacement / level;
        let force = material.youngs_modulus * area * strain;
        debug!("uniaxial response: strain {strain:.3e}, force {force:.6}");

        Ok(force)
    }
}
