//! Specimen setups shared by simulation and calibration.

use tracing::info;

use crate::{
    boundary::{assemble_constraints, DisplacementConstraint},
    config::{ExperimentKind, ExperimentParameters},
    datatypes::{BcSetting, Dimension, Mesh, SimulationContext},
    error::LebeError,
    mesher::{correct_cylinder_radius, MeshGenerator},
};

/// A specimen setup: builds its mesh and the displacement constraints a
/// solver needs to load it.
pub trait Experiment {
    fn parameters(&self) -> &ExperimentParameters;

    /// Generates the specimen mesh
    fn setup(&mut self, generator: &dyn MeshGenerator) -> Result<(), LebeError>;

    /// The mesh built by the last `setup` call
    fn mesh(&self) -> Option<&Mesh>;

    fn create_displacement_constraints(&self) -> Result<Vec<DisplacementConstraint>, LebeError>;

    /// Context with the setup's initial applied top displacement
    fn initial_context(&self) -> SimulationContext;

    /// Sets the displacement applied to the top face for subsequent solves
    fn apply_top_displacement(&self, ctx: &mut SimulationContext, top_displacement: f64) {
        ctx.top_displacement = top_displacement;
    }

    /// Radius actually passed to the mesher, if it differs from the nominal one
    fn mesh_radius(&self) -> Option<f64> {
        None
    }
}

pub fn build_experiment(
    kind: ExperimentKind,
    parameters: ExperimentParameters,
) -> Box<dyn Experiment> {
    match kind {
        ExperimentKind::Cylinder => Box::new(CylinderExperiment::new(parameters)),
        ExperimentKind::YoungsModulus => Box::new(YoungsModulusExperiment::new(parameters)),
    }
}

fn require_mesh(mesh: Option<&Mesh>) -> Result<&Mesh, LebeError> {
    mesh.ok_or_else(|| {
        LebeError::Setup("setup must run before creating displacement constraints".to_owned())
    })
}

/// Concrete cylinder whose 3D mesh is corrected to the nominal cross section
#[derive(Debug, Clone)]
pub struct CylinderExperiment {
    p: ExperimentParameters,
    mesh: Option<Mesh>,
    mesh_radius: Option<f64>,
}

impl CylinderExperiment {
    pub fn new(parameters: ExperimentParameters) -> CylinderExperiment {
        CylinderExperiment {
            p: parameters,
            mesh: None,
            mesh_radius: None,
        }
    }
}

impl Experiment for CylinderExperiment {
    fn parameters(&self) -> &ExperimentParameters {
        &self.p
    }

    fn setup(&mut self, generator: &dyn MeshGenerator) -> Result<(), LebeError> {
        match self.p.dim {
            Dimension::Two => {
                self.mesh = Some(generator.rectangle(
                    2.0 * self.p.radius,
                    self.p.height,
                    self.p.mesh_density,
                    self.p.mesh_density,
                )?);
                self.mesh_radius = None;
            }
            Dimension::Three => {
                let corrected = correct_cylinder_radius(
                    generator,
                    self.p.radius,
                    self.p.height,
                    self.p.mesh_density,
                    &self.p.correction,
                )?;
                self.mesh_radius = Some(corrected.mesh_radius);
                self.mesh = Some(corrected.mesh);
            }
        }

        info!("cylinder setup complete ({}D)", self.p.dim);
        Ok(())
    }

    fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    fn create_displacement_constraints(&self) -> Result<Vec<DisplacementConstraint>, LebeError> {
        let mesh = require_mesh(self.mesh())?;
        assemble_constraints(mesh, self.p.dim, self.p.bc_setting, self.p.height)
    }

    fn initial_context(&self) -> SimulationContext {
        SimulationContext::new(0.0)
    }

    fn mesh_radius(&self) -> Option<f64> {
        self.mesh_radius
    }
}

/// Plain Young's modulus test: nominal geometry, clamped top and bottom
#[derive(Debug, Clone)]
pub struct YoungsModulusExperiment {
    p: ExperimentParameters,
    mesh: Option<Mesh>,
}

impl YoungsModulusExperiment {
    pub const INITIAL_TOP_DISPLACEMENT: f64 = 50.0;

    pub fn new(parameters: ExperimentParameters) -> YoungsModulusExperiment {
        YoungsModulusExperiment {
            p: parameters,
            mesh: None,
        }
    }
}

impl Experiment for YoungsModulusExperiment {
    fn parameters(&self) -> &ExperimentParameters {
        &self.p
    }

    fn setup(&mut self, generator: &dyn MeshGenerator) -> Result<(), LebeError> {
        let mesh = match self.p.dim {
            Dimension::Two => {
                // density counts cells per unit length here
                let density = self.p.mesh_density as f64;
                let md_width = ((self.p.radius * 2.0 * density) as usize).max(1);
                let md_height = ((self.p.height * density) as usize).max(1);
                generator.rectangle(2.0 * self.p.radius, self.p.height, md_width, md_height)?
            }
            Dimension::Three => {
                generator.cylinder(self.p.radius, self.p.height, self.p.mesh_density)?
            }
        };

        self.mesh = Some(mesh);
        info!("youngs modulus setup complete ({}D)", self.p.dim);
        Ok(())
    }

    fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    fn create_displacement_constraints(&self) -> Result<Vec<DisplacementConstraint>, LebeError> {
        let mesh = require_mesh(self.mesh())?;
        assemble_constraints(mesh, self.p.dim, BcSetting::Fixed, self.p.height)
    }

    fn initial_context(&self) -> SimulationContext {
        SimulationContext::new(Self::INITIAL_TOP_DISPLACEMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::{bottom_area, StructuredMesher};

    fn parameters(kind: ExperimentKind) -> ExperimentParameters {
        let mut p = ExperimentParameters::defaults(kind);
        p.mesh_density = 2;
        p
    }

    #[test]
    fn cylinder_constraints_require_setup() {
        let experiment = CylinderExperiment::new(parameters(ExperimentKind::Cylinder));
        assert!(matches!(
            experiment.create_displacement_constraints(),
            Err(LebeError::Setup(_))
        ));
    }

    #[test]
    fn cylinder_setup_corrects_bottom_area() {
        let mut experiment = CylinderExperiment::new(parameters(ExperimentKind::Cylinder));
        experiment.setup(&StructuredMesher).unwrap();

        let target = experiment.parameters().geometry().target_area();
        let area = bottom_area(experiment.mesh().unwrap());
        assert!((area - target).abs() <= target * 1e-6);
        assert!(experiment.mesh_radius().unwrap() > 75.0);
        assert_eq!(experiment.create_displacement_constraints().unwrap().len(), 5);
    }

    #[test]
    fn cylinder_2d_uses_rectangle() {
        let mut p = parameters(ExperimentKind::Cylinder);
        p.dim = Dimension::Two;
        p.bc_setting = BcSetting::Fixed;
        let mut experiment = CylinderExperiment::new(p);
        experiment.setup(&StructuredMesher).unwrap();

        let mesh = experiment.mesh().unwrap();
        assert_eq!(mesh.dim, Dimension::Two);
        assert_eq!(mesh.cells.len(), 8);
        assert!(experiment.mesh_radius().is_none());
        assert_eq!(experiment.create_displacement_constraints().unwrap().len(), 3);
    }

    #[test]
    fn youngs_modulus_experiment_is_always_fixed() {
        let mut p = parameters(ExperimentKind::YoungsModulus);
        p.bc_setting = BcSetting::Free;
        let mut experiment = YoungsModulusExperiment::new(p);
        experiment.setup(&StructuredMesher).unwrap();

        assert_eq!(experiment.create_displacement_constraints().unwrap().len(), 4);
        assert_eq!(experiment.initial_context().top_displacement, 50.0);
    }

    #[test]
    fn applying_top_displacement_updates_context_only() {
        let experiment = build_experiment(
            ExperimentKind::Cylinder,
            parameters(ExperimentKind::Cylinder),
        );
        let mut ctx = experiment.initial_context();
        assert_eq!(ctx.top_displacement, 0.0);

        experiment.apply_top_displacement(&mut ctx, -0.1);
        assert_eq!(ctx.top_displacement, -0.1);
    }
}
