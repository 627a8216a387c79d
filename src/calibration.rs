use argmin::{
    core::{
        observers::{Observe, ObserverMode},
        CostFunction, Error, Executor, State, KV,
    },
    solver::goldensectionsearch::GoldenSectionSearch,
};
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::{
    boundary::DisplacementConstraint,
    datatypes::{Material, Mesh},
    error::LebeError,
    experiment::Experiment,
    processed_data::ProcessedData,
    solver::Solver,
};

pub const MAX_CALIBRATION_ITER: u64 = 500;
pub const CALIBRATION_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSettings {
    /// Search interval for the Young's modulus
    pub bounds: (f64, f64),
    pub tolerance: f64,
    pub max_iters: u64,
    pub show_progress: bool,
}

impl CalibrationSettings {
    pub fn new(bounds: (f64, f64)) -> CalibrationSettings {
        CalibrationSettings {
            bounds,
            tolerance: CALIBRATION_TOLERANCE,
            max_iters: MAX_CALIBRATION_ITER,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    pub youngs_modulus: f64,
    /// Sum of squared force residuals at the estimate
    pub cost: f64,
    pub iterations: u64,
}

/// Least squares misfit between simulated and measured forces
struct CalibrationProblem<'a> {
    experiment: &'a dyn Experiment,
    solver: &'a dyn Solver,
    mesh: &'a Mesh,
    constraints: Vec<DisplacementConstraint>,
    data: &'a ProcessedData,
    thickness: f64,
}

impl<'a> CostFunction for CalibrationProblem<'a> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, youngs_modulus: &Self::Param) -> Result<Self::Output, Error> {
        let material = Material {
            youngs_modulus: *youngs_modulus,
            thickness: self.thickness,
        };

        let mut ctx = self.experiment.initial_context();
        let mut cost = 0.0;

        for (displacement, force) in self.data.samples() {
            self.experiment.apply_top_displacement(&mut ctx, displacement);
            let simulated = self
                .solver
                .reaction_force(self.mesh, &self.constraints, &ctx, &material)?;
            cost += f64::powi(simulated - force, 2);
        }

        Ok(cost)
    }
}

/// Observer for the argmin solver
struct CalibrationObserver {
    bar: ProgressBar,
}

impl CalibrationObserver {
    fn new(max_iters: u64, show_progress: bool) -> CalibrationObserver {
        let bar = if show_progress {
            ProgressBar::new(max_iters)
        } else {
            ProgressBar::hidden()
        };
        CalibrationObserver { bar }
    }
}

impl<I> Observe<I> for CalibrationObserver
where
    I: State<Float = f64>,
{
    fn observe_init(&mut self, name: &str, _state: &I, _kv: &KV) -> Result<(), Error> {
        debug!("starting {name}");
        Ok(())
    }

    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        debug!(
            "calibration iteration {}: cost {:.6e}, best {:.6e}",
            state.get_iter(),
            state.get_cost(),
            state.get_best_cost()
        );
        self.bar.set_position(state.get_iter());
        Ok(())
    }

    fn observe_final(&mut self, _state: &I) -> Result<(), Error> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

/// Estimates the Young's modulus that best reproduces the measured forces.
///
/// The displacement constraints are built once; every sample only updates the
/// applied top displacement of the simulation context.
///
/// # Arguments
/// * `experiment` - A set-up experiment
/// * `solver` - The forward model
/// * `data` - Measured displacement/force samples
/// * `settings` - Search interval and stopping criteria
pub fn estimate_youngs_modulus(
    experiment: &dyn Experiment,
    solver: &dyn Solver,
    data: &ProcessedData,
    settings: &CalibrationSettings,
) -> Result<CalibrationOutcome, LebeError> {
    if data.is_empty() {
        return Err(LebeError::Calibration(
            "processed data contains no samples".to_owned(),
        ));
    }

    let mesh = experiment.mesh().ok_or_else(|| {
        LebeError::Calibration("experiment must be set up before calibration".to_owned())
    })?;

    let (lower, upper) = settings.bounds;
    let problem = CalibrationProblem {
        experiment,
        solver,
        mesh,
        constraints: experiment.create_displacement_constraints()?,
        data,
        thickness: experiment.parameters().thickness,
    };

    let search = GoldenSectionSearch::new(lower, upper)
        .and_then(|s| s.with_tolerance(settings.tolerance))
        .map_err(|err| LebeError::Calibration(format!("Invalid search settings: {err}")))?;

    info!(
        "calibrating youngs modulus on [{lower}, {upper}] with {} samples",
        data.len()
    );

    let observer = CalibrationObserver::new(settings.max_iters, settings.show_progress);
    let res = match Executor::new(problem, search)
        .configure(|state| {
            state
                .param(0.5 * (lower + upper))
                .max_iters(settings.max_iters)
        })
        .add_observer(observer, ObserverMode::Always)
        .run()
    {
        Ok(r) => r,
        Err(err) => {
            return Err(LebeError::Calibration(format!(
                "Golden section search error: {err}"
            )))
        }
    };

    let state = res.state();
    let youngs_modulus = match state.best_param {
        Some(e) => e,
        None => {
            return Err(LebeError::Calibration(
                "Golden section search could not produce best parameter".to_owned(),
            ))
        }
    };

    info!(
        "estimated youngs modulus {youngs_modulus:.3} after {} iterations",
        state.get_iter()
    );

    Ok(CalibrationOutcome {
        youngs_modulus,
        cost: state.best_cost,
        iterations: state.get_iter(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ExperimentKind, ExperimentParameters},
        datatypes::SimulationContext,
        experiment::CylinderExperiment,
        mesher::StructuredMesher,
        solver::UniaxialSolver,
    };

    fn set_up_cylinder() -> CylinderExperiment {
        let mut p = ExperimentParameters::defaults(ExperimentKind::Cylinder);
        p.mesh_density = 2;
        let mut experiment = CylinderExperiment::new(p);
        experiment.setup(&StructuredMesher).unwrap();
        experiment
    }

    fn synthetic_data(experiment: &CylinderExperiment, youngs_modulus: f64) -> ProcessedData {
        let constraints = experiment.create_displacement_constraints().unwrap();
        let material = Material {
            youngs_modulus,
            thickness: 1.0,
        };
        let mut data = ProcessedData::default();
        let mut ctx = SimulationContext::new(0.0);

        for step in 0..10 {
            let displacement = -0.01 * step as f64;
            experiment.apply_top_displacement(&mut ctx, displacement);
            let force = UniaxialSolver
                .reaction_force(experiment.mesh().unwrap(), &constraints, &ctx, &material)
                .unwrap();
            data.displacement.push(displacement);
            data.force.push(force);
        }

        data
    }

    #[test]
    fn recovers_modulus_from_synthetic_data() {
        let experiment = set_up_cylinder();
        let data = synthetic_data(&experiment, 31_500.0);

        let outcome = estimate_youngs_modulus(
            &experiment,
            &UniaxialSolver,
            &data,
            &CalibrationSettings::new((1.0e3, 1.0e5)),
        )
        .unwrap();

        assert!((outcome.youngs_modulus - 31_500.0).abs() / 31_500.0 < 1e-4);
        assert!(outcome.iterations > 0);
    }

    #[test]
    fn empty_data_is_rejected() {
        let experiment = set_up_cylinder();
        assert!(matches!(
            estimate_youngs_modulus(
                &experiment,
                &UniaxialSolver,
                &ProcessedData::default(),
                &CalibrationSettings::new((1.0e3, 1.0e5)),
            ),
            Err(LebeError::Calibration(_))
        ));
    }

    #[test]
    fn experiment_without_mesh_is_rejected() {
        let experiment =
            CylinderExperiment::new(ExperimentParameters::defaults(ExperimentKind::Cylinder));
        let data = ProcessedData {
            displacement: vec![0.1],
            force: vec![1.0],
        };
        assert!(matches!(
            estimate_youngs_modulus(
                &experiment,
                &UniaxialSolver,
                &data,
                &CalibrationSettings::new((1.0e3, 1.0e5)),
            ),
            Err(LebeError::Calibration(_))
        ));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let experiment = set_up_cylinder();
        let data = synthetic_data(&experiment, 30_000.0);
        assert!(matches!(
            estimate_youngs_modulus(
                &experiment,
                &UniaxialSolver,
                &data,
                &CalibrationSettings::new((1.0e5, 1.0e3)),
            ),
            Err(LebeError::Calibration(_))
        ));
    }
}
