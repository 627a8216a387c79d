use json::JsonValue;
use tracing::info;

use crate::{
    datatypes::{BcSetting, Dimension, SpecimenGeometry},
    error::LebeError,
    gmsh::GmshMesher,
    mesher::{MeshGenerator, RadiusCorrection, StructuredMesher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentKind {
    Cylinder,
    YoungsModulus,
}

impl std::str::FromStr for ExperimentKind {
    type Err = LebeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cylinder" => Ok(ExperimentKind::Cylinder),
            "youngs_modulus" => Ok(ExperimentKind::YoungsModulus),
            other => Err(LebeError::Config(format!("Unknown experiment type {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MesherKind {
    Structured,
    Gmsh,
}

impl std::str::FromStr for MesherKind {
    type Err = LebeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "structured" => Ok(MesherKind::Structured),
            "gmsh" => Ok(MesherKind::Gmsh),
            other => Err(LebeError::Config(format!("Unknown mesher {other}"))),
        }
    }
}

impl MesherKind {
    pub fn generator(&self) -> Box<dyn MeshGenerator> {
        match self {
            MesherKind::Structured => Box::new(StructuredMesher),
            MesherKind::Gmsh => Box::new(GmshMesher::default()),
        }
    }
}

/// Parameters shared by all experiment setups
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentParameters {
    pub dim: Dimension,
    pub bc_setting: BcSetting,
    pub mesh_density: usize,
    pub radius: f64,
    pub height: f64,
    pub correction: RadiusCorrection,
    pub mesher: MesherKind,
    /// Out-of-plane thickness of 2D specimens
    pub thickness: f64,
    /// Search interval of the Young's modulus calibration
    pub youngs_modulus_bounds: (f64, f64),
}

impl ExperimentParameters {
    pub fn defaults(kind: ExperimentKind) -> ExperimentParameters {
        let bc_setting = match kind {
            ExperimentKind::Cylinder => BcSetting::Free,
            ExperimentKind::YoungsModulus => BcSetting::Fixed,
        };

        ExperimentParameters {
            dim: Dimension::Three,
            bc_setting,
            mesh_density: 4,
            radius: 75.0,
            height: 100.0,
            correction: RadiusCorrection::default(),
            mesher: MesherKind::Structured,
            thickness: 1.0,
            youngs_modulus_bounds: (1.0e3, 1.0e5),
        }
    }

    pub fn geometry(&self) -> SpecimenGeometry {
        SpecimenGeometry {
            radius: self.radius,
            height: self.height,
            dim: self.dim,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub kind: ExperimentKind,
    pub parameters: ExperimentParameters,
}

/// Parses the input json into a JsonValue object
///
/// # Arguments
/// * `input_file` - The path to the input file
///
/// # Returns
/// A JsonValue object
pub fn load_input_file(input_file: &str) -> Result<JsonValue, LebeError> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(LebeError::Input(format!(
                "Unable to open input file {input_file}: {err}"
            )))
        }
    };

    match json::parse(&file_string) {
        Ok(f) => Ok(f),
        Err(err) => Err(LebeError::Input(format!("Error in input file json: {err}"))),
    }
}

fn positive_f64(parameters: &JsonValue, key: &str) -> Result<Option<f64>, LebeError> {
    if !parameters.has_key(key) {
        return Ok(None);
    }
    match parameters[key].as_f64() {
        Some(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        _ => Err(LebeError::Config(format!(
            "Bad value for {key}: expected a positive number, got {}",
            parameters[key].dump()
        ))),
    }
}

fn positive_usize(parameters: &JsonValue, key: &str) -> Result<Option<usize>, LebeError> {
    if !parameters.has_key(key) {
        return Ok(None);
    }
    match parameters[key].as_usize() {
        Some(v) if v > 0 => Ok(Some(v)),
        _ => Err(LebeError::Config(format!(
            "Bad value for {key}: expected a positive integer, got {}",
            parameters[key].dump()
        ))),
    }
}

fn string_value<'a>(parameters: &'a JsonValue, key: &str) -> Result<Option<&'a str>, LebeError> {
    if !parameters.has_key(key) {
        return Ok(None);
    }
    match parameters[key].as_str() {
        Some(s) => Ok(Some(s)),
        None => Err(LebeError::Config(format!(
            "Bad value for {key}: expected a string, got {}",
            parameters[key].dump()
        ))),
    }
}

/// Overrides the fields of `parameters` present in a `parameters` json object
pub fn apply_overrides(
    parameters: &mut ExperimentParameters,
    overrides: &JsonValue,
) -> Result<(), LebeError> {
    if !overrides.is_object() {
        return Err(LebeError::Config(
            "parameters section must be a json object".to_owned(),
        ));
    }

    if overrides.has_key("dim") {
        let dim = overrides["dim"].as_u64().ok_or_else(|| {
            LebeError::Config(format!(
                "wrong dimension {} for problem setup",
                overrides["dim"].dump()
            ))
        })?;
        parameters.dim = Dimension::try_from(dim)?;
    }
    if let Some(setting) = string_value(overrides, "bc_setting")? {
        parameters.bc_setting = setting.parse()?;
    }
    if let Some(mesher) = string_value(overrides, "mesher")? {
        parameters.mesher = mesher.parse()?;
    }
    if let Some(density) = positive_usize(overrides, "mesh_density")? {
        parameters.mesh_density = density;
    }
    if let Some(radius) = positive_f64(overrides, "radius")? {
        parameters.radius = radius;
    }
    if let Some(height) = positive_f64(overrides, "height")? {
        parameters.height = height;
    }
    if let Some(thickness) = positive_f64(overrides, "thickness")? {
        parameters.thickness = thickness;
    }
    if let Some(tolerance) = positive_f64(overrides, "area_tolerance")? {
        parameters.correction.tolerance = tolerance;
    }
    if let Some(max_iterations) = positive_usize(overrides, "max_iterations")? {
        parameters.correction.max_iterations = max_iterations;
    }

    if overrides.has_key("youngs_modulus_bounds") {
        let value = &overrides["youngs_modulus_bounds"];
        let bad_bounds = || {
            LebeError::Config(format!(
                "Bad value for youngs_modulus_bounds: expected [lower, upper], got {}",
                value.dump()
            ))
        };

        if !value.is_array() || value.len() != 2 {
            return Err(bad_bounds());
        }
        let lower = value[0].as_f64().ok_or_else(bad_bounds)?;
        let upper = value[1].as_f64().ok_or_else(bad_bounds)?;
        if !(lower > 0.0 && lower < upper && upper.is_finite()) {
            return Err(bad_bounds());
        }
        parameters.youngs_modulus_bounds = (lower, upper);
    }

    Ok(())
}

/// Parses an experiment configuration. Unset parameters keep the defaults of
/// the selected experiment.
pub fn parse_experiment_config(input_json: &JsonValue) -> Result<ExperimentConfig, LebeError> {
    let kind = match string_value(input_json, "experiment")? {
        Some(kind) => kind.parse()?,
        None => ExperimentKind::Cylinder,
    };

    let mut parameters = ExperimentParameters::defaults(kind);
    if input_json.has_key("parameters") {
        apply_overrides(&mut parameters, &input_json["parameters"])?;
    }

    info!(
        "loaded {:?} experiment: {}D, {} boundaries, radius {}, height {}",
        kind, parameters.dim, parameters.bc_setting, parameters.radius, parameters.height
    );

    Ok(ExperimentConfig { kind, parameters })
}
