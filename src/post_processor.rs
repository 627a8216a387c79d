use std::io::Write;

use json::JsonValue;
use tracing::info;

use crate::{
    calibration::CalibrationOutcome, datatypes::Mesh, error::LebeError,
    knowledge_graph::CalibrationInput,
};

/// Summary of one calibration run
#[derive(Debug, Clone)]
pub struct CalibrationReport<'a> {
    pub experiment_name: &'a str,
    pub input: &'a CalibrationInput,
    pub nominal_radius: f64,
    pub mesh_radius: Option<f64>,
    pub bottom_area: f64,
    pub outcome: &'a CalibrationOutcome,
}

fn create_file(path: &str) -> Result<std::fs::File, LebeError> {
    std::fs::File::create(path)
        .map_err(|err| LebeError::PostProcessor(format!("Failed to create {path}: {err}")))
}

/// Writes a mesh to two CSV files
///
/// # Arguments
/// * `mesh` - The mesh to export
/// * `nodes_output` - The filename of the output nodes csv
/// * `elements_output` - The filename of the output elements csv
pub fn csv_output(mesh: &Mesh, nodes_output: &str, elements_output: &str) -> Result<(), LebeError> {
    let mut nodes_file = create_file(nodes_output)?;
    let mut elements_file = create_file(elements_output)?;

    // Write nodes
    writeln!(nodes_file, "x,y,z")?;
    for vertex in &mesh.vertices {
        writeln!(nodes_file, "{},{},{}", vertex.x, vertex.y, vertex.z)?;
    }

    // Write cells
    let header: Vec<String> = (0..mesh.dim.size() + 1).map(|i| format!("n{i}")).collect();
    writeln!(elements_file, "{}", header.join(","))?;
    for cell in &mesh.cells {
        let nodes: Vec<String> = cell.vertices().iter().map(|n| n.to_string()).collect();
        writeln!(elements_file, "{}", nodes.join(","))?;
    }

    info!("wrote output to {nodes_output} and {elements_output}");

    Ok(())
}

pub fn calibration_input_json(input: &CalibrationInput) -> JsonValue {
    let parameters: Vec<JsonValue> = input
        .specimen_parameters
        .iter()
        .map(|(parameter, value)| {
            json::object! {
                "name": parameter.class_name(),
                "value": *value,
            }
        })
        .collect();

    json::object! {
        "processed_data_path": input.processed_data_path.as_str(),
        "specimen_parameters": JsonValue::Array(parameters),
    }
}

pub fn report_json(report: &CalibrationReport) -> JsonValue {
    json::object! {
        "experiment": report.experiment_name,
        "calibration_input": calibration_input_json(report.input),
        "nominal_radius": report.nominal_radius,
        "mesh_radius": report.mesh_radius,
        "bottom_area": report.bottom_area,
        "youngs_modulus": report.outcome.youngs_modulus,
        "cost": report.outcome.cost,
        "iterations": report.outcome.iterations,
    }
}

pub fn write_report(report: &CalibrationReport, output: &str) -> Result<(), LebeError> {
    let mut file = create_file(output)?;
    file.write_all(report_json(report).pretty(2).as_bytes())?;
    info!("wrote calibration report to {output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        knowledge_graph::SpecimenParameter,
        mesher::{MeshGenerator, StructuredMesher},
    };

    #[test]
    fn mesh_csv_has_one_row_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("nodes.csv");
        let elements = dir.path().join("elements.csv");
        let mesh = StructuredMesher.rectangle(2.0, 1.0, 2, 1).unwrap();

        csv_output(&mesh, nodes.to_str().unwrap(), elements.to_str().unwrap()).unwrap();

        let nodes = std::fs::read_to_string(nodes).unwrap();
        let elements = std::fs::read_to_string(elements).unwrap();
        assert_eq!(nodes.lines().count(), 1 + 6);
        assert_eq!(elements.lines().next(), Some("n0,n1,n2"));
        assert_eq!(elements.lines().count(), 1 + 4);
    }

    #[test]
    fn report_lists_parameters_in_order() {
        let input = CalibrationInput {
            processed_data_path: "processed/Wolf_8_2_Probe_1.csv".to_owned(),
            specimen_parameters: vec![
                (SpecimenParameter::Mass, 5.8),
                (SpecimenParameter::Diameter, 98.75),
                (SpecimenParameter::Length, 300.3),
            ],
        };
        let outcome = CalibrationOutcome {
            youngs_modulus: 30_000.0,
            cost: 0.5,
            iterations: 40,
        };
        let report = CalibrationReport {
            experiment_name: "Wolf 8.2 Probe 1",
            input: &input,
            nominal_radius: 49.375,
            mesh_radius: None,
            bottom_area: 7658.9,
            outcome: &outcome,
        };

        let value = report_json(&report);
        assert_eq!(value["youngs_modulus"].as_f64(), Some(30_000.0));
        assert!(value["mesh_radius"].is_null());
        let parameters = &value["calibration_input"]["specimen_parameters"];
        assert_eq!(parameters.len(), 3);
        assert_eq!(parameters[1]["name"].as_str(), Some("Diameter"));
    }
}
