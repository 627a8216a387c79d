use lebedigital::knowledge_graph::{calibration_input, KnowledgeGraph, SpecimenParameter};
use lebedigital::LebeError;

const EMODUL_GRAPH: &str = r#"
@prefix mseo: <https://purl.matolab.org/mseo/mid/> .
@prefix cco: <http://www.ontologyrepository.com/CommonCoreOntologies/> .
@prefix obo: <http://purl.obolibrary.org/obo/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

mseo:E-modul_experiment_Wolf_8_2_Probe_1 cco:has_output mseo:raw_data_1 .
mseo:raw_data_1 cco:is_input_of mseo:data_analysis_1 .
mseo:data_analysis_1 cco:has_output mseo:processed_data_1 .
mseo:processed_data_1 obo:RO_0010001 mseo:processed_data_info_1 .
mseo:processed_data_info_1 cco:has_URI_value "processed/Wolf_8_2_Probe_1.csv"^^xsd:anyURI .

mseo:specimen_1 cco:is_input_of mseo:E-modul_experiment_Wolf_8_2_Probe_1 .
mseo:specimen_1 obo:BFO_0000051 mseo:measurement_region_1 .

mseo:measurement_region_1 obo:RO_0000086 mseo:length_1 .
mseo:length_1 a cco:Length ;
    obo:RO_0010001 mseo:length_info_1 .
mseo:length_info_1 cco:has_decimal_value "300.3"^^xsd:decimal .

mseo:measurement_region_1 obo:RO_0000086 mseo:mass_1 .
mseo:mass_1 a cco:Mass ;
    obo:RO_0010001 mseo:mass_info_1 .
mseo:mass_info_1 cco:has_decimal_value "5.8"^^xsd:decimal .

mseo:measurement_region_1 obo:RO_0000086 mseo:diameter_1 .
mseo:diameter_1 a cco:Diameter ;
    obo:RO_0010001 mseo:diameter_info_1 .
mseo:diameter_info_1 cco:has_decimal_value "98.75"^^xsd:decimal .
"#;

#[test]
fn retrieves_path_and_parameters_in_query_order() {
    let graph = KnowledgeGraph::from_turtle_str(EMODUL_GRAPH).unwrap();
    let input = calibration_input(&graph, "Wolf 8.2 Probe 1").unwrap();

    assert_eq!(input.processed_data_path, "processed/Wolf_8_2_Probe_1.csv");
    assert_eq!(input.values(), vec![5.8, 98.75, 300.3]);
    assert_eq!(input.specimen_parameters[0].0, SpecimenParameter::Mass);
    assert_eq!(input.diameter(), Some(98.75));
    assert_eq!(input.length(), Some(300.3));
}

#[test]
fn unknown_experiment_yields_empty_input() {
    let graph = KnowledgeGraph::from_turtle_str(EMODUL_GRAPH).unwrap();
    let input = calibration_input(&graph, "Wolf 9.9 Probe 7").unwrap();

    assert!(input.processed_data_path.is_empty());
    assert!(input.specimen_parameters.is_empty());
}

#[test]
fn non_numeric_parameter_is_a_graph_error() {
    let turtle = EMODUL_GRAPH.replace("\"5.8\"^^xsd:decimal", "\"heavy\"");
    let graph = KnowledgeGraph::from_turtle_str(&turtle).unwrap();

    assert!(matches!(
        calibration_input(&graph, "Wolf 8.2 Probe 1"),
        Err(LebeError::Graph(_))
    ));
}

#[test]
fn graph_can_be_shared_between_queries() {
    let graph = KnowledgeGraph::from_turtle_str(EMODUL_GRAPH).unwrap();
    assert!(!graph.is_empty().unwrap());

    let first = calibration_input(&graph, "Wolf 8.2 Probe 1").unwrap();
    let second = calibration_input(&graph.clone(), "Wolf 8.2 Probe 1").unwrap();
    assert_eq!(first, second);
}
