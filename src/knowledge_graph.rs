//! Retrieval of calibration inputs from the E-modul knowledge graph.
//!
//! The graph is loaded once into an in-memory store and handed to every
//! query by reference.

use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::model::{NamedNode, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use tracing::{debug, info, warn};

use crate::error::LebeError;

pub const MSEO_NAMESPACE: &str = "https://purl.matolab.org/mseo/mid/";
const EXPERIMENT_PREFIX: &str = "E-modul experiment ";

const PREFIXES: &str = "
    prefix mseo: <https://purl.matolab.org/mseo/mid/>
    prefix cco: <http://www.ontologyrepository.com/CommonCoreOntologies/>
    prefix obo: <http://purl.obolibrary.org/obo/>
";

/// Specimen parameters stored for every E-modul experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecimenParameter {
    Mass,
    Diameter,
    Length,
}

impl SpecimenParameter {
    /// Query order of the parameters
    pub const ALL: [SpecimenParameter; 3] = [
        SpecimenParameter::Mass,
        SpecimenParameter::Diameter,
        SpecimenParameter::Length,
    ];

    /// Local name of the CommonCoreOntologies class
    pub fn class_name(&self) -> &'static str {
        match self {
            SpecimenParameter::Mass => "Mass",
            SpecimenParameter::Diameter => "Diameter",
            SpecimenParameter::Length => "Length",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationInput {
    /// Location of the processed data file, empty when the graph has none
    pub processed_data_path: String,
    /// Parameter values in query order; parameters without a value are absent
    pub specimen_parameters: Vec<(SpecimenParameter, f64)>,
}

impl CalibrationInput {
    pub fn parameter(&self, parameter: SpecimenParameter) -> Option<f64> {
        self.specimen_parameters
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|(_, v)| *v)
    }

    pub fn mass(&self) -> Option<f64> {
        self.parameter(SpecimenParameter::Mass)
    }

    pub fn diameter(&self) -> Option<f64> {
        self.parameter(SpecimenParameter::Diameter)
    }

    pub fn length(&self) -> Option<f64> {
        self.parameter(SpecimenParameter::Length)
    }

    pub fn values(&self) -> Vec<f64> {
        self.specimen_parameters.iter().map(|(_, v)| *v).collect()
    }
}

/// Read-only handle to a parsed knowledge graph
#[derive(Clone)]
pub struct KnowledgeGraph {
    store: Store,
}

impl KnowledgeGraph {
    pub fn from_turtle_str(turtle: &str) -> Result<KnowledgeGraph, LebeError> {
        let store = Store::new()
            .map_err(|err| LebeError::Graph(format!("Unable to create graph store: {err}")))?;
        store
            .load_from_reader(RdfFormat::Turtle, turtle.as_bytes())
            .map_err(|err| LebeError::Graph(format!("Unable to parse turtle document: {err}")))?;

        Ok(KnowledgeGraph { store })
    }

    pub fn from_turtle_file(path: &Path) -> Result<KnowledgeGraph, LebeError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) => {
                return Err(LebeError::Input(format!(
                    "Unable to open knowledge graph {}: {err}",
                    path.display()
                )))
            }
        };

        let graph = Self::from_turtle_str(&contents)?;
        info!("loaded {} triples from {}", graph.len()?, path.display());
        Ok(graph)
    }

    pub fn len(&self) -> Result<usize, LebeError> {
        self.store
            .len()
            .map_err(|err| LebeError::Graph(format!("Unable to count triples: {err}")))
    }

    pub fn is_empty(&self) -> Result<bool, LebeError> {
        Ok(self.len()? == 0)
    }

    /// Runs a SELECT query and returns the bindings of `variable`, in order
    fn select(&self, query: &str, variable: &str) -> Result<Vec<Term>, LebeError> {
        let results = self
            .store
            .query(query)
            .map_err(|err| LebeError::Graph(format!("Query failed: {err}")))?;

        let solutions = match results {
            QueryResults::Solutions(solutions) => solutions,
            _ => {
                return Err(LebeError::Graph(
                    "Expected solutions from SELECT query".to_owned(),
                ))
            }
        };

        let mut terms: Vec<Term> = Vec::new();
        for solution in solutions {
            let solution =
                solution.map_err(|err| LebeError::Graph(format!("Query failed: {err}")))?;
            if let Some(term) = solution.get(variable) {
                terms.push(term.clone());
            }
        }

        Ok(terms)
    }
}

/// Maps a specimen name such as `Wolf 8.2 Probe 1` to the experiment IRI
/// `mseo:E-modul_experiment_Wolf_8_2_Probe_1`
pub fn experiment_node(experiment_name: &str) -> Result<NamedNode, LebeError> {
    let normalize = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_whitespace() || c == '.' { '_' } else { c })
            .collect()
    };
    let local_name = normalize(EXPERIMENT_PREFIX) + &normalize(experiment_name);

    NamedNode::new(format!("{MSEO_NAMESPACE}{local_name}")).map_err(|err| {
        LebeError::Graph(format!(
            "Experiment name {experiment_name:?} does not form a valid IRI: {err}"
        ))
    })
}

fn processed_data_query(experiment: &NamedNode) -> String {
    format!(
        "{PREFIXES}
        select ?rawdatapath
        where {{
            {{
                select ?info
                where {{
                    {{
                        select ?analyseddata
                        where {{
                            {{
                                select ?process
                                where {{
                                    {{
                                        select ?rawdata
                                        where {{ {experiment} cco:has_output ?rawdata }}
                                    }}
                                    ?rawdata cco:is_input_of ?process
                                }}
                            }}
                            ?process cco:has_output ?analyseddata
                        }}
                    }}
                    ?analyseddata obo:RO_0010001 ?info
                }}
            }}
            ?info cco:has_URI_value ?rawdatapath
        }}
        limit 1"
    )
}

fn specimen_parameter_query(experiment: &NamedNode, parameter: SpecimenParameter) -> String {
    let class = parameter.class_name();
    format!(
        "{PREFIXES}
        select ?parametervalue
        where {{
            {{
                select ?info
                where {{
                    {{
                        select ?parameterclass
                        where {{
                            {{
                                select ?measurementregion
                                where {{
                                    {{
                                        select ?specimen
                                        where {{ ?specimen cco:is_input_of {experiment} }}
                                    }}
                                    ?specimen obo:BFO_0000051 ?measurementregion
                                }}
                            }}
                            ?measurementregion obo:RO_0000086 ?parameterclass .
                            ?parameterclass a cco:{class}
                        }}
                    }}
                    ?parameterclass obo:RO_0010001 ?info
                }}
            }}
            ?info cco:has_decimal_value ?parametervalue
        }}"
    )
}

fn term_text(term: &Term) -> String {
    match term {
        Term::Literal(literal) => literal.value().to_owned(),
        Term::NamedNode(node) => node.as_str().to_owned(),
        other => other.to_string(),
    }
}

fn term_number(term: &Term) -> Result<f64, LebeError> {
    let text = term_text(term);
    text.trim().parse().map_err(|_| {
        LebeError::Graph(format!("Parameter value {term} is not a number"))
    })
}

/// Collects the processed data path and the specimen parameters of an
/// E-modul experiment.
///
/// Missing graph entries do not fail: the path stays empty and absent
/// parameters are left out.
pub fn calibration_input(
    graph: &KnowledgeGraph,
    experiment_name: &str,
) -> Result<CalibrationInput, LebeError> {
    let experiment = experiment_node(experiment_name)?;
    debug!("querying calibration input for {experiment}");

    let processed_data_path = graph
        .select(&processed_data_query(&experiment), "rawdatapath")?
        .first()
        .map(term_text)
        .unwrap_or_default();
    if processed_data_path.is_empty() {
        warn!("no processed data path for {experiment}");
    }

    let mut specimen_parameters: Vec<(SpecimenParameter, f64)> = Vec::new();
    for parameter in SpecimenParameter::ALL {
        let query = specimen_parameter_query(&experiment, parameter);
        for term in graph.select(&query, "parametervalue")? {
            specimen_parameters.push((parameter, term_number(&term)?));
        }
    }

    info!(
        "retrieved {} specimen parameters for {experiment_name}",
        specimen_parameters.len()
    );

    Ok(CalibrationInput {
        processed_data_path,
        specimen_parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_names_are_normalized() {
        let node = experiment_node("Wolf 8.2 Probe 1").unwrap();
        assert_eq!(
            node.as_str(),
            "https://purl.matolab.org/mseo/mid/E-modul_experiment_Wolf_8_2_Probe_1"
        );
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(matches!(
            experiment_node("Wolf <8>"),
            Err(LebeError::Graph(_))
        ));
    }

    #[test]
    fn malformed_turtle_is_a_graph_error() {
        assert!(matches!(
            KnowledgeGraph::from_turtle_str("@prefix broken"),
            Err(LebeError::Graph(_))
        ));
    }
}
