//! Calibration workflow for concrete cylinder compression tests.
//!
//! Calibration inputs are pulled from the E-modul knowledge graph
//! ([`knowledge_graph`]), the specimen is meshed with a cross section matching
//! the nominal cylinder ([`mesher`]), displacement boundary conditions are
//! assembled per experiment setup ([`boundary`], [`experiment`]) and a Young's
//! modulus is fitted to the processed measurements ([`calibration`]).

pub mod boundary;
pub mod calibration;
pub mod config;
pub mod datatypes;
pub mod error;
pub mod experiment;
pub mod gmsh;
pub mod knowledge_graph;
pub mod mesher;
pub mod post_processor;
pub mod processed_data;
pub mod solver;

pub use error::LebeError;
