use thiserror::Error;

#[derive(Debug, Error)]
pub enum LebeError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Mesher error: {0}")]
    Mesher(String),
    #[error(
        "Mesher error: bottom area {mesh_area} did not reach target {target_area} \
         after {iterations} iterations"
    )]
    Convergence {
        iterations: usize,
        mesh_area: f64,
        target_area: f64,
    },
    #[error("Setup error: {0}")]
    Setup(String),
    #[error("Knowledge graph error: {0}")]
    Graph(String),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Calibration error: {0}")]
    Calibration(String),
    #[error("Post processor error: {0}")]
    PostProcessor(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
