use super::solver::SolverError;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("layout solver failed: {0}")]
    Solver(#[from] SolverError),
    #[error("invalid layout option {key}={value}")]
    InvalidOption { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, LayoutError>;
