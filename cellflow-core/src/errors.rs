use thiserror::Error;

/// Error type for invalid operations.
///
/// Every variant is fatal to a run. Errors are raised while modules are bound,
/// while the pipeline is built or while the output schedule is constructed,
/// and are propagated up rather than recovered.
#[derive(Error, Debug)]
pub enum CellflowError {
    #[error("{module}: parameter '{name}' does not exist")]
    UnknownParameter { module: String, name: String },
    #[error("{module}: result '{name}' does not exist")]
    UnknownResult { module: String, name: String },
    #[error("{module}: input data for '{name}' is invalid, the size must be greater than zero")]
    InvalidSize { module: String, name: String },
    #[error(
        "{module}: input data for '{name}' has {actual} cells but {expected} cells were expected. \
         All the input data should have the same size"
    )]
    InconsistentSize {
        module: String,
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("{module}: {name} can not be {value}, it should be between {min} and {max}")]
    Range {
        module: String,
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{subject}: {message}")]
    Configuration { subject: String, message: String },
    #[error("{module}: required input '{name}' is not bound")]
    MissingInput { module: String, name: String },
    #[error("{module}: cell {cell}: {message}")]
    Numerical {
        module: String,
        cell: usize,
        message: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CellflowError {
    /// Shorthand for a [`CellflowError::Configuration`] error
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        CellflowError::Configuration {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn missing_input(module: &str, name: &str) -> Self {
        CellflowError::MissingInput {
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    pub fn unknown_parameter(module: &str, name: &str) -> Self {
        CellflowError::UnknownParameter {
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    pub fn unknown_result(module: &str, name: &str) -> Self {
        CellflowError::UnknownResult {
            module: module.to_string(),
            name: name.to_string(),
        }
    }
}

/// Convenience type for `Result<T, CellflowError>`.
pub type CellflowResult<T> = Result<T, CellflowError>;
