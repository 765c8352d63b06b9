//! Errors raised while training a DQN agent.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum DqnError {
    /// An observation or action disagrees with the configured dimensions.
    #[error("dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Loss or gradients became NaN/Inf.
    #[error("non-finite {what}: {value}")]
    NumericInstability { what: String, value: f64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Acting and target estimators do not share a parameter.
    #[error("parameter `{0}` missing from one of the estimators")]
    ParameterSchema(String),

    #[cfg(feature = "plot")]
    #[error("plot: {0}")]
    Plot(String),

    #[error(transparent)]
    Tch(#[from] tch::TchError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DqnError>;

/// Checks that a vector has the expected length.
pub(crate) fn check_dim(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(DqnError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}
