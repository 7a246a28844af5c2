//! The error type shared by every module of the crate.

use std::{
    error::Error,
    fmt::{self, Debug, Display},
    io,
    time::Duration,
};

use crate::{
    parameters::Parameter,
    state::{AgeClass, Compartment},
};

/// Reasons a single integration run can fail after it has started.
#[derive(Clone, Debug, PartialEq)]
pub enum SolverFailure {
    /// The adaptive step shrank below `SolverOptions::min_step`, or below the rounding limit
    /// of `t`. `step` is the last step size taken.
    StepSizeUnderflow { t: f64, step: f64 },
    /// The step budget `SolverOptions::max_steps` ran out.
    MaxStepsExceeded { t: f64, steps: usize },
    /// The right-hand side returned NaN or infinity at an accepted state.
    NonFiniteDerivative { t: f64 },
    /// The integrator's stiffness test fired repeatedly.
    StiffnessDetected { t: f64 },
    /// A `CancellationToken` attached to the run was triggered.
    Cancelled { t: f64 },
    /// The run exceeded its wall-clock budget.
    TimedOut { t: f64, elapsed: Duration },
    /// The initial state length does not match `OdeSystem::dim()`.
    DimensionMismatch { expected: usize, found: usize },
}

impl Display for SolverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverFailure::StepSizeUnderflow { t, step } => {
                write!(f, "step size {step:e} fell below the minimum at t={t}")
            }
            SolverFailure::MaxStepsExceeded { t, steps } => {
                write!(f, "exceeded {steps} steps before reaching the end time (stopped at t={t})")
            }
            SolverFailure::NonFiniteDerivative { t } => {
                write!(f, "derivative evaluation returned a non-finite value at t={t}")
            }
            SolverFailure::StiffnessDetected { t } => {
                write!(f, "problem appears stiff at t={t}")
            }
            SolverFailure::Cancelled { t } => write!(f, "run cancelled at t={t}"),
            SolverFailure::TimedOut { t, elapsed } => {
                write!(f, "run timed out after {elapsed:?} at t={t}")
            }
            SolverFailure::DimensionMismatch { expected, found } => {
                write!(f, "expected a state of length {expected}, found {found}")
            }
        }
    }
}

impl Error for SolverFailure {}

/// Provides `TbError` and maps other errors to it.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum TbError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    MissingParameter(Parameter),
    InvalidParameter { parameter: Parameter, value: f64 },
    InvalidInitialState { compartment: Compartment, value: f64 },
    EmptyInitialState,
    EmptyAgeClass(AgeClass),
    InvalidTimeGrid(String),
    InvalidSweep(String),
    SolverFailure(SolverFailure),
    TbError(String),
}

impl TbError {
    /// Whether this error was raised while validating inputs, before any
    /// integration started.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TbError::MissingParameter(_)
                | TbError::InvalidParameter { .. }
                | TbError::InvalidInitialState { .. }
                | TbError::EmptyInitialState
                | TbError::EmptyAgeClass(_)
                | TbError::InvalidTimeGrid(_)
                | TbError::InvalidSweep(_)
        )
    }
}

impl From<io::Error> for TbError {
    fn from(error: io::Error) -> Self {
        TbError::IoError(error)
    }
}

impl From<serde_json::Error> for TbError {
    fn from(error: serde_json::Error) -> Self {
        TbError::JsonError(error)
    }
}

impl From<csv::Error> for TbError {
    fn from(error: csv::Error) -> Self {
        TbError::CsvError(error)
    }
}

impl From<SolverFailure> for TbError {
    fn from(failure: SolverFailure) -> Self {
        TbError::SolverFailure(failure)
    }
}

impl From<String> for TbError {
    fn from(error: String) -> Self {
        TbError::TbError(error)
    }
}

impl From<&str> for TbError {
    fn from(error: &str) -> Self {
        TbError::TbError(error.to_string())
    }
}

impl Error for TbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TbError::IoError(error) => Some(error),
            TbError::JsonError(error) => Some(error),
            TbError::CsvError(error) => Some(error),
            TbError::SolverFailure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl Display for TbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TbError::IoError(error) => write!(f, "I/O error: {error}"),
            TbError::JsonError(error) => write!(f, "JSON error: {error}"),
            TbError::CsvError(error) => write!(f, "CSV error: {error}"),
            TbError::MissingParameter(parameter) => {
                write!(f, "missing parameter `{}`", parameter.name())
            }
            TbError::InvalidParameter { parameter, value } => {
                write!(f, "invalid value {value} for parameter `{}`", parameter.name())
            }
            TbError::InvalidInitialState { compartment, value } => {
                write!(f, "invalid initial value {value} for compartment {}", compartment.label())
            }
            TbError::EmptyInitialState => write!(f, "initial state has no individuals"),
            TbError::EmptyAgeClass(age_class) => write!(
                f,
                "initial {age_class} class is empty while transmission is positive; \
                 per-capita infection pressure is undefined"
            ),
            TbError::InvalidTimeGrid(message) => write!(f, "invalid time grid: {message}"),
            TbError::InvalidSweep(message) => write!(f, "invalid sweep: {message}"),
            TbError::SolverFailure(failure) => write!(f, "numerical failure: {failure}"),
            TbError::TbError(message) => write!(f, "{message}"),
        }
    }
}
