//! Error types shared across configuration, physics, dispatch and batch execution.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.general.days"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by physical sub-models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("non-positive timestep: delta = {delta_s} s")]
    NonPositiveTimestep { delta_s: f64 },

    #[error("controller released {released} mol, produced {produced} mol")]
    ControllerOutOfRange { released: f64, produced: f64 },

    #[error("non-finite result: {what}")]
    NonFinite { what: &'static str },

    #[error("invalid argument: {what}")]
    InvalidArg { what: &'static str },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Errors raised by the operation-strategy dispatch protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("strategy `{strategy}`: cannot {event} while {phase}")]
    InvalidTransition {
        strategy: String,
        phase: &'static str,
        event: &'static str,
    },

    #[error("strategy `{strategy}` returned non-finite setpoint {value}")]
    NonFiniteSetpoint { strategy: String, value: f64 },

    #[error("invalid composite `{strategy}`: {what}")]
    InvalidComposite {
        strategy: String,
        what: &'static str,
    },
}

pub type StrategyResult<T> = Result<T, StrategyError>;

/// Errors that terminate a simulation or a batch.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("i/o error at `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("summary serialization failed: {0}")]
    Summary(#[from] toml::ser::Error),

    #[error("simulation `{name}` cancelled at t={time_s} s")]
    Cancelled { name: String, time_s: f64 },

    #[error("simulation `{name}` exceeded wall-time limit of {limit_s} s")]
    Timeout { name: String, limit_s: f64 },

    #[error("simulation `{name}` panicked: {message}")]
    Panicked { name: String, message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_names_field() {
        let e = ConfigError::new("batch.cores", "must be > 0");
        assert_eq!(e.to_string(), "config error: batch.cores: must be > 0");
    }

    #[test]
    fn physics_error_converts_into_sim_error() {
        let e: SimError = PhysicsError::NonPositiveTimestep { delta_s: 0.0 }.into();
        assert!(matches!(e, SimError::Physics(_)));
        assert!(e.to_string().contains("non-positive timestep"));
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let a: Box<dyn std::any::Any + Send> = Box::new("boom");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(a.as_ref()), "boom");
        assert_eq!(panic_message(b.as_ref()), "bang");
    }
}
