//! Failure taxonomy. Every fatal condition belongs to one of three classes,
//! each with its own process exit code so that callers can tell them apart.
use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// Malformed or inconsistent run parameters. Raised before any generation
    /// starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Inputs that cannot be honored: missing segments, unreadable references,
    /// an amplicon probe that matches no cell in the population.
    #[error("data error: {0}")]
    Data(String),

    /// Uniqueness constraints unsatisfiable within the retry budget.
    #[error("capacity error: {0}")]
    Capacity(String),
}

impl SimulationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SimulationError::Config(_) => 2,
            SimulationError::Data(_) => 3,
            SimulationError::Capacity(_) => 4,
        }
    }

    pub fn config(msg: impl Display) -> anyhow::Error {
        SimulationError::Config(msg.to_string()).into()
    }

    pub fn data(msg: impl Display) -> anyhow::Error {
        SimulationError::Data(msg.to_string()).into()
    }

    pub fn capacity(msg: impl Display) -> anyhow::Error {
        SimulationError::Capacity(msg.to_string()).into()
    }
}

/// Exit code for an error bubbled up to the binary entry point.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SimulationError>() {
        Some(e) => e.exit_code(),
        None => 1,
    }
}
