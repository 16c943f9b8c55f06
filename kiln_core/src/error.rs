use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum KilnError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout talking to hardware")]
    Timeout,
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("refusing to start run: {0}")]
    StartRefused(String),
    #[error("run aborted: {0}")]
    Abort(AbortReason),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Why a running schedule was stopped before it ended.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbortReason {
    #[error("temperature at or above emergency shutoff")]
    TempTooHigh,
    #[error("lost connection to thermocouple")]
    LostConnection,
    #[error("unknown thermocouple error")]
    UnknownError,
    #[error("too many thermocouple errors in a short period")]
    TooManyErrors,
    #[error("heating element failure: {0}")]
    Actuator(String),
    #[error("aborted by operator")]
    Operator,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing heating element")]
    MissingElement,
    #[error("missing temperature sensor")]
    MissingSensor,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
