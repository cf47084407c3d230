use thiserror::Error;

pub type GcTunerResult<T> = Result<T, GcTunerError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcTunerError {
    #[error("invalid min gc percent: {0}")]
    InvalidMinGcPercent(u32),
    #[error("invalid max gc percent: {0}")]
    InvalidMaxGcPercent(u32),
    #[error("min gc percent {min} is greater than max gc percent {max}")]
    MinAboveMax { min: u32, max: u32 },
    #[error("unable to resolve memory limit for threshold")]
    UnresolvableThreshold,
    #[error("a collector runtime is already installed for this process")]
    AlreadyInstalled,
    #[error("no collector runtime installed; call `nova_gctuner::install` first")]
    NotInstalled,
}
