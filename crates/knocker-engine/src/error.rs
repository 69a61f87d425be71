use knocker_core::LineId;
use knocker_hardware::HardwareError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] knocker_core::Error),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error("Unknown line {0}")]
    UnknownLine(LineId),

    #[error("Line {0} registered twice")]
    DuplicateLine(LineId),
}

pub type Result<T> = std::result::Result<T, EngineError>;
