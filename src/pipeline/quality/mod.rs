pub mod types;
pub mod decode;
pub mod sharpness;
pub mod noise;
pub mod framing;
pub mod gate;

pub use types::*;
pub use decode::*;
pub use sharpness::*;
pub use noise::*;
pub use framing::*;
pub use gate::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("Invalid quality thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid gate limits: {0}")]
    InvalidLimits(String),
}
