use num_bigint::BigInt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RlweError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("No such coefficient: index {index}")]
    IndexError { index: isize },

    #[error("Invalid dimension: expected {expected}, got {got}")]
    InvalidDimension {
        expected: usize,
        got: usize,
    },

    #[error("Invalid modulus: {modulus}")]
    InvalidModulus { modulus: BigInt },

    #[error("Protocol misuse: {0}")]
    ProtocolMisuse(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Random source error: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RlweError>;
