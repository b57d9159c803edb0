//! Error types for tickwire-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid sequence modulus {0}, expected a value in 2..=65536")]
    InvalidModulus(u32),

    #[error("Sequence id {value} is outside the space of modulus {modulus}")]
    SequenceOutOfRange { value: u16, modulus: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
