use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Code errors
    #[error("Invalid code: {0}")]
    InvalidCode(String),

    // Line errors
    #[error("Invalid line: {0}")]
    InvalidLine(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
