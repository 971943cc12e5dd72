use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("{key} must be true/false, got {value:?}")]
    InvalidBool { key: String, value: String },
}
