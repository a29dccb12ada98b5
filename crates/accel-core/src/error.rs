use accel_api::types::ParseApiVersionError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Version(#[from] ParseApiVersionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
