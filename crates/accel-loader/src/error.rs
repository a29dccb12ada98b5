use accel_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("failed to load driver library {path}: {source}")]
    Library {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("{path} does not export a driver entry point: {source}")]
    MissingEntry {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("driver entry point in {0} returned null")]
    EntryFailed(String),
}
