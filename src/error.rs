use thiserror::Error;

/// Errors raised while loading or writing a scan configuration file.
///
/// The analysis pipeline itself never fails; configuration I/O is the
/// only fallible surface this library exposes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {source}")]
    Serialize { source: serde_yaml::Error },
}
