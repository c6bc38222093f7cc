use std::path::{Path, PathBuf};

use thiserror::Error;

use chipstack_io::{ConfigError, GdsError};
use chipstack_scene::HostError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Layer stack file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid layer stack: {0}")]
    ConfigMalformed(#[source] ConfigError),

    #[error("GDS-II file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Cannot import {path}: {source}")]
    InputMalformed {
        path: PathBuf,
        #[source]
        source: GdsError,
    },

    #[error("Host failed to create {what}: {source}")]
    HostAdapterFailure {
        what: String,
        #[source]
        source: HostError,
    },

    #[error("Invalid import options: {0}")]
    InvalidOptions(String),
}

impl ImportError {
    /// Classify a reader error for the file at `path`.
    pub fn from_gds(path: &Path, err: GdsError) -> Self {
        if err.is_not_found() {
            ImportError::InputNotFound(path.to_path_buf())
        } else {
            ImportError::InputMalformed {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    pub fn host(what: impl Into<String>, source: HostError) -> Self {
        ImportError::HostAdapterFailure {
            what: what.into(),
            source,
        }
    }
}

impl From<ConfigError> for ImportError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound(path) => ImportError::ConfigNotFound(path),
            other => ImportError::ConfigMalformed(other),
        }
    }
}
