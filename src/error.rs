// src/error.rs

use std::path::{Path, PathBuf};

/// Errors raised while preparing, running, or post-processing a sweep.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("need {expected} per-layer values, got {got}")]
    LayerCount { expected: usize, got: usize },

    #[error("mesh extents must be non-zero (nx={nx}, ny={ny}, nz={nz})")]
    EmptyMesh { nx: usize, ny: usize, nz: usize },

    #[error("site count mismatch in {path}: {got} rows, expected {expected}")]
    SiteCount {
        path: PathBuf,
        expected: usize,
        got: usize,
    },

    #[error("parameter file '{file}' not found in {dir}")]
    MissingParamFile { dir: PathBuf, file: String },

    #[error("parameter '{name}' not found in '{file}'")]
    MissingParameter { file: String, name: String },

    #[error("run name '{0}' is produced by more than one sweep value")]
    DuplicateRunName(String),

    #[error("sweep has no values")]
    EmptySweep,

    #[error("failed to launch solver {path}: {source}")]
    SolverSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("solver failed in {dir} (exit code {code:?})")]
    SolverFailed { dir: PathBuf, code: Option<i32> },

    #[error("time series {path} is unusable: {message}")]
    Series { path: PathBuf, message: String },

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Attach a path to a bare `std::io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
