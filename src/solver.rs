// src/solver.rs
//
// Process boundary to the external micromagnetic solver.
//
// The solver takes no arguments. It reads its inputs from the working
// directory (parameter files, minicial.dat, site files) and writes into
// `output/`. Each invocation blocks until the process exits.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, IoContext, Result};

/// Default executable name shipped inside every simulation directory.
pub const DEFAULT_EXECUTABLE: &str = "codePetaspin.exe";

/// How one solver run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverOutcome {
    pub success: bool,
    pub code: Option<i32>,
    #[serde(with = "secs")]
    pub elapsed: Duration,
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Anything that can turn a prepared run directory into solver output.
pub trait Solver {
    fn run(&self, run_dir: &Path) -> Result<SolverOutcome>;
}

/// The real solver, launched as a subprocess inside the run directory.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    /// Relative to the run directory unless absolute.
    pub executable: PathBuf,
}

impl ExternalSolver {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable_in(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.executable)
    }
}

impl Default for ExternalSolver {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

impl Solver for ExternalSolver {
    fn run(&self, run_dir: &Path) -> Result<SolverOutcome> {
        // The child's cwd is the run directory, so a relative executable path
        // would be resolved against it a second time.
        let dir = std::path::absolute(run_dir).at(run_dir)?;
        let exe = self.executable_in(&dir);
        info!(exe = %exe.display(), dir = %dir.display(), "launching solver");

        let start = Instant::now();
        let status = Command::new(&exe)
            .current_dir(&dir)
            .status()
            .map_err(|source| Error::SolverSpawn {
                path: exe.clone(),
                source,
            })?;
        let elapsed = start.elapsed();

        if !status.success() {
            warn!(dir = %dir.display(), code = ?status.code(), "solver exited with failure");
        } else {
            info!(dir = %dir.display(), secs = elapsed.as_secs_f64(), "solver finished");
        }

        Ok(SolverOutcome {
            success: status.success(),
            code: status.code(),
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_executable_resolves_inside_run_dir() {
        let s = ExternalSolver::default();
        assert_eq!(
            s.executable_in(Path::new("/runs/sim_Hext1.0e+02")),
            PathBuf::from("/runs/sim_Hext1.0e+02/codePetaspin.exe")
        );
        let abs = ExternalSolver::new("/opt/petaspin/solver");
        assert_eq!(
            abs.executable_in(Path::new("/runs/x")),
            PathBuf::from("/opt/petaspin/solver")
        );
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExternalSolver::default().run(dir.path()).unwrap_err();
        assert!(matches!(err, Error::SolverSpawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn solver_runs_inside_a_relative_run_dir() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::Builder::new()
            .prefix("solver-rel")
            .tempdir_in(".")
            .unwrap();
        let cwd = std::env::current_dir().unwrap();
        let rel = tmp
            .path()
            .strip_prefix(&cwd)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| tmp.path().to_path_buf());
        assert!(rel.is_relative());

        let exe = rel.join(DEFAULT_EXECUTABLE);
        std::fs::write(&exe, "#!/bin/sh\necho done > ran.txt\nexit 4\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let outcome = ExternalSolver::default().run(&rel).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.code, Some(4));
        assert!(rel.join("ran.txt").is_file());
    }
}
