// src/simulation.rs
//
// One solver run directory:
//
//   <sim>/
//     ├── codePetaspin.exe
//     ├── minicial.dat, MS_file.dat, shape.dat   (site setup)
//     ├── file_configuration/*.dat               (parameter files)
//     └── output/                                (written by the solver)
//           ├── m_last.txt
//           └── output_lay{x,y,z}.txt

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::dat_file::ParamFile;
use crate::error::{Error, IoContext, Result};
use crate::series::ConvergenceTrace;
use crate::site_field::SiteField;

pub const CONFIG_DIR: &str = "file_configuration";
pub const OUTPUT_DIR: &str = "output";
pub const FINAL_STATE_FILE: &str = "m_last.txt";

/// Vacuum permeability (T·m/A).
pub const MU0: f64 = 4.0 * PI * 1e-7;

/// Parameters of every file, keyed by file name then parameter name.
pub type ParameterSet = BTreeMap<String, BTreeMap<String, f64>>;

fn index_files(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        if entry.file_type().at(entry.path())?.is_file() {
            files.insert(entry.file_name().to_string_lossy().into_owned(), entry.path());
        }
    }
    Ok(files)
}

#[derive(Debug)]
pub struct Simulation {
    dir: PathBuf,
    config_files: BTreeMap<String, PathBuf>,
    setup_files: BTreeMap<String, PathBuf>,
    output_files: BTreeMap<String, PathBuf>,
    cache: Option<ParameterSet>,
}

impl Simulation {
    /// Index a simulation directory. `file_configuration/` must exist;
    /// `output/` may not, for runs that have not executed yet.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let config_files = index_files(&dir.join(CONFIG_DIR))?;
        let setup_files = index_files(&dir)?;
        let mut sim = Self {
            dir,
            config_files,
            setup_files,
            output_files: BTreeMap::new(),
            cache: None,
        };
        sim.refresh_outputs()?;
        Ok(sim)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.join(OUTPUT_DIR)
    }

    pub fn config_files(&self) -> &BTreeMap<String, PathBuf> {
        &self.config_files
    }

    pub fn setup_files(&self) -> &BTreeMap<String, PathBuf> {
        &self.setup_files
    }

    pub fn output_files(&self) -> &BTreeMap<String, PathBuf> {
        &self.output_files
    }

    /// Re-scan `output/`, e.g. after the solver has run.
    pub fn refresh_outputs(&mut self) -> Result<()> {
        let out = self.output_dir();
        self.output_files = if out.is_dir() {
            index_files(&out)?
        } else {
            BTreeMap::new()
        };
        Ok(())
    }

    fn config_path(&self, file: &str) -> Result<&Path> {
        self.config_files
            .get(file)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::MissingParamFile {
                dir: self.dir.join(CONFIG_DIR),
                file: file.to_string(),
            })
    }

    /// Parameters of a single file.
    pub fn file_parameters(&self, file: &str) -> Result<BTreeMap<String, f64>> {
        Ok(ParamFile::read(self.config_path(file)?)?.parameters())
    }

    /// Parameters of all files; parsed once and cached until a modification.
    pub fn parameters(&mut self) -> Result<&ParameterSet> {
        let params = match self.cache.take() {
            Some(p) => p,
            None => {
                let mut all = ParameterSet::new();
                for name in self.config_files.keys() {
                    all.insert(name.clone(), self.file_parameters(name)?);
                }
                all
            }
        };
        Ok(self.cache.insert(params))
    }

    pub fn parameter(&mut self, file: &str, name: &str) -> Result<f64> {
        let config_dir = self.dir.join(CONFIG_DIR);
        let params = self.parameters()?;
        let in_file = params.get(file).ok_or_else(|| Error::MissingParamFile {
            dir: config_dir,
            file: file.to_string(),
        })?;
        in_file
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingParameter {
                file: file.to_string(),
                name: name.to_string(),
            })
    }

    /// Rewrite `target` in `file` to `value`. Returns the number of lines changed.
    pub fn modify_parameter(
        &mut self,
        file: &str,
        target: &str,
        value: f64,
        precision: usize,
    ) -> Result<usize> {
        let path = self.config_path(file)?.to_path_buf();
        let mut pf = ParamFile::read(&path)?;
        let updated = pf.set(target, value, precision);
        if updated == 0 {
            warn!(file, target, "parameter not found");
        } else {
            pf.write(&path)?;
        }
        self.cache = None;
        Ok(updated)
    }

    /// Solver time step: omega * multiply / (mu0 * gama * Ms_const).
    pub fn timestep(&mut self) -> Result<f64> {
        let omega = self.parameter("geometry.dat", "omega")?;
        let multiply = self.parameter("geometry.dat", "multiply")?;
        let gamma = self.parameter("ferromagnet.dat", "gama")?;
        let ms = self.parameter("ferromagnet.dat", "Ms_const")?;
        Ok((omega * multiply) / (MU0 * gamma * ms))
    }

    pub fn final_state_path(&self) -> PathBuf {
        self.output_dir().join(FINAL_STATE_FILE)
    }

    pub fn final_state(&self) -> Result<SiteField> {
        SiteField::read(&self.final_state_path())
    }

    pub fn convergence(&self) -> Result<ConvergenceTrace> {
        ConvergenceTrace::read_dir(&self.output_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sim(root: &Path) -> PathBuf {
        let dir = root.join("sim0");
        fs::create_dir_all(dir.join(CONFIG_DIR)).unwrap();
        fs::write(
            dir.join(CONFIG_DIR).join("geometry.dat"),
            "0.01  !omega reduced time step\n2  !multiply\n",
        )
        .unwrap();
        fs::write(
            dir.join(CONFIG_DIR).join("ferromagnet.dat"),
            "2.21e5 !gama\n8.0e5 !Ms_const\n",
        )
        .unwrap();
        fs::write(dir.join("minicial.dat"), "1 0 0\n").unwrap();
        dir
    }

    #[test]
    fn open_indexes_config_and_setup_without_output() {
        let tmp = tempfile::tempdir().unwrap();
        let sim = Simulation::open(make_sim(tmp.path())).unwrap();
        assert!(sim.config_files().contains_key("geometry.dat"));
        assert!(sim.setup_files().contains_key("minicial.dat"));
        assert!(!sim.setup_files().contains_key(CONFIG_DIR));
        assert!(sim.output_files().is_empty());
    }

    #[test]
    fn open_requires_configuration_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            Simulation::open(tmp.path()),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn timestep_combines_geometry_and_material() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sim = Simulation::open(make_sim(tmp.path())).unwrap();
        let dt = sim.timestep().unwrap();
        let expected = (0.01 * 2.0) / (MU0 * 2.21e5 * 8.0e5);
        assert!((dt - expected).abs() <= 1e-12 * expected);
    }

    #[test]
    fn modification_invalidates_the_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sim = Simulation::open(make_sim(tmp.path())).unwrap();
        assert_eq!(sim.parameter("geometry.dat", "multiply").unwrap(), 2.0);

        let n = sim.modify_parameter("geometry.dat", "multiply", 4.0, 3).unwrap();
        assert_eq!(n, 1);
        assert_eq!(sim.parameter("geometry.dat", "multiply").unwrap(), 4.0);

        assert_eq!(sim.modify_parameter("geometry.dat", "nope", 1.0, 3).unwrap(), 0);
    }

    #[test]
    fn missing_names_are_typed_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sim = Simulation::open(make_sim(tmp.path())).unwrap();
        assert!(matches!(
            sim.parameter("anisotropy.dat", "K1"),
            Err(Error::MissingParamFile { .. })
        ));
        assert!(matches!(
            sim.parameter("geometry.dat", "dx"),
            Err(Error::MissingParameter { .. })
        ));
    }
}
