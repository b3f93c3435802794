// src/config.rs
//
// Input configuration (TOML) and the provenance manifest each sweep leaves
// behind (JSON).
//
// Example sweep config:
//
//   root = "F:/bilayer/t=5nm_hystloop"
//   template = "sim0"
//   dat_file = "input_field.dat"
//   target = "!field ext (mT)"
//   identifier = "Hext"
//   order = "descending"
//
//   [schedule]
//   start = -350.0
//   stop = 350.0
//   count = 70
//
//   [loop]
//   phi_deg = 20.0
//   output = "hysteresis.csv"

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoContext, Result};
use crate::hysteresis::{DEFAULT_PHI_DEG, LoopOptions};
use crate::mesh::Mesh;
use crate::site_files::{LayerSpec, MS_FILE, SiteSetup};
use crate::solver::DEFAULT_EXECUTABLE;
use crate::sweep::{
    DEFAULT_NAME_PRECISION, DEFAULT_VALUE_PRECISION, FieldSchedule, Order, RunRecord, SweepPlan,
};

fn default_executable() -> PathBuf {
    PathBuf::from(DEFAULT_EXECUTABLE)
}

fn default_value_precision() -> usize {
    DEFAULT_VALUE_PRECISION
}

fn default_name_precision() -> usize {
    DEFAULT_NAME_PRECISION
}

fn default_phi() -> f64 {
    DEFAULT_PHI_DEG
}

fn default_ms_file() -> String {
    MS_FILE.to_string()
}

fn default_loop_output() -> PathBuf {
    PathBuf::from("hysteresis.csv")
}

/// `[loop]` section: how to aggregate the sweep afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_phi")]
    pub phi_deg: f64,
    #[serde(default = "default_ms_file")]
    pub ms_file: String,
    /// Relative to the sweep root unless absolute.
    #[serde(default = "default_loop_output")]
    pub output: PathBuf,
}

impl LoopConfig {
    pub fn options(&self, identifier: &str) -> LoopOptions {
        LoopOptions {
            identifier: identifier.to_string(),
            phi_deg: self.phi_deg,
            ms_file: self.ms_file.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Directory holding the template and all runs. Relative paths are
    /// resolved against the config file's directory.
    pub root: PathBuf,
    pub template: PathBuf,
    pub dat_file: String,
    pub target: String,
    pub identifier: String,
    pub schedule: FieldSchedule,
    #[serde(default)]
    pub order: Order,
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    #[serde(default = "default_value_precision")]
    pub value_precision: usize,
    #[serde(default = "default_name_precision")]
    pub name_precision: usize,
    #[serde(default)]
    pub stop_on_failure: bool,
    #[serde(rename = "loop")]
    pub loop_cfg: Option<LoopConfig>,
}

impl SweepConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        let mut cfg = Self::parse(&text)?;
        cfg.resolve_root(path)?;
        Ok(cfg)
    }

    /// Make `root` absolute: relative roots hang off the config file's
    /// directory, which itself may be relative to the working directory.
    pub fn resolve_root(&mut self, config_path: &Path) -> Result<()> {
        let base = config_path.parent().unwrap_or(Path::new(""));
        let joined = base.join(&self.root);
        self.root = std::path::absolute(&joined).at(&joined)?;
        Ok(())
    }

    pub fn plan(&self) -> SweepPlan {
        let mut plan = SweepPlan::new(
            self.root.clone(),
            self.template.clone(),
            self.dat_file.clone(),
            self.target.clone(),
            self.identifier.clone(),
            self.schedule.values(self.order),
        );
        plan.value_precision = self.value_precision;
        plan.name_precision = self.name_precision;
        plan.stop_on_failure = self.stop_on_failure;
        plan
    }

    pub fn loop_output(&self) -> Option<PathBuf> {
        self.loop_cfg.as_ref().map(|l| self.root.join(&l.output))
    }
}

/// Site-file generation config: `[mesh]` plus one `[[layers]]` per z-layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub mesh: Mesh,
    pub layers: Vec<LayerSpec>,
}

impl SiteConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        Self::parse(&text)
    }

    pub fn into_setup(self) -> SiteSetup {
        SiteSetup {
            mesh: self.mesh,
            layers: self.layers,
        }
    }
}

/// What was swept, as recorded in `sweep.json`.
#[derive(Debug, Clone, Serialize)]
pub struct SweepInfo {
    pub root: PathBuf,
    pub template: PathBuf,
    pub dat_file: String,
    pub target: String,
    pub identifier: String,
    pub values: Vec<f64>,
    pub value_precision: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub binary: String,
    pub version: String,
    /// False when the sweep stopped early.
    pub completed: bool,
}

#[derive(Serialize)]
pub struct SweepManifest<'a> {
    pub sweep: SweepInfo,
    pub runs: &'a [RunRecord],
    pub run: RunInfo,
}

impl<'a> SweepManifest<'a> {
    pub fn new(sweep: SweepInfo, runs: &'a [RunRecord], completed: bool) -> Self {
        Self {
            sweep,
            runs,
            run: RunInfo {
                binary: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                completed,
            },
        }
    }

    pub fn write_to_dir(&self, out_dir: &Path) -> Result<()> {
        let path = out_dir.join("sweep.json");
        let file = File::create(&path).at(&path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
