// src/hysteresis.rs
//
// Aggregation of a finished sweep into a hysteresis loop M_H(H).
//
// For each run directory `sim_<identifier><H>` with a final state:
//   1. scale the unit magnetisation of every site by that site's Ms
//      (read from the run's MS_file.dat);
//   2. drop vacuum / spacer sites (scaled vector ~ 0);
//   3. project onto the in-plane field direction at angle phi from +x;
//   4. average the projections.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Error, IoContext, Result};
use crate::series::read_columns;
use crate::simulation::{FINAL_STATE_FILE, OUTPUT_DIR};
use crate::site_field::SiteField;
use crate::site_files::MS_FILE;
use crate::vec3::{dot, in_plane_direction, is_near_zero, scale};

pub const DEFAULT_PHI_DEG: f64 = 20.0;

/// Sites whose scaled magnetisation is within this of zero are vacuum.
const VACUUM_ATOL: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub identifier: String,
    /// In-plane field angle from +x, degrees.
    pub phi_deg: f64,
    /// Per-site Ms file inside each run directory.
    pub ms_file: String,
}

impl LoopOptions {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            phi_deg: DEFAULT_PHI_DEG,
            ms_file: MS_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopPoint {
    pub field: f64,
    pub m_h: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HysteresisLoop {
    pub points: Vec<LoopPoint>,
}

/// Anchored pattern for run directory names, capturing the field value.
pub fn run_dir_pattern(identifier: &str) -> Result<Regex> {
    let pattern = format!(
        r"^sim_{}([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)$",
        regex::escape(identifier)
    );
    Ok(Regex::new(&pattern)?)
}

/// One value per non-empty line (the first column is used).
pub fn read_site_scalars(path: &Path) -> Result<Vec<f64>> {
    Ok(read_columns(path)?
        .into_iter()
        .filter_map(|row| row.first().copied())
        .collect())
}

/// Mean projection of `Ms_i * m_i` onto the in-plane direction, over magnetic sites.
/// `None` when no site is magnetic.
pub fn projected_average(m: &SiteField, ms: &[f64], phi_deg: f64) -> Option<f64> {
    let dir = in_plane_direction(phi_deg);
    let mut sum = 0.0;
    let mut count = 0usize;
    for (v, &ms_i) in m.data.iter().zip(ms) {
        let scaled = scale(*v, ms_i);
        if is_near_zero(scaled, VACUUM_ATOL) {
            continue;
        }
        sum += dot(scaled, dir);
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

fn process_run(dir: &Path, opts: &LoopOptions) -> Result<Option<f64>> {
    let m_path = dir.join(OUTPUT_DIR).join(FINAL_STATE_FILE);
    let m = SiteField::read(&m_path)?;
    let ms = read_site_scalars(&dir.join(&opts.ms_file))?;
    if ms.len() != m.len() {
        return Err(Error::SiteCount {
            path: m_path,
            expected: ms.len(),
            got: m.len(),
        });
    }
    Ok(projected_average(&m, &ms, opts.phi_deg))
}

impl HysteresisLoop {
    /// Scan `root` for run directories and build the loop, sorted by field.
    /// Runs without output or with unreadable files are skipped with a log entry.
    pub fn collect(root: &Path, opts: &LoopOptions) -> Result<Self> {
        let pattern = run_dir_pattern(&opts.identifier)?;

        let mut runs: Vec<(f64, PathBuf)> = Vec::new();
        for entry in fs::read_dir(root).at(root)? {
            let entry = entry.at(root)?;
            if !entry.file_type().at(entry.path())?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(caps) = pattern.captures(&name) else {
                continue;
            };
            let Some(field) = caps.get(1).and_then(|c| c.as_str().parse::<f64>().ok()) else {
                continue;
            };
            runs.push((field, entry.path()));
        }

        let mut points = Vec::with_capacity(runs.len());
        for (field, dir) in runs {
            if !dir.join(OUTPUT_DIR).join(FINAL_STATE_FILE).is_file() {
                warn!(dir = %dir.display(), "no final state; skipping run");
                continue;
            }
            match process_run(&dir, opts) {
                Ok(Some(m_h)) => points.push(LoopPoint { field, m_h }),
                Ok(None) => warn!(dir = %dir.display(), "no magnetic sites; skipping run"),
                Err(e) => error!(dir = %dir.display(), error = %e, "failed to process run"),
            }
        }

        points.sort_by(|a, b| a.field.total_cmp(&b.field));
        info!(points = points.len(), root = %root.display(), "hysteresis loop collected");
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).at(path)?);
        writeln!(w, "Hext,MH").at(path)?;
        for p in &self.points {
            writeln!(w, "{:.16e},{:.16e}", p.field, p.m_h).at(path)?;
        }
        w.flush().at(path)
    }
}
