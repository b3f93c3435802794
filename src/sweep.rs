// src/sweep.rs
//
// Chained parameter sweep (hysteresis driver).
//
// Starting from a template run directory, every sweep value gets its own
// directory `sim_<identifier><value>`, copied from the previous run, with the
// swept parameter rewritten and the previous run's final magnetisation
// (output/m_last.txt) installed as the new initial state (minicial.dat).
// Runs are strictly sequential: run k+1 cannot be prepared before run k's
// solver has exited, because its initial state is run k's output.
//
// Typical outputs:
//   <root>/
//     ├── sim0/                       (template, untouched)
//     ├── sim_Hext3.5e+02/
//     ├── sim_Hext3.4e+02/
//     ├── ...
//     └── sweep.json                  (manifest of this sweep)

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{SweepInfo, SweepManifest};
use crate::dat_file::ParamFile;
use crate::error::{Error, IoContext, Result};
use crate::fs_util::{copy_dir_recursive, remove_dir_forced};
use crate::numfmt::sci;
use crate::series::ConvergenceTrace;
use crate::simulation::{CONFIG_DIR, FINAL_STATE_FILE, OUTPUT_DIR};
use crate::site_files::INITIAL_STATE_FILE;
use crate::solver::{Solver, SolverOutcome};

pub const DEFAULT_VALUE_PRECISION: usize = 2;
pub const DEFAULT_NAME_PRECISION: usize = 1;

/// `n` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut v: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            v[n - 1] = stop;
            v
        }
    }
}

/// Where the sweep values come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSchedule {
    Explicit { values: Vec<f64> },
    Linspace { start: f64, stop: f64, count: usize },
}

/// Order in which scheduled values are visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    AsGiven,
    Ascending,
    Descending,
}

impl FieldSchedule {
    pub fn values(&self, order: Order) -> Vec<f64> {
        let mut v = match self {
            Self::Explicit { values } => values.clone(),
            Self::Linspace { start, stop, count } => linspace(*start, *stop, *count),
        };
        match order {
            Order::AsGiven => {}
            Order::Ascending => v.sort_by(f64::total_cmp),
            Order::Descending => v.sort_by(|a, b| b.total_cmp(a)),
        }
        v
    }
}

/// Directory name of the run for `value`.
pub fn run_name(identifier: &str, value: f64, precision: usize) -> String {
    format!("sim_{}{}", identifier, sci(value, precision))
}

/// Everything needed to lay out and run one sweep.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub root: PathBuf,
    /// Template run directory, relative to `root`.
    pub template: PathBuf,
    /// Parameter file under `file_configuration/` holding the swept parameter.
    pub dat_file: String,
    /// Label of the swept parameter, e.g. `!field ext (mT)`.
    pub target: String,
    pub identifier: String,
    pub values: Vec<f64>,
    pub value_precision: usize,
    pub name_precision: usize,
    pub stop_on_failure: bool,
}

impl SweepPlan {
    pub fn new(
        root: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
        dat_file: impl Into<String>,
        target: impl Into<String>,
        identifier: impl Into<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            root: root.into(),
            template: template.into(),
            dat_file: dat_file.into(),
            target: target.into(),
            identifier: identifier.into(),
            values,
            value_precision: DEFAULT_VALUE_PRECISION,
            name_precision: DEFAULT_NAME_PRECISION,
            stop_on_failure: false,
        }
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root.join(&self.template)
    }

    /// Run names in sweep order. Rejects plans that would reuse a directory.
    pub fn run_names(&self) -> Result<Vec<String>> {
        if self.values.is_empty() {
            return Err(Error::EmptySweep);
        }
        let template = self.template.to_string_lossy();
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(self.values.len());
        for &v in &self.values {
            let name = run_name(&self.identifier, v, self.name_precision);
            if name == template || !seen.insert(name.clone()) {
                return Err(Error::DuplicateRunName(name));
            }
            names.push(name);
        }
        Ok(names)
    }

    fn info(&self) -> SweepInfo {
        SweepInfo {
            root: self.root.clone(),
            template: self.template.clone(),
            dat_file: self.dat_file.clone(),
            target: self.target.clone(),
            identifier: self.identifier.clone(),
            values: self.values.clone(),
            value_precision: self.value_precision,
        }
    }
}

/// What happened to one sweep step.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub name: String,
    pub value: f64,
    pub dir: PathBuf,
    pub overwritten: bool,
    /// Parameter lines rewritten (0 means the parameter was not found).
    pub parameter_updated: usize,
    /// Whether the previous run's final state seeded this run.
    pub chained: bool,
    pub solver: SolverOutcome,
    /// |dm/dt| at the end of the run, when the solver wrote layer series.
    pub final_dm_dt: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub runs: Vec<RunRecord>,
}

impl SweepReport {
    pub fn failed(&self) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter().filter(|r| !r.solver.success)
    }
}

/// Rewrite the swept parameter in a freshly copied run directory.
fn apply_parameter(run_dir: &Path, plan: &SweepPlan, value: f64) -> Result<usize> {
    let path = run_dir.join(CONFIG_DIR).join(&plan.dat_file);
    if !path.is_file() {
        warn!(file = %plan.dat_file, dir = %run_dir.display(), "parameter file does not exist");
        return Ok(0);
    }
    let mut pf = ParamFile::read(&path)?;
    let updated = pf.set(&plan.target, value, plan.value_precision);
    if updated == 0 {
        warn!(target = %plan.target, file = %plan.dat_file, "parameter not found");
    } else {
        pf.write(&path)?;
    }
    Ok(updated)
}

/// Install `prev`'s final state as `next`'s initial state.
///
/// m_last.txt is comma-separated; minicial.dat must be space-separated.
pub fn chain_state(prev: &Path, next: &Path) -> Result<bool> {
    let m_last = prev.join(OUTPUT_DIR).join(FINAL_STATE_FILE);
    if !m_last.is_file() {
        warn!(path = %m_last.display(), "no previous state found; keeping copied initial state");
        return Ok(false);
    }
    let content = fs::read_to_string(&m_last).at(&m_last)?;
    let target = next.join(INITIAL_STATE_FILE);
    fs::write(&target, content.replace(',', " ")).at(&target)?;
    info!(from = %prev.display(), "transferred final state");
    Ok(true)
}

/// Drop outputs copied from the previous run so a failed solver run cannot
/// be mistaken for a finished one. The (empty) output directory is kept.
fn clear_stale_output(run_dir: &Path) -> Result<()> {
    let out = run_dir.join(OUTPUT_DIR);
    if out.is_dir() {
        remove_dir_forced(&out)?;
        fs::create_dir_all(&out).at(&out)?;
    }
    Ok(())
}

fn write_manifest(plan: &SweepPlan, report: &SweepReport, completed: bool) -> Result<()> {
    SweepManifest::new(plan.info(), &report.runs, completed).write_to_dir(&plan.root)
}

/// |dm/dt| at the end of a run. Missing layer series are normal for solvers
/// that do not write them; unreadable ones are reported.
fn final_rate(name: &str, output_dir: &Path) -> Option<f64> {
    match ConvergenceTrace::read_dir(output_dir) {
        Ok(trace) => {
            let rate = trace.final_rate();
            if let Some(rate) = rate {
                debug!(run = %name, rate, "final |dm/dt|");
            }
            rate
        }
        Err(Error::Io { ref source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!(run = %name, "no layer series written");
            None
        }
        Err(e) => {
            warn!(run = %name, error = %e, "layer series unreadable");
            None
        }
    }
}

/// Prepare, run and record one sweep step. `prev` is the directory the run
/// is copied and chained from.
fn run_step(
    plan: &SweepPlan,
    solver: &dyn Solver,
    prev: &Path,
    name: String,
    value: f64,
) -> Result<RunRecord> {
    let dir = plan.root.join(&name);

    let overwritten = dir.exists();
    if overwritten {
        remove_dir_forced(&dir)?;
        info!(run = %name, "simulation overwritten");
    } else {
        info!(run = %name, "simulation created");
    }

    copy_dir_recursive(prev, &dir)?;
    clear_stale_output(&dir)?;
    let parameter_updated = apply_parameter(&dir, plan, value)?;
    let chained = chain_state(prev, &dir)?;

    let outcome = solver.run(&dir)?;
    let final_dm_dt = final_rate(&name, &dir.join(OUTPUT_DIR));

    Ok(RunRecord {
        name,
        value,
        dir,
        overwritten,
        parameter_updated,
        chained,
        solver: outcome,
        final_dm_dt,
    })
}

/// Run the whole sweep. Blocks on every solver invocation.
///
/// `sweep.json` is written whenever at least the first step was attempted,
/// including when the sweep stops on an error; `run.completed` tells the
/// cases apart.
pub fn run_sweep(plan: &SweepPlan, solver: &dyn Solver) -> Result<SweepReport> {
    let names = plan.run_names()?;
    let template = plan.template_dir();
    if !template.is_dir() {
        return Err(Error::io(
            &template,
            std::io::Error::new(std::io::ErrorKind::NotFound, "template run directory missing"),
        ));
    }

    info!(
        runs = names.len(),
        template = %template.display(),
        target = %plan.target,
        "starting sweep"
    );

    let mut report = SweepReport::default();
    let mut prev = template;

    for (&value, name) in plan.values.iter().zip(names) {
        let record = match run_step(plan, solver, &prev, name, value) {
            Ok(record) => record,
            Err(e) => {
                if let Err(me) = write_manifest(plan, &report, false) {
                    warn!(error = %me, "could not write sweep manifest");
                }
                return Err(e);
            }
        };

        let failed = (!record.solver.success).then(|| (record.dir.clone(), record.solver.code));
        prev = record.dir.clone();
        report.runs.push(record);

        if let Some((dir, code)) = failed {
            if plan.stop_on_failure {
                write_manifest(plan, &report, false)?;
                return Err(Error::SolverFailed { dir, code });
            }
        }
    }

    write_manifest(plan, &report, true)?;
    info!(runs = report.runs.len(), "sweep finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let v = linspace(-350.0, 350.0, 70);
        assert_eq!(v.len(), 70);
        assert_eq!(v[0], -350.0);
        assert_eq!(v[69], 350.0);
        assert!((v[1] - v[0] - 700.0 / 69.0).abs() < 1e-9);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
    }

    #[test]
    fn descending_schedule_starts_at_positive_saturation() {
        let s = FieldSchedule::Linspace {
            start: -350.0,
            stop: 350.0,
            count: 70,
        };
        let v = s.values(Order::Descending);
        assert_eq!(v[0], 350.0);
        assert_eq!(v[69], -350.0);
        assert!(v.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn run_names_follow_the_identifier_convention() {
        assert_eq!(run_name("Hext", -350.0, 1), "sim_Hext-3.5e+02");
        assert_eq!(run_name("A", 1e-11, 1), "sim_A1.0e-11");
    }

    #[test]
    fn colliding_names_are_rejected_up_front() {
        let plan = SweepPlan::new(
            "/tmp/root",
            "sim0",
            "input_field.dat",
            "field",
            "Hext",
            vec![100.0, 101.0],
        );
        assert!(matches!(plan.run_names(), Err(Error::DuplicateRunName(n)) if n == "sim_Hext1.0e+02"));

        let mut plan = plan;
        plan.values.clear();
        assert!(matches!(plan.run_names(), Err(Error::EmptySweep)));
    }

    #[test]
    fn chaining_rewrites_commas_as_spaces() {
        let tmp = tempfile::tempdir().unwrap();
        let prev = tmp.path().join("a");
        let next = tmp.path().join("b");
        fs::create_dir_all(prev.join(OUTPUT_DIR)).unwrap();
        fs::create_dir_all(&next).unwrap();
        fs::write(prev.join(OUTPUT_DIR).join(FINAL_STATE_FILE), "1,0,0\n0.5,0.5,0\n").unwrap();

        assert!(chain_state(&prev, &next).unwrap());
        assert_eq!(
            fs::read_to_string(next.join(INITIAL_STATE_FILE)).unwrap(),
            "1 0 0\n0.5 0.5 0\n"
        );
        assert!(!chain_state(&next, &prev).unwrap());
    }

    #[test]
    fn final_rate_tolerates_missing_and_malformed_series() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        assert_eq!(final_rate("sim_a", out), None);

        fs::write(out.join("output_layx.txt"), "0.0 0.5\n1.0 oops\n").unwrap();
        fs::write(out.join("output_layy.txt"), "0.0 0\n1.0 0\n").unwrap();
        fs::write(out.join("output_layz.txt"), "0.0 0\n1.0 0\n").unwrap();
        assert_eq!(final_rate("sim_a", out), None);

        fs::write(out.join("output_layx.txt"), "0.0 0.5\n1.0 0.75\n").unwrap();
        assert_eq!(final_rate("sim_a", out), Some(0.25));
    }
}
