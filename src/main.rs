// src/main.rs
//
// Command-line driver for chained solver sweeps.
//
// Examples:
//
//   petaspin-sweep sites stack.toml --out runs/sim0
//       -> writes MS_file.dat, shape.dat and minicial.dat for a layer stack.
//
//   petaspin-sweep sweep hyst.toml
//       -> copies the template run once per field value, chains each run's
//          final state into the next, launches the solver, and (if the
//          config has a [loop] section) writes the hysteresis table.
//
//   petaspin-sweep loop runs --identifier Hext --phi 20 --out runs/hysteresis.csv
//       -> aggregates an existing sweep.
//
//   petaspin-sweep convergence runs/sim_Hext3.5e+02 --out conv.csv --tol 1e3
//
// Log verbosity is controlled by PETASPIN_LOG (default petaspin_sweep=info).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use petaspin_sweep::config::{SiteConfig, SweepConfig};
use petaspin_sweep::hysteresis::{DEFAULT_PHI_DEG, HysteresisLoop, LoopOptions};
use petaspin_sweep::logging::init_tracing;
use petaspin_sweep::simulation::Simulation;
use petaspin_sweep::site_files::MS_FILE;
use petaspin_sweep::solver::ExternalSolver;
use petaspin_sweep::sweep::run_sweep;

#[derive(Parser)]
#[command(name = "petaspin-sweep", version, about = "Chained field sweeps for an external micromagnetic solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write per-site Ms, shape and initial-state files from a layer stack
    Sites {
        config: PathBuf,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Run a chained sweep described by a TOML config
    Sweep { config: PathBuf },
    /// Aggregate finished runs into a hysteresis table
    Loop {
        root: PathBuf,
        #[arg(long, default_value = "Hext")]
        identifier: String,
        /// In-plane field angle from +x (degrees)
        #[arg(long, default_value_t = DEFAULT_PHI_DEG)]
        phi: f64,
        #[arg(long, default_value = MS_FILE)]
        ms_file: String,
        /// CSV output; the table is printed when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Report how far a run's magnetisation was from settling
    Convergence {
        sim: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Threshold on the final |dm/dt|
        #[arg(long)]
        tol: Option<f64>,
    },
    /// Print parameter files as JSON
    Params {
        sim: PathBuf,
        /// Only this file under file_configuration/
        #[arg(long)]
        file: Option<String>,
    },
    /// Rewrite one parameter in a run's parameter file
    SetParam {
        sim: PathBuf,
        file: String,
        target: String,
        #[arg(allow_hyphen_values = true)]
        value: f64,
        #[arg(long, default_value_t = 3)]
        precision: usize,
    },
    /// Print the solver time step derived from geometry.dat and ferromagnet.dat
    Timestep { sim: PathBuf },
}

fn print_loop(lp: &HysteresisLoop) {
    println!("{:>14} {:>14}", "Hext", "MH");
    for p in &lp.points {
        println!("{:>14.6e} {:>14.6e}", p.field, p.m_h);
    }
}

fn run(cli: Cli) -> petaspin_sweep::Result<ExitCode> {
    match cli.command {
        Command::Sites { config, out } => {
            let setup = SiteConfig::load(&config)?.into_setup();
            let files = setup.write_all(&out)?;
            println!("{}", files.ms.display());
            println!("{}", files.shape.display());
            println!("{}", files.initial_state.display());
        }

        Command::Sweep { config } => {
            let cfg = SweepConfig::load(&config)?;
            let plan = cfg.plan();
            let solver = ExternalSolver::new(cfg.executable.clone());
            let report = run_sweep(&plan, &solver)?;

            let failed: Vec<_> = report.failed().map(|r| r.name.as_str()).collect();
            if !failed.is_empty() {
                warn!(count = failed.len(), runs = ?failed, "solver failed for some runs");
            }

            if let (Some(loop_cfg), Some(out)) = (&cfg.loop_cfg, cfg.loop_output()) {
                let lp = HysteresisLoop::collect(&cfg.root, &loop_cfg.options(&cfg.identifier))?;
                lp.write_csv(&out)?;
                info!(path = %out.display(), points = lp.len(), "hysteresis table written");
            }
            if !failed.is_empty() {
                return Ok(ExitCode::from(1));
            }
        }

        Command::Loop {
            root,
            identifier,
            phi,
            ms_file,
            out,
        } => {
            let opts = LoopOptions {
                identifier,
                phi_deg: phi,
                ms_file,
            };
            let lp = HysteresisLoop::collect(&root, &opts)?;
            match out {
                Some(path) => {
                    lp.write_csv(&path)?;
                    info!(path = %path.display(), points = lp.len(), "hysteresis table written");
                }
                None => print_loop(&lp),
            }
        }

        Command::Convergence { sim, out, tol } => {
            let trace = Simulation::open(&sim)?.convergence()?;
            if let Some(path) = out {
                trace.write_csv(&path)?;
            }
            match trace.final_rate() {
                Some(rate) => println!("final |dm/dt| = {rate:.3e} 1/s"),
                None => println!("fewer than two samples; no rate available"),
            }
            if let Some(tol) = tol {
                if !trace.is_converged(tol) {
                    println!("not converged (tol = {tol:.3e})");
                    return Ok(ExitCode::from(1));
                }
                println!("converged (tol = {tol:.3e})");
            }
        }

        Command::Params { sim, file } => {
            let mut sim = Simulation::open(&sim)?;
            let json = match file {
                Some(f) => serde_json::to_string_pretty(&sim.file_parameters(&f)?)?,
                None => serde_json::to_string_pretty(sim.parameters()?)?,
            };
            println!("{json}");
        }

        Command::SetParam {
            sim,
            file,
            target,
            value,
            precision,
        } => {
            let mut sim = Simulation::open(&sim)?;
            let n = sim.modify_parameter(&file, &target, value, precision)?;
            if n == 0 {
                return Ok(ExitCode::from(1));
            }
            println!("updated {n} line(s) in {file}");
        }

        Command::Timestep { sim } => {
            let dt = Simulation::open(&sim)?.timestep()?;
            println!("{dt:.6e}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}
