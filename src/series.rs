// src/series.rs
//
// Post-processing of the solver's per-layer time series.
//
// output_lay{x,y,z}.txt hold one row per saved time step:
//     t  v_1  v_2 ... v_n
// where v_k is the k-th layer average of that component. Averaging the layer
// columns gives the stack-averaged magnetisation; its norm and time derivative
// tell whether a run has settled before its final state is chained onward.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, IoContext, Result};
use crate::numfmt::parse_float_token;
use crate::vec3::norm;

pub const LAYER_X_FILE: &str = "output_layx.txt";
pub const LAYER_Y_FILE: &str = "output_layy.txt";
pub const LAYER_Z_FILE: &str = "output_layz.txt";

/// Whitespace-separated numeric table; blank lines are skipped.
pub fn read_columns(path: &Path) -> Result<Vec<Vec<f64>>> {
    let text = fs::read_to_string(path).at(path)?;
    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                parse_float_token(tok).ok_or_else(|| Error::Malformed {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    message: format!("not a number: '{tok}'"),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// One component's time series with the layer columns averaged.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSeries {
    pub time: Vec<f64>,
    pub mean: Vec<f64>,
}

impl LayerSeries {
    pub fn read(path: &Path) -> Result<Self> {
        Self::from_rows(&read_columns(path)?, path)
    }

    fn from_rows(rows: &[Vec<f64>], origin: &Path) -> Result<Self> {
        let mut time = Vec::with_capacity(rows.len());
        let mut mean = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let Some((&t, values)) = row.split_first() else {
                continue;
            };
            if values.is_empty() {
                return Err(Error::Series {
                    path: origin.to_path_buf(),
                    message: format!("row {} has a time but no layer columns", i + 1),
                });
            }
            time.push(t);
            mean.push(values.iter().sum::<f64>() / values.len() as f64);
        }
        Ok(Self { time, mean })
    }
}

/// Stack-averaged magnetisation over time and its rate of change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceTrace {
    pub time: Vec<f64>,
    pub mx: Vec<f64>,
    pub my: Vec<f64>,
    pub mz: Vec<f64>,
    /// |<m>| per row.
    pub m: Vec<f64>,
    /// Forward difference of `m`; one entry shorter than `time`.
    pub dm_dt: Vec<f64>,
}

impl ConvergenceTrace {
    /// Read output_lay{x,y,z}.txt from a solver output directory.
    pub fn read_dir(output_dir: &Path) -> Result<Self> {
        let x = LayerSeries::read(&output_dir.join(LAYER_X_FILE))?;
        let y = LayerSeries::read(&output_dir.join(LAYER_Y_FILE))?;
        let z = LayerSeries::read(&output_dir.join(LAYER_Z_FILE))?;
        Self::from_components(x, y, z).map_err(|message| Error::Series {
            path: output_dir.to_path_buf(),
            message,
        })
    }

    /// Combine three component series; they must share the time axis length.
    pub fn from_components(
        x: LayerSeries,
        y: LayerSeries,
        z: LayerSeries,
    ) -> std::result::Result<Self, String> {
        let n = x.time.len();
        if y.mean.len() != n || z.mean.len() != n {
            return Err(format!(
                "component lengths differ (x={}, y={}, z={})",
                n,
                y.mean.len(),
                z.mean.len()
            ));
        }

        let m: Vec<f64> = (0..n)
            .map(|i| norm([x.mean[i], y.mean[i], z.mean[i]]))
            .collect();
        let dm_dt = m
            .windows(2)
            .zip(x.time.windows(2))
            .map(|(dm, dt)| (dm[1] - dm[0]) / (dt[1] - dt[0]))
            .collect();

        Ok(Self {
            time: x.time,
            mx: x.mean,
            my: y.mean,
            mz: z.mean,
            m,
            dm_dt,
        })
    }

    /// |dm/dt| at the last saved step.
    pub fn final_rate(&self) -> Option<f64> {
        self.dm_dt.last().map(|r| r.abs())
    }

    pub fn is_converged(&self, tol: f64) -> bool {
        self.final_rate().is_some_and(|r| r <= tol)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).at(path)?);
        writeln!(w, "t,mx,my,mz,m,dm_dt").at(path)?;
        for i in 0..self.time.len() {
            let rate = if i == 0 {
                String::new()
            } else {
                format!("{:.16e}", self.dm_dt[i - 1])
            };
            writeln!(
                w,
                "{:.16e},{:.16e},{:.16e},{:.16e},{:.16e},{}",
                self.time[i], self.mx[i], self.my[i], self.mz[i], self.m[i], rate
            )
            .at(path)?;
        }
        w.flush().at(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(time: &[f64], mean: &[f64]) -> LayerSeries {
        LayerSeries {
            time: time.to_vec(),
            mean: mean.to_vec(),
        }
    }

    #[test]
    fn layer_columns_are_averaged() {
        let rows = vec![vec![0.0, 1.0, 0.0, 0.5], vec![1e-9, 0.5, 0.5, 0.5]];
        let s = LayerSeries::from_rows(&rows, Path::new("output_layx.txt")).unwrap();
        assert_eq!(s.time, vec![0.0, 1e-9]);
        assert!((s.mean[0] - 0.5).abs() < 1e-12);
        assert!((s.mean[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn time_only_row_is_rejected() {
        let rows = vec![vec![0.0, 1.0], vec![1e-9]];
        assert!(LayerSeries::from_rows(&rows, Path::new("x")).is_err());
    }

    #[test]
    fn derivative_of_norm_uses_forward_differences() {
        let t = [0.0, 1.0, 3.0];
        let trace = ConvergenceTrace::from_components(
            series(&t, &[0.6, 0.8, 1.0]),
            series(&t, &[0.0, 0.0, 0.0]),
            series(&t, &[0.8, 0.6, 0.0]),
        )
        .unwrap();

        assert_eq!(trace.m.len(), 3);
        assert!(trace.m.iter().all(|m| (m - 1.0).abs() < 1e-12));
        assert_eq!(trace.dm_dt.len(), 2);
        assert!(trace.is_converged(1e-9));
    }

    #[test]
    fn still_moving_trace_is_not_converged() {
        let t = [0.0, 1.0, 2.0];
        let trace = ConvergenceTrace::from_components(
            series(&t, &[1.0, 0.5, 0.2]),
            series(&t, &[0.0, 0.0, 0.0]),
            series(&t, &[0.0, 0.0, 0.0]),
        )
        .unwrap();
        assert!((trace.final_rate().unwrap() - 0.3).abs() < 1e-12);
        assert!(!trace.is_converged(1e-3));
    }

    #[test]
    fn mismatched_components_are_reported() {
        let err = ConvergenceTrace::from_components(
            series(&[0.0, 1.0], &[1.0, 1.0]),
            series(&[0.0], &[0.0]),
            series(&[0.0, 1.0], &[0.0, 0.0]),
        )
        .unwrap_err();
        assert!(err.contains("differ"));
    }
}
