// src/site_files.rs
//
// Writers for the solver's per-site input files.
//
// The solver reads flat text arrays with one entry per site, layer-major:
//  - scalar files (MS_file.dat, shape.dat): one value per line
//  - vector files (minicial.dat): "mx my mz" per line
//
// A multilayer stack is described layer by layer; every site in a layer gets
// the layer's value. Spacer (non-magnetic) layers are represented the same way
// the solver represents vacuum: Ms = 0, shape = 0, m = (0, 0, 0).

use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, IoContext, Result};
use crate::mesh::Mesh;
use crate::vec3::normalize;

pub const MS_FILE: &str = "MS_file.dat";
pub const SHAPE_FILE: &str = "shape.dat";
pub const INITIAL_STATE_FILE: &str = "minicial.dat";

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).at(parent)?;
        }
    }
    Ok(())
}

fn check_layers(mesh: &Mesh, got: usize) -> Result<()> {
    mesh.validate()?;
    if got < mesh.nz {
        return Err(Error::LayerCount {
            expected: mesh.nz,
            got,
        });
    }
    Ok(())
}

/// Write `values[z]` once per site of layer `z`. Returns the number of lines written.
pub fn write_scalar_layers(path: &Path, mesh: &Mesh, values: &[f64]) -> Result<usize> {
    check_layers(mesh, values.len())?;
    ensure_parent_dir(path)?;

    let mut w = BufWriter::new(File::create(path).at(path)?);
    for &value in &values[..mesh.nz] {
        for _ in 0..mesh.sites_per_layer() {
            writeln!(w, "{value}").at(path)?;
        }
    }
    w.flush().at(path)?;

    let lines = mesh.n_sites();
    info!(path = %path.display(), lines, "scalar site file written");
    Ok(lines)
}

/// Write `vectors[z]` as "mx my mz" once per site of layer `z`.
pub fn write_vector_layers(path: &Path, mesh: &Mesh, vectors: &[[f64; 3]]) -> Result<usize> {
    check_layers(mesh, vectors.len())?;
    ensure_parent_dir(path)?;

    let mut w = BufWriter::new(File::create(path).at(path)?);
    for v in &vectors[..mesh.nz] {
        // Format once per layer; the row repeats nx*ny times.
        let row = format!("{} {} {}", v[0], v[1], v[2]);
        for _ in 0..mesh.sites_per_layer() {
            writeln!(w, "{row}").at(path)?;
        }
    }
    w.flush().at(path)?;

    let lines = mesh.n_sites();
    info!(path = %path.display(), lines, "vector site file written");
    Ok(lines)
}

/// One layer of a multilayer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Saturation magnetisation (A/m).
    pub ms: f64,
    #[serde(default = "default_magnetic")]
    pub magnetic: bool,
    /// Initial magnetisation direction; normalised on write.
    #[serde(default = "default_m0")]
    pub m0: [f64; 3],
}

fn default_magnetic() -> bool {
    true
}

fn default_m0() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

impl LayerSpec {
    pub fn magnetic(ms: f64, m0: [f64; 3]) -> Self {
        Self {
            ms,
            magnetic: true,
            m0,
        }
    }

    pub fn spacer() -> Self {
        Self {
            ms: 0.0,
            magnetic: false,
            m0: [0.0; 3],
        }
    }

    fn ms_value(&self) -> f64 {
        if self.magnetic { self.ms } else { 0.0 }
    }

    fn shape_value(&self) -> f64 {
        if self.magnetic { 1.0 } else { 0.0 }
    }

    fn initial_m(&self) -> [f64; 3] {
        if self.magnetic { normalize(self.m0) } else { [0.0; 3] }
    }
}

/// Complete site setup for one simulation directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSetup {
    pub mesh: Mesh,
    pub layers: Vec<LayerSpec>,
}

/// Paths of the files produced by [`SiteSetup::write_all`].
#[derive(Debug, Clone)]
pub struct SiteFiles {
    pub ms: PathBuf,
    pub shape: PathBuf,
    pub initial_state: PathBuf,
}

impl SiteSetup {
    /// Write MS_file.dat, shape.dat and minicial.dat into `dir`.
    /// Validates the whole stack before touching the filesystem.
    pub fn write_all(&self, dir: &Path) -> Result<SiteFiles> {
        check_layers(&self.mesh, self.layers.len())?;
        create_dir_all(dir).at(dir)?;

        let ms: Vec<f64> = self.layers.iter().map(LayerSpec::ms_value).collect();
        let shape: Vec<f64> = self.layers.iter().map(LayerSpec::shape_value).collect();
        let m0: Vec<[f64; 3]> = self.layers.iter().map(LayerSpec::initial_m).collect();

        let files = SiteFiles {
            ms: dir.join(MS_FILE),
            shape: dir.join(SHAPE_FILE),
            initial_state: dir.join(INITIAL_STATE_FILE),
        };
        write_scalar_layers(&files.ms, &self.mesh, &ms)?;
        write_scalar_layers(&files.shape, &self.mesh, &shape)?;
        write_vector_layers(&files.initial_state, &self.mesh, &m0)?;
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scalar_file_has_one_line_per_site() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MS_file.dat");
        let mesh = Mesh::new(3, 2, 2);

        let n = write_scalar_layers(&path, &mesh, &[7.4e5, 0.0]).unwrap();
        assert_eq!(n, 12);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 12);
        assert!(lines[..6].iter().all(|l| *l == "740000"));
        assert!(lines[6..].iter().all(|l| *l == "0"));
    }

    #[test]
    fn missing_layer_values_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shape.dat");
        let mesh = Mesh::new(2, 2, 5);

        let err = write_scalar_layers(&path, &mesh, &[1.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::LayerCount { expected: 5, got: 3 }));
        assert!(!path.exists());
    }

    #[test]
    fn spacer_layer_is_vacuum_in_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let setup = SiteSetup {
            mesh: Mesh::new(2, 1, 3),
            layers: vec![
                LayerSpec::magnetic(7.4e5, [2.0, 0.0, 0.0]),
                LayerSpec {
                    ms: 7.4e5,
                    magnetic: false,
                    m0: [1.0, 0.0, 0.0],
                },
                LayerSpec::magnetic(7.4e5, [0.0, 0.0, -1.0]),
            ],
        };
        let files = setup.write_all(dir.path()).unwrap();

        let ms = fs::read_to_string(&files.ms).unwrap();
        assert_eq!(ms.lines().nth(2), Some("0"));
        let shape = fs::read_to_string(&files.shape).unwrap();
        assert_eq!(shape.lines().collect::<Vec<_>>(), ["1", "1", "0", "0", "1", "1"]);
        let m = fs::read_to_string(&files.initial_state).unwrap();
        let rows: Vec<&str> = m.lines().collect();
        assert_eq!(rows[0], "1 0 0");
        assert_eq!(rows[2], "0 0 0");
        assert_eq!(rows[5], "0 0 -1");
    }
}
