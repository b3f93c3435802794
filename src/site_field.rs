// src/site_field.rs
//
// Magnetisation stored per solver site, in the solver's layer-major order.
// Text form is one row per site with three components. The solver writes
// `output/m_last.txt` comma-separated but reads `minicial.dat` space-separated,
// so the reader accepts either.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, IoContext, Result};
use crate::mesh::Mesh;
use crate::numfmt::parse_float_token;

/// Per-site vector field. Each site stores (mx, my, mz).
#[derive(Debug, Clone, PartialEq)]
pub struct SiteField {
    pub data: Vec<[f64; 3]>,
}

impl SiteField {
    /// Replicate one vector per layer over every site of that layer.
    /// Extra vectors beyond `mesh.nz` are ignored.
    pub fn from_layers(mesh: &Mesh, layers: &[[f64; 3]]) -> Result<Self> {
        if layers.len() < mesh.nz {
            return Err(Error::LayerCount {
                expected: mesh.nz,
                got: layers.len(),
            });
        }
        let per_layer = mesh.sites_per_layer();
        let mut data = Vec::with_capacity(mesh.n_sites());
        for v in &layers[..mesh.nz] {
            data.extend(std::iter::repeat(*v).take(per_layer));
        }
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Parse a magnetisation file; blank lines are skipped.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        Self::parse(&text, path)
    }

    pub(crate) fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut data = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            if fields.is_empty() {
                continue;
            }
            let malformed = |message: String| Error::Malformed {
                path: origin.to_path_buf(),
                line: lineno + 1,
                message,
            };
            if fields.len() != 3 {
                return Err(malformed(format!(
                    "expected 3 components, found {}",
                    fields.len()
                )));
            }
            let mut v = [0.0; 3];
            for (slot, field) in v.iter_mut().zip(&fields) {
                *slot = parse_float_token(field)
                    .ok_or_else(|| malformed(format!("not a number: '{field}'")))?;
            }
            data.push(v);
        }
        Ok(Self { data })
    }

    /// Write one "mx my mz" row per site.
    pub fn write_text(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path).at(path)?;
        let mut w = BufWriter::new(file);
        for v in &self.data {
            writeln!(w, "{} {} {}", v[0], v[1], v[2]).at(path)?;
        }
        w.flush().at(path)
    }

    /// Component-wise mean over all sites (zero for an empty field).
    pub fn average(&self) -> [f64; 3] {
        if self.data.is_empty() {
            return [0.0; 3];
        }
        let mut s = [0.0; 3];
        for v in &self.data {
            s[0] += v[0];
            s[1] += v[1];
            s[2] += v[2];
        }
        let n = self.data.len() as f64;
        [s[0] / n, s[1] / n, s[2] / n]
    }
}
