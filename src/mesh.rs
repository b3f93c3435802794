// src/mesh.rs

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Layered finite-difference mesh as the solver numbers it.
/// Sites are stored layer-major: all nx*ny sites of layer 0, then layer 1, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mesh {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Mesh {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return Err(Error::EmptyMesh {
                nx: self.nx,
                ny: self.ny,
                nz: self.nz,
            });
        }
        Ok(())
    }

    /// Sites in one z-layer.
    pub fn sites_per_layer(&self) -> usize {
        self.nx * self.ny
    }

    /// Total number of sites.
    pub fn n_sites(&self) -> usize {
        self.sites_per_layer() * self.nz
    }

    /// Layer index of a flat site index.
    #[inline]
    pub fn layer_of(&self, site: usize) -> usize {
        debug_assert!(site < self.n_sites());
        site / self.sites_per_layer()
    }

    /// Convert (i, j, k) to a flat index (x fastest, then y, then layer).
    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny && k < self.nz);
        k * self.sites_per_layer() + j * self.nx + i
    }
}
