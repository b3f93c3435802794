// src/lib.rs

pub mod config;
pub mod dat_file;
pub mod error;
pub mod fs_util;
pub mod hysteresis;
pub mod logging;
pub mod mesh;
pub mod numfmt;
pub mod series;
pub mod simulation;
pub mod site_field;
pub mod site_files;
pub mod solver;
pub mod sweep;
pub mod vec3;

pub use error::{Error, Result};
