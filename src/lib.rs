//
// lib.rs
// Nifti2Dicom-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: the conversion pipeline, its stages and the CLI glue.
pub mod batch;
pub mod cli;
pub mod convert;
pub mod dicom_access;
pub mod dictionary;
pub mod error;
pub mod filter;
pub mod header;
pub mod models;
pub mod nifti_input;
pub mod orientation;
pub mod pixel;
pub mod series;
pub mod uid;
pub mod volume;

pub use cli::{run as run_cli, Cli, Commands};
pub use convert::{convert_file, ConvertOptions};
pub use error::{ConvertError, Result};
