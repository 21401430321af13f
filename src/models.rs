//
// models.rs
// Nifti2Dicom-rs
//
// Defines serializable data structures for volume summaries and conversion reports.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Header-level description of a NIfTI volume, shown by `info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub path: String,
    pub datatype: i16,
    pub pixel_type: Option<String>,
    pub dimensions: Vec<usize>,
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub direction: [[f64; 3]; 3],
    pub orientation: Option<String>,
    pub sform_code: i16,
    pub qform_code: i16,
    pub scl_slope: f32,
    pub scl_inter: f32,
}

/// Outcome of writing one DICOM series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesReport {
    pub output_directory: PathBuf,
    pub files: Vec<PathBuf>,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub rows: u16,
    pub columns: u16,
    pub rescaled: bool,
}

impl SeriesReport {
    pub fn slices(&self) -> usize {
        self.files.len()
    }
}

/// Per-run totals for `batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: usize,
}
