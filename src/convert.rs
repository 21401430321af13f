//
// convert.rs
// Nifti2Dicom-rs
//
// Drives a single conversion: read NIfTI, build the metadata dictionary, filter, write the series.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::dictionary::MetaDataDictionary;
use crate::error::ConvertError;
use crate::filter::{FilterArgs, InputFilter};
use crate::header::{DicomHeaderArgs, HeaderImporter};
use crate::models::SeriesReport;
use crate::nifti_input;
use crate::series::{OutputArgs, SeriesWriter};
use crate::uid::{UidArgs, UidGenerator};

/// Everything a conversion needs besides the input path.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub filter: FilterArgs,
    pub output: OutputArgs,
    pub uids: UidArgs,
    pub header: DicomHeaderArgs,
}

impl ConvertOptions {
    pub fn new(output: OutputArgs) -> Self {
        Self {
            filter: FilterArgs::default(),
            output,
            uids: UidArgs::default(),
            header: DicomHeaderArgs::default(),
        }
    }
}

pub fn convert_file(input: &Path, options: &ConvertOptions) -> Result<SeriesReport> {
    info!(input = %input.display(), "converting");
    let image = nifti_input::read_nifti(input)?;

    let mut dict = MetaDataDictionary::new();
    HeaderImporter::new(&options.header, &mut dict)
        .import()
        .context("Failed to build the DICOM header")?;
    UidGenerator::new(&options.uids, &mut dict)
        .generate()
        .context("Failed to assign UIDs")?;

    let mut filter = InputFilter::new(&options.filter, &image, &mut dict);
    filter
        .filter()
        .with_context(|| format!("Filtering {:?} failed", input))?;
    let filtered = filter.into_filtered().ok_or(ConvertError::NoFilteredImage)?;

    let report = SeriesWriter::new(&options.output, &dict).write(&filtered, options.filter.rescale)?;
    info!(
        slices = report.slices(),
        series = %report.series_instance_uid,
        "conversion finished"
    );
    Ok(report)
}
