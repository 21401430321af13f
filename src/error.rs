//
// error.rs
// Nifti2Dicom-rs
//
// Error taxonomy shared by the filter pipeline, the header importer and the UID generator.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;

use thiserror::Error;

use crate::pixel::PixelType;

/// Pipeline stage that raised a [`ConvertError::Stage`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    Orient,
    Rescale,
    Cast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Orient => "Orienting",
            Stage::Rescale => "Rescaling",
            Stage::Cast => "Casting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported pixel type (NIfTI datatype code {0})")]
    UnsupportedPixelType(i16),

    #[error("input image has no volume data")]
    MissingInput,

    #[error("input volume holds {found} samples but its pixel type tag says {expected}")]
    PixelTypeMismatch {
        expected: PixelType,
        found: PixelType,
    },

    #[error("invalid orientation code {0:?}")]
    InvalidOrientation(String),

    #[error("{stage} failed at {location}: {description}")]
    Stage {
        stage: Stage,
        location: &'static str,
        description: String,
    },

    #[error("filter produced no output image")]
    NoFilteredImage,

    #[error("only 3-D volumes are supported, got dimensions {0:?}")]
    UnsupportedDimensions(Vec<usize>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ConvertError {
    pub(crate) fn stage(stage: Stage, location: &'static str, description: impl Into<String>) -> Self {
        ConvertError::Stage {
            stage,
            location,
            description: description.into(),
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
