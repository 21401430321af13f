//
// filter.rs
// Nifti2Dicom-rs
//
// Input filter: dispatches on the runtime pixel type and runs the orient -> rescale/cast chain that
// turns the loaded volume into the 16-bit representation written to DICOM.
//
// Thales Matheus Mendonça Santos - November 2025

use std::borrow::Cow;

use ndarray::Array3;
use tracing::{debug, error, info, warn};

use crate::dictionary::{keys, MetaDataDictionary};
use crate::error::{ConvertError, Result, Stage};
use crate::orientation::{self, Orientation};
use crate::pixel::{PixelType, Sample};
use crate::volume::{InputImage, Volume};

/// Lower bound of the rescaled intensity range.
pub const RESCALE_OUTPUT_MIN: i16 = 0;
/// Upper bound of the rescaled intensity range (12 bits stored).
pub const RESCALE_OUTPUT_MAX: i16 = (1 << 11) - 1;

/// Options forwarded from the command line into the filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterArgs {
    pub rescale: bool,
    /// One of the 48 orientation codes, or `NONE` to keep the input orientation.
    pub reorient: String,
}

impl Default for FilterArgs {
    fn default() -> Self {
        Self {
            rescale: false,
            reorient: "RAI".to_string(),
        }
    }
}

pub struct InputFilter<'a> {
    args: &'a FilterArgs,
    input: &'a InputImage,
    dict: &'a mut MetaDataDictionary,
    filtered: Option<Volume<i16>>,
}

impl<'a> InputFilter<'a> {
    pub fn new(args: &'a FilterArgs, input: &'a InputImage, dict: &'a mut MetaDataDictionary) -> Self {
        Self {
            args,
            input,
            dict,
            filtered: None,
        }
    }

    /// Run the filter chain for the input's pixel type.
    ///
    /// A failing rescale is logged and still returns `Ok(())`, leaving no filtered image behind.
    pub fn filter(&mut self) -> Result<()> {
        if let Some(volume) = self.input.volume() {
            debug!(direction = ?volume.geometry().direction, "input directions");
        }

        let pixel_type = PixelType::from_nifti_code(self.input.datatype()).map_err(|err| {
            error!("{}", err);
            err
        })?;
        info!(%pixel_type, "dispatching filter chain");

        let result = match pixel_type {
            PixelType::U8 => self.create_filter::<u8>(),
            PixelType::I8 => self.create_filter::<i8>(),
            PixelType::U16 => self.create_filter::<u16>(),
            PixelType::I16 => self.create_filter::<i16>(),
            PixelType::U32 => self.create_filter::<u32>(),
            PixelType::I32 => self.create_filter::<i32>(),
            PixelType::U64 => self.create_filter::<u64>(),
            PixelType::I64 => self.create_filter::<i64>(),
            PixelType::F32 => self.create_filter::<f32>(),
            PixelType::F64 => self.create_filter::<f64>(),
        };

        if let Some(filtered) = &self.filtered {
            debug!(direction = ?filtered.geometry.direction, "filtered directions");
        }
        result
    }

    pub fn into_filtered(self) -> Option<Volume<i16>> {
        self.filtered
    }

    fn create_filter<T: Sample>(&mut self) -> Result<()> {
        let input = self.input;
        let volume = typed_input::<T>(input).map_err(|err| {
            error!("{}", err);
            err
        })?;
        let orientation = Orientation::parse(&self.args.reorient).map_err(|err| {
            error!("{}", err);
            err
        })?;

        let oriented: Cow<'_, Volume<T>> = match orientation {
            Orientation::Keep => {
                debug!("reorientation disabled, keeping input axes");
                Cow::Borrowed(volume)
            }
            Orientation::Code(code) => {
                let oriented = run_stage(Stage::Orient, || orientation::reorient(volume, code))?;
                self.dict.set(
                    keys::PATIENT_ORIENTATION,
                    orientation::patient_orientation(&oriented.geometry),
                );
                Cow::Owned(oriented)
            }
        };

        if self.args.rescale {
            match run_stage(Stage::Rescale, || rescale(&oriented)) {
                Ok(rescaled) => self.filtered = Some(rescaled),
                Err(_) => return Ok(()),
            }
        } else {
            self.filtered = Some(run_stage(Stage::Cast, || cast(&oriented))?);
        }

        Ok(())
    }
}

fn typed_input<T: Sample>(input: &InputImage) -> Result<&Volume<T>> {
    let any = input.volume().ok_or(ConvertError::MissingInput)?;
    T::from_any(any).ok_or(ConvertError::PixelTypeMismatch {
        expected: T::PIXEL_TYPE,
        found: any.pixel_type(),
    })
}

fn run_stage<V>(stage: Stage, body: impl FnOnce() -> Result<V>) -> Result<V> {
    info!(" * {}... ", stage);
    match body() {
        Ok(value) => {
            info!(" * {}... DONE", stage);
            Ok(value)
        }
        Err(err) => {
            info!(" * {}... FAIL", stage);
            match &err {
                ConvertError::Stage {
                    location,
                    description,
                    ..
                } => error!("{}\n{}", location, description),
                other => error!("{}", other),
            }
            Err(err)
        }
    }
}

/// Linearly map the intensity range onto `[RESCALE_OUTPUT_MIN, RESCALE_OUTPUT_MAX]`.
///
/// The range is taken over finite samples only. NaN maps to the output minimum and infinities
/// to the matching end of the range.
pub fn rescale<T: Sample>(volume: &Volume<T>) -> Result<Volume<i16>> {
    if volume.is_empty() {
        return Err(ConvertError::stage(Stage::Rescale, "filter::rescale", "volume has no voxels"));
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut non_finite = 0usize;
    for value in volume.data.iter().map(|s| s.to_f64()) {
        if value.is_finite() {
            min = min.min(value);
            max = max.max(value);
        } else {
            non_finite += 1;
        }
    }
    if non_finite > 0 {
        warn!(non_finite, "non-finite samples excluded from the intensity range");
    }
    if min > max {
        // Nothing finite to measure; every voxel lands on an end of the range.
        min = 0.0;
        max = 0.0;
    }

    let out_min = f64::from(RESCALE_OUTPUT_MIN);
    let out_max = f64::from(RESCALE_OUTPUT_MAX);
    let scale = if max > min {
        (out_max - out_min) / (max - min)
    } else {
        0.0
    };
    debug!(min, max, scale, "rescale parameters");

    let data = volume.data.mapv(|v| {
        let value = v.to_f64();
        let mapped = if value.is_nan() {
            out_min
        } else if value.is_infinite() {
            if value > 0.0 {
                out_max
            } else {
                out_min
            }
        } else {
            ((value - min) * scale + out_min).round().clamp(out_min, out_max)
        };
        mapped as i16
    });
    Ok(Volume::new(data, volume.geometry.clone()))
}

/// Convert every sample to `i16`, saturating values outside its range.
///
/// NaN becomes 0 and infinities saturate like any other out-of-range value.
pub fn cast<T: Sample>(volume: &Volume<T>) -> Result<Volume<i16>> {
    if volume.is_empty() {
        return Err(ConvertError::stage(Stage::Cast, "filter::cast", "volume has no voxels"));
    }

    let lower = f64::from(i16::MIN);
    let upper = f64::from(i16::MAX);
    let mut saturated = 0usize;
    let mut nan = 0usize;
    let mut data = Array3::<i16>::zeros(volume.data.raw_dim());
    for (dst, src) in data.iter_mut().zip(volume.data.iter()) {
        let value = src.to_f64();
        if value.is_nan() {
            nan += 1;
            *dst = 0;
            continue;
        }
        if value < lower || value > upper {
            saturated += 1;
        }
        *dst = value.clamp(lower, upper) as i16;
    }

    let pixel_type = T::PIXEL_TYPE;
    if saturated > 0 {
        warn!(saturated, %pixel_type, "samples clipped to the short range");
    }
    if nan > 0 {
        warn!(nan, %pixel_type, "NaN samples written as 0");
    }
    Ok(Volume::new(data, volume.geometry.clone()))
}
