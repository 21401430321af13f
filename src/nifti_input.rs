//
// nifti_input.rs
// Nifti2Dicom-rs
//
// Loads NIfTI-1 volumes (.nii / .nii.gz) into typed in-memory volumes with LPS geometry.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array3, ArrayD, Ix3, IxDyn};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::models::VolumeSummary;
use crate::orientation::OrientationCode;
use crate::pixel::PixelType;
use crate::volume::{AnyVolume, Geometry, InputImage, Volume};

/// Read a NIfTI file, keeping the declared datatype as the image's pixel-type tag.
///
/// Voxels are loaded in their native type with `scl_slope`/`scl_inter` applied by the reader.
/// Unsupported datatypes yield an image without volume data so the filter can reject the tag.
pub fn read_nifti(path: &Path) -> Result<InputImage> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {:?}", path))?;

    let header = obj.header().clone();
    let datatype = header.datatype;
    let geometry = geometry_from_header(&header);
    debug!(datatype, dims = ?header.dim, ?geometry, "NIfTI header loaded");

    let pixel_type = match PixelType::from_nifti_code(datatype) {
        Ok(pixel_type) => pixel_type,
        Err(err) => {
            warn!("{}: {}", path.display(), err);
            return Ok(InputImage::from_parts(datatype, None));
        }
    };

    let volume = obj.into_volume();
    macro_rules! load {
        ($ty:ty) => {{
            let array = volume
                .into_ndarray::<$ty>()
                .context("Failed to decode NIfTI voxels")?;
            AnyVolume::from_typed(Volume::new(to_array3(array)?, geometry))
        }};
    }

    let any = match pixel_type {
        PixelType::U8 => load!(u8),
        PixelType::I8 => load!(i8),
        PixelType::U16 => load!(u16),
        PixelType::I16 => load!(i16),
        PixelType::U32 => load!(u32),
        PixelType::I32 => load!(i32),
        PixelType::U64 => load!(u64),
        PixelType::I64 => load!(i64),
        PixelType::F32 => load!(f32),
        PixelType::F64 => load!(f64),
    };

    Ok(InputImage::from_parts(datatype, Some(any)))
}

/// Header-only summary used by `info`.
pub fn summarize(path: &Path) -> Result<VolumeSummary> {
    let header = NiftiHeader::from_file(path)
        .with_context(|| format!("Failed to read NIfTI header {:?}", path))?;
    let geometry = geometry_from_header(&header);
    let ndim = usize::from(header.dim[0]).clamp(1, 7);
    let dimensions = header.dim[1..=ndim].iter().map(|d| usize::from(*d)).collect();

    Ok(VolumeSummary {
        path: path.display().to_string(),
        datatype: header.datatype,
        pixel_type: PixelType::from_nifti_code(header.datatype)
            .ok()
            .map(|p| p.to_string()),
        dimensions,
        spacing: geometry.spacing,
        origin: geometry.origin,
        direction: geometry.direction,
        orientation: OrientationCode::from_direction(&geometry.direction)
            .ok()
            .map(|c| c.to_string()),
        sform_code: header.sform_code,
        qform_code: header.qform_code,
        scl_slope: header.scl_slope,
        scl_inter: header.scl_inter,
    })
}

fn to_array3<T: Clone>(array: ArrayD<T>) -> Result<Array3<T>> {
    let shape = array.shape().to_vec();
    if shape.len() < 2 || shape.iter().skip(3).any(|d| *d != 1) {
        return Err(ConvertError::UnsupportedDimensions(shape).into());
    }
    if shape.len() == 3 {
        return Ok(array.into_dimensionality::<Ix3>()?);
    }

    // 2-D images become a single slice, trailing singleton dimensions are dropped.
    let ndim = shape.len();
    let extent = (shape[0], shape[1], shape.get(2).copied().unwrap_or(1));
    Ok(Array3::from_shape_fn(extent, |(i, j, k)| {
        let mut index = vec![0usize; ndim];
        index[0] = i;
        index[1] = j;
        if ndim > 2 {
            index[2] = k;
        }
        array[IxDyn(&index)].clone()
    }))
}

/// Voxel-to-world transform as three RAS rows, picked sform first, then qform, then pixdim.
fn affine_rows(header: &NiftiHeader) -> [[f64; 4]; 3] {
    let widen = |row: [f32; 4]| row.map(f64::from);

    if header.sform_code > 0 {
        return [
            widen(header.srow_x),
            widen(header.srow_y),
            widen(header.srow_z),
        ];
    }

    let dx = f64::from(header.pixdim[1]).abs();
    let dy = f64::from(header.pixdim[2]).abs();
    let dz = f64::from(header.pixdim[3]).abs();

    if header.qform_code > 0 {
        let b = f64::from(header.quatern_b);
        let c = f64::from(header.quatern_c);
        let d = f64::from(header.quatern_d);
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let dz = dz * qfac;

        return [
            [
                (a * a + b * b - c * c - d * d) * dx,
                (2.0 * b * c - 2.0 * a * d) * dy,
                (2.0 * b * d + 2.0 * a * c) * dz,
                f64::from(header.quatern_x),
            ],
            [
                (2.0 * b * c + 2.0 * a * d) * dx,
                (a * a + c * c - b * b - d * d) * dy,
                (2.0 * c * d - 2.0 * a * b) * dz,
                f64::from(header.quatern_y),
            ],
            [
                (2.0 * b * d - 2.0 * a * c) * dx,
                (2.0 * c * d + 2.0 * a * b) * dy,
                (a * a + d * d - c * c - b * b) * dz,
                f64::from(header.quatern_z),
            ],
        ];
    }

    [
        [dx, 0.0, 0.0, 0.0],
        [0.0, dy, 0.0, 0.0],
        [0.0, 0.0, dz, 0.0],
    ]
}

/// Split the NIfTI affine into spacing, origin and direction, converting RAS to LPS.
pub fn geometry_from_header(header: &NiftiHeader) -> Geometry {
    let mut rows = affine_rows(header);
    for row in rows.iter_mut().take(2) {
        for value in row.iter_mut() {
            *value = -*value;
        }
    }

    let mut geometry = Geometry::identity([1.0; 3]);
    for col in 0..3 {
        let norm = (0..3).map(|r| rows[r][col] * rows[r][col]).sum::<f64>().sqrt();
        if norm > 1e-9 {
            geometry.spacing[col] = norm;
            for (row, values) in rows.iter().enumerate() {
                geometry.direction[row][col] = values[col] / norm;
            }
        } else {
            warn!(axis = col, "zero-length voxel axis, assuming unit spacing");
        }
    }
    for (row, values) in rows.iter().enumerate() {
        geometry.origin[row] = values[3];
    }
    geometry
}
