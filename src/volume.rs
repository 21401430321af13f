//
// volume.rs
// Nifti2Dicom-rs
//
// In-memory 3-D volumes with their patient-space geometry, plus the type-erased input image.
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::Array3;

use crate::pixel::{PixelType, Sample};

/// Spatial placement of a volume in LPS patient coordinates (millimetres).
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    /// Row-major direction cosines; column `c` is the physical direction of index axis `c`.
    pub direction: [[f64; 3]; 3],
}

impl Geometry {
    pub fn identity(spacing: [f64; 3]) -> Self {
        Self {
            spacing,
            origin: [0.0; 3],
            direction: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn axis_direction(&self, axis: usize) -> [f64; 3] {
        [
            self.direction[0][axis],
            self.direction[1][axis],
            self.direction[2][axis],
        ]
    }

    /// Physical position of the centre of voxel `index`.
    pub fn index_to_physical(&self, index: [usize; 3]) -> [f64; 3] {
        let mut point = self.origin;
        for axis in 0..3 {
            let step = self.spacing[axis] * index[axis] as f64;
            let dir = self.axis_direction(axis);
            for (row, value) in point.iter_mut().enumerate() {
                *value += dir[row] * step;
            }
        }
        point
    }

    /// Unit normal of the k-slices (cross product of the i and j directions).
    pub fn slice_normal(&self) -> [f64; 3] {
        let a = self.axis_direction(0);
        let b = self.axis_direction(1);
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }
}

/// A typed volume indexed `[i, j, k]`.
#[derive(Debug, Clone)]
pub struct Volume<T> {
    pub data: Array3<T>,
    pub geometry: Geometry,
}

impl<T> Volume<T> {
    pub fn new(data: Array3<T>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    pub fn dims(&self) -> [usize; 3] {
        let (ni, nj, nk) = self.data.dim();
        [ni, nj, nk]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A volume whose sample type is only known at runtime.
#[derive(Debug, Clone)]
pub enum AnyVolume {
    U8(Volume<u8>),
    I8(Volume<i8>),
    U16(Volume<u16>),
    I16(Volume<i16>),
    U32(Volume<u32>),
    I32(Volume<i32>),
    U64(Volume<u64>),
    I64(Volume<i64>),
    F32(Volume<f32>),
    F64(Volume<f64>),
}

macro_rules! with_volume {
    ($any:expr, $v:ident => $body:expr) => {
        match $any {
            AnyVolume::U8($v) => $body,
            AnyVolume::I8($v) => $body,
            AnyVolume::U16($v) => $body,
            AnyVolume::I16($v) => $body,
            AnyVolume::U32($v) => $body,
            AnyVolume::I32($v) => $body,
            AnyVolume::U64($v) => $body,
            AnyVolume::I64($v) => $body,
            AnyVolume::F32($v) => $body,
            AnyVolume::F64($v) => $body,
        }
    };
}

impl AnyVolume {
    pub fn from_typed<T: Sample>(volume: Volume<T>) -> Self {
        T::into_any(volume)
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            AnyVolume::U8(_) => PixelType::U8,
            AnyVolume::I8(_) => PixelType::I8,
            AnyVolume::U16(_) => PixelType::U16,
            AnyVolume::I16(_) => PixelType::I16,
            AnyVolume::U32(_) => PixelType::U32,
            AnyVolume::I32(_) => PixelType::I32,
            AnyVolume::U64(_) => PixelType::U64,
            AnyVolume::I64(_) => PixelType::I64,
            AnyVolume::F32(_) => PixelType::F32,
            AnyVolume::F64(_) => PixelType::F64,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        with_volume!(self, v => v.dims())
    }

    pub fn geometry(&self) -> &Geometry {
        with_volume!(self, v => &v.geometry)
    }
}

/// Image handed to the filter: the declared pixel-type tag and, when it could be loaded, the voxels.
#[derive(Debug, Clone)]
pub struct InputImage {
    datatype: i16,
    volume: Option<AnyVolume>,
}

impl InputImage {
    pub fn new(volume: AnyVolume) -> Self {
        Self {
            datatype: volume.pixel_type().nifti_code(),
            volume: Some(volume),
        }
    }

    /// Build an image whose tag is not derived from the volume (as read from a file header).
    pub fn from_parts(datatype: i16, volume: Option<AnyVolume>) -> Self {
        Self { datatype, volume }
    }

    pub fn datatype(&self) -> i16 {
        self.datatype
    }

    pub fn volume(&self) -> Option<&AnyVolume> {
        self.volume.as_ref()
    }
}
