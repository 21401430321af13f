//
// pixel.rs
// Nifti2Dicom-rs
//
// Runtime pixel-type tags and the sample trait that ties each tag to its primitive type.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;

use serde::Serialize;

use crate::error::{ConvertError, Result};
use crate::volume::{AnyVolume, Volume};

/// Storage type of the input samples, as declared by the NIfTI `datatype` field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl PixelType {
    pub const ALL: [PixelType; 10] = [
        PixelType::U8,
        PixelType::I8,
        PixelType::U16,
        PixelType::I16,
        PixelType::U32,
        PixelType::I32,
        PixelType::U64,
        PixelType::I64,
        PixelType::F32,
        PixelType::F64,
    ];

    /// Map a NIfTI-1 datatype code to a supported pixel type.
    ///
    /// Binary, complex, RGB and 128-bit float codes are rejected along with unknown values.
    pub fn from_nifti_code(code: i16) -> Result<Self> {
        let pixel_type = match code {
            2 => PixelType::U8,
            256 => PixelType::I8,
            512 => PixelType::U16,
            4 => PixelType::I16,
            768 => PixelType::U32,
            8 => PixelType::I32,
            1280 => PixelType::U64,
            1024 => PixelType::I64,
            16 => PixelType::F32,
            64 => PixelType::F64,
            other => return Err(ConvertError::UnsupportedPixelType(other)),
        };
        Ok(pixel_type)
    }

    pub fn nifti_code(self) -> i16 {
        match self {
            PixelType::U8 => 2,
            PixelType::I8 => 256,
            PixelType::U16 => 512,
            PixelType::I16 => 4,
            PixelType::U32 => 768,
            PixelType::I32 => 8,
            PixelType::U64 => 1280,
            PixelType::I64 => 1024,
            PixelType::F32 => 16,
            PixelType::F64 => 64,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelType::U8 => "unsigned char",
            PixelType::I8 => "char",
            PixelType::U16 => "unsigned short",
            PixelType::I16 => "short",
            PixelType::U32 => "unsigned int",
            PixelType::I32 => "int",
            PixelType::U64 => "unsigned long",
            PixelType::I64 => "long",
            PixelType::F32 => "float",
            PixelType::F64 => "double",
        };
        f.write_str(name)
    }
}

/// A primitive sample type the filter chain can be instantiated for.
pub trait Sample: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const PIXEL_TYPE: PixelType;

    fn to_f64(self) -> f64;

    /// Recover the typed volume behind a type-erased one, if the variant matches.
    fn from_any(volume: &AnyVolume) -> Option<&Volume<Self>>;

    fn into_any(volume: Volume<Self>) -> AnyVolume;
}

macro_rules! impl_sample {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Sample for $ty {
                const PIXEL_TYPE: PixelType = PixelType::$variant;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_any(volume: &AnyVolume) -> Option<&Volume<Self>> {
                    match volume {
                        AnyVolume::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn into_any(volume: Volume<Self>) -> AnyVolume {
                    AnyVolume::$variant(volume)
                }
            }
        )*
    };
}

impl_sample! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}
