//
// series.rs
// Nifti2Dicom-rs
//
// Writes a filtered volume as a series of single-frame DICOM files, one per k-slice, stamping the
// metadata dictionary and the per-slice geometry onto every instance.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use tracing::{debug, info, warn};

use crate::dictionary::{keys, parse_tag_key, vr_for, MetaDataDictionary};
use crate::filter::RESCALE_OUTPUT_MAX;
use crate::models::SeriesReport;
use crate::uid;
use crate::volume::Volume;

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
const SECONDARY_CAPTURE_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.7";

/// Where and how the slice files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArgs {
    pub directory: PathBuf,
    pub prefix: String,
    pub digits: usize,
    pub suffix: String,
    /// Allow writing into a directory that already has files in it.
    pub force: bool,
}

impl OutputArgs {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: "IMG".to_string(),
            digits: 4,
            suffix: "dcm".to_string(),
            force: false,
        }
    }

    pub fn file_name(&self, index: usize) -> String {
        let mut name = format!("{}{:0width$}", self.prefix, index, width = self.digits);
        if !self.suffix.is_empty() {
            name.push('.');
            name.push_str(&self.suffix);
        }
        name
    }
}

pub fn sop_class_for_modality(modality: &str) -> &'static str {
    match modality {
        "CT" => CT_IMAGE_STORAGE,
        "MR" => MR_IMAGE_STORAGE,
        _ => SECONDARY_CAPTURE_IMAGE_STORAGE,
    }
}

pub struct SeriesWriter<'a> {
    args: &'a OutputArgs,
    dict: &'a MetaDataDictionary,
}

impl<'a> SeriesWriter<'a> {
    pub fn new(args: &'a OutputArgs, dict: &'a MetaDataDictionary) -> Self {
        Self { args, dict }
    }

    pub fn write(&self, volume: &Volume<i16>, rescaled: bool) -> Result<SeriesReport> {
        self.prepare_directory()?;

        let study_uid = self
            .dict
            .get(keys::STUDY_INSTANCE_UID)
            .context("Study Instance UID missing from the metadata dictionary")?;
        let series_uid = self
            .dict
            .get(keys::SERIES_INSTANCE_UID)
            .context("Series Instance UID missing from the metadata dictionary")?;
        let modality = self.dict.get(keys::MODALITY).unwrap_or("OT");
        let sop_class_uid = sop_class_for_modality(modality);

        let [ni, nj, nk] = volume.dims();
        let (Ok(rows), Ok(columns)) = (u16::try_from(nj), u16::try_from(ni)) else {
            bail!("Slice of {}x{} voxels does not fit the DICOM Rows/Columns range", ni, nj);
        };
        let window = window_for(volume, rescaled);
        let geometry = &volume.geometry;
        let normal = geometry.slice_normal();
        let orientation = [geometry.axis_direction(0), geometry.axis_direction(1)]
            .iter()
            .flatten()
            .map(|v| format_ds(*v))
            .collect::<Vec<_>>()
            .join("\\");

        info!(
            slices = nk,
            rows,
            columns,
            sop_class_uid,
            directory = %self.args.directory.display(),
            "writing DICOM series"
        );

        let mut files = Vec::with_capacity(nk);
        for k in 0..nk {
            let number = k + 1;
            let sop_instance_uid = uid::instance_uid(series_uid, number);
            let position = geometry.index_to_physical([0, 0, k]);
            let location: f64 = position.iter().zip(normal.iter()).map(|(p, n)| p * n).sum();

            let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
            self.put_dictionary(&mut obj);

            put_str(&mut obj, Tag(0x0008, 0x0008), VR::CS, "DERIVED\\SECONDARY"); // Image Type
            put_str(&mut obj, Tag(0x0008, 0x0016), VR::UI, sop_class_uid);
            put_str(&mut obj, Tag(0x0008, 0x0018), VR::UI, &sop_instance_uid);
            if sop_class_uid == SECONDARY_CAPTURE_IMAGE_STORAGE {
                put_str(&mut obj, Tag(0x0008, 0x0064), VR::CS, "WSD"); // Conversion Type
            }
            put_str(&mut obj, Tag(0x0018, 0x0050), VR::DS, &format_ds(geometry.spacing[2])); // Slice Thickness
            put_str(&mut obj, Tag(0x0020, 0x0013), VR::IS, &number.to_string()); // Instance Number
            put_str(&mut obj, Tag(0x0020, 0x0032), VR::DS, &format_triplet(position)); // Image Position (Patient)
            put_str(&mut obj, Tag(0x0020, 0x0037), VR::DS, &orientation); // Image Orientation (Patient)
            put_str(&mut obj, Tag(0x0020, 0x1041), VR::DS, &format_ds(location)); // Slice Location

            put_u16(&mut obj, Tag(0x0028, 0x0002), 1); // Samples per Pixel
            put_str(&mut obj, Tag(0x0028, 0x0004), VR::CS, "MONOCHROME2");
            put_u16(&mut obj, Tag(0x0028, 0x0010), rows);
            put_u16(&mut obj, Tag(0x0028, 0x0011), columns);
            put_str(
                &mut obj,
                Tag(0x0028, 0x0030),
                VR::DS,
                &format!("{}\\{}", format_ds(geometry.spacing[1]), format_ds(geometry.spacing[0])),
            ); // Pixel Spacing (row\column)
            put_u16(&mut obj, Tag(0x0028, 0x0100), 16); // Bits Allocated
            if rescaled {
                put_u16(&mut obj, Tag(0x0028, 0x0101), 12); // Bits Stored
                put_u16(&mut obj, Tag(0x0028, 0x0102), 11); // High Bit
                put_u16(&mut obj, Tag(0x0028, 0x0103), 0); // Pixel Representation
            } else {
                put_u16(&mut obj, Tag(0x0028, 0x0101), 16);
                put_u16(&mut obj, Tag(0x0028, 0x0102), 15);
                put_u16(&mut obj, Tag(0x0028, 0x0103), 1);
            }
            put_str(&mut obj, Tag(0x0028, 0x1050), VR::DS, &format_ds(window.0)); // Window Center
            put_str(&mut obj, Tag(0x0028, 0x1051), VR::DS, &format_ds(window.1)); // Window Width
            put_str(&mut obj, Tag(0x0028, 0x1052), VR::DS, "0"); // Rescale Intercept
            put_str(&mut obj, Tag(0x0028, 0x1053), VR::DS, "1"); // Rescale Slope

            let mut pixel_bytes = Vec::with_capacity(ni * nj * 2);
            for j in 0..nj {
                for i in 0..ni {
                    pixel_bytes.extend_from_slice(&volume.data[[i, j, k]].to_le_bytes());
                }
            }
            obj.put(DataElement::new(
                Tag(0x7FE0, 0x0010),
                VR::OW,
                PrimitiveValue::from(pixel_bytes),
            ));

            let path = self.args.directory.join(self.args.file_name(k));
            write_instance(obj, sop_class_uid, &sop_instance_uid, &path)?;
            debug!(slice = k, path = %path.display(), "slice written");
            files.push(path);
        }

        Ok(SeriesReport {
            output_directory: self.args.directory.clone(),
            files,
            study_instance_uid: study_uid.to_string(),
            series_instance_uid: series_uid.to_string(),
            rows,
            columns,
            rescaled,
        })
    }

    fn prepare_directory(&self) -> Result<()> {
        let dir = &self.args.directory;
        fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;
        let occupied = fs::read_dir(dir)
            .with_context(|| format!("Failed to list output directory {:?}", dir))?
            .next()
            .is_some();
        if occupied && !self.args.force {
            bail!("Output directory {:?} is not empty (use --force to write anyway)", dir);
        }
        Ok(())
    }

    fn put_dictionary(&self, obj: &mut InMemDicomObject<StandardDataDictionary>) {
        for (key, value) in self.dict.iter() {
            match parse_tag_key(key) {
                Some(tag) => put_str(obj, tag, vr_for(tag), value),
                None => warn!(key, "skipping dictionary entry with a malformed tag key"),
            }
        }
    }
}

fn write_instance(
    obj: InMemDicomObject<StandardDataDictionary>,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    path: &Path,
) -> Result<()> {
    let file_meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid(sop_class_uid)
        .media_storage_sop_instance_uid(sop_instance_uid)
        .build()?;

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, file_meta);
    for elem in obj {
        file_obj.put(elem);
    }

    file_obj
        .write_to_file(path)
        .with_context(|| format!("Failed to write DICOM file {:?}", path))?;
    Ok(())
}

fn put_str(obj: &mut InMemDicomObject<StandardDataDictionary>, tag: Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn put_u16(obj: &mut InMemDicomObject<StandardDataDictionary>, tag: Tag, value: u16) {
    obj.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
}

/// Window (center, width) covering the stored value range.
fn window_for(volume: &Volume<i16>, rescaled: bool) -> (f64, f64) {
    if rescaled {
        let top = f64::from(RESCALE_OUTPUT_MAX);
        return ((top + 1.0) / 2.0, top + 1.0);
    }
    let (min, max) = volume
        .data
        .iter()
        .fold((i16::MAX, i16::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if min > max {
        return (0.0, 1.0);
    }
    let (min, max) = (f64::from(min), f64::from(max));
    ((min + max) / 2.0, (max - min).max(1.0))
}

fn format_triplet(values: [f64; 3]) -> String {
    values.iter().map(|v| format_ds(*v)).collect::<Vec<_>>().join("\\")
}

/// Render a decimal string that fits the 16-character DS limit.
pub fn format_ds(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    for precision in (0..=6).rev() {
        let text = format!("{:.*}", precision, value);
        let text = if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        };
        let text = if text == "-0" { "0".to_string() } else { text };
        if text.len() <= 16 {
            return text;
        }
    }
    format!("{:.6e}", value)
}
