//
// dictionary.rs
// Nifti2Dicom-rs
//
// String-keyed metadata dictionary ("gggg|eeee" -> value) shared by the filter, the header importer,
// the UID generator and the series writer.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;

use dicom::core::dictionary::DataDictionary;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;

pub mod keys {
    pub const PATIENT_NAME: &str = "0010|0010";
    pub const PATIENT_ID: &str = "0010|0020";
    pub const PATIENT_BIRTH_DATE: &str = "0010|0030";
    pub const PATIENT_SEX: &str = "0010|0040";
    pub const PATIENT_AGE: &str = "0010|1010";
    pub const STUDY_DATE: &str = "0008|0020";
    pub const SERIES_DATE: &str = "0008|0021";
    pub const STUDY_TIME: &str = "0008|0030";
    pub const SERIES_TIME: &str = "0008|0031";
    pub const ACCESSION_NUMBER: &str = "0008|0050";
    pub const MODALITY: &str = "0008|0060";
    pub const MANUFACTURER: &str = "0008|0070";
    pub const INSTITUTION_NAME: &str = "0008|0080";
    pub const REFERRING_PHYSICIAN: &str = "0008|0090";
    pub const STUDY_DESCRIPTION: &str = "0008|1030";
    pub const SERIES_DESCRIPTION: &str = "0008|103e";
    pub const PROTOCOL_NAME: &str = "0018|1030";
    pub const STUDY_INSTANCE_UID: &str = "0020|000d";
    pub const SERIES_INSTANCE_UID: &str = "0020|000e";
    pub const STUDY_ID: &str = "0020|0010";
    pub const SERIES_NUMBER: &str = "0020|0011";
    pub const PATIENT_ORIENTATION: &str = "0020|0020";
    pub const FRAME_OF_REFERENCE_UID: &str = "0020|0052";
}

/// Metadata recorded during conversion and stamped onto every slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaDataDictionary {
    entries: BTreeMap<String, String>,
}

impl MetaDataDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub fn parse_tag_key(key: &str) -> Option<Tag> {
    let (group, element) = key.split_once('|')?;
    if group.len() != 4 || element.len() != 4 {
        return None;
    }
    let group = u16::from_str_radix(group, 16).ok()?;
    let element = u16::from_str_radix(element, 16).ok()?;
    Some(Tag(group, element))
}

/// VR used when encoding a dictionary entry, taken from the standard data dictionary.
///
/// Tags the dictionary does not know (private or retired-and-dropped) are written as LO.
pub fn vr_for(tag: Tag) -> VR {
    StandardDataDictionary
        .by_tag(tag)
        .map(|entry| entry.vr.relaxed())
        .unwrap_or(VR::LO)
}
