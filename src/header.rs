//
// header.rs
// Nifti2Dicom-rs
//
// Collects the patient/study/series attributes of the output series from a reference DICOM file,
// explicit command-line values and defaults, then validates them.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use dicom::object::open_file;
use tracing::{debug, info};

use crate::dicom_access::copy_tags;
use crate::dictionary::{keys, MetaDataDictionary};
use crate::error::ConvertError;

/// Attributes copied from a reference file.
const REFERENCE_KEYS: &[&str] = &[
    keys::PATIENT_NAME,
    keys::PATIENT_ID,
    keys::PATIENT_BIRTH_DATE,
    keys::PATIENT_SEX,
    keys::PATIENT_AGE,
    keys::STUDY_DATE,
    keys::STUDY_TIME,
    keys::STUDY_DESCRIPTION,
    keys::STUDY_ID,
    keys::ACCESSION_NUMBER,
    keys::REFERRING_PHYSICIAN,
    keys::INSTITUTION_NAME,
    keys::MANUFACTURER,
    keys::MODALITY,
    keys::SERIES_DESCRIPTION,
    keys::SERIES_NUMBER,
    keys::PROTOCOL_NAME,
];

const REFERENCE_UID_KEYS: &[&str] = &[keys::STUDY_INSTANCE_UID, keys::FRAME_OF_REFERENCE_UID];

#[derive(Debug, Clone, Default)]
pub struct DicomHeaderArgs {
    pub reference_file: Option<PathBuf>,
    pub use_reference_uids: bool,
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_birth_date: Option<String>,
    pub patient_sex: Option<String>,
    pub patient_age: Option<String>,
    pub study_description: Option<String>,
    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub study_id: Option<String>,
    pub accession_number: Option<String>,
    pub series_description: Option<String>,
    pub series_number: Option<String>,
    pub modality: Option<String>,
    pub institution_name: Option<String>,
    pub manufacturer: Option<String>,
    pub referring_physician: Option<String>,
    pub protocol_name: Option<String>,
}

pub struct HeaderImporter<'a> {
    args: &'a DicomHeaderArgs,
    dict: &'a mut MetaDataDictionary,
}

impl<'a> HeaderImporter<'a> {
    pub fn new(args: &'a DicomHeaderArgs, dict: &'a mut MetaDataDictionary) -> Self {
        Self { args, dict }
    }

    /// Reference file first, then explicit values, then defaults for whatever is still missing.
    pub fn import(&mut self) -> Result<()> {
        if let Some(path) = &self.args.reference_file {
            let obj = open_file(path)
                .with_context(|| format!("Failed to open reference DICOM file {:?}", path))?;
            let mut copied = copy_tags(&obj, self.dict, REFERENCE_KEYS);
            if self.args.use_reference_uids {
                copied += copy_tags(&obj, self.dict, REFERENCE_UID_KEYS);
            }
            info!(copied, reference = %path.display(), "imported reference header");
        }

        self.apply_overrides();
        self.apply_defaults();
        self.validate()?;
        Ok(())
    }

    fn apply_overrides(&mut self) {
        let args = self.args;
        let overrides = [
            (keys::PATIENT_NAME, &args.patient_name),
            (keys::PATIENT_ID, &args.patient_id),
            (keys::PATIENT_BIRTH_DATE, &args.patient_birth_date),
            (keys::PATIENT_SEX, &args.patient_sex),
            (keys::PATIENT_AGE, &args.patient_age),
            (keys::STUDY_DESCRIPTION, &args.study_description),
            (keys::STUDY_DATE, &args.study_date),
            (keys::STUDY_TIME, &args.study_time),
            (keys::STUDY_ID, &args.study_id),
            (keys::ACCESSION_NUMBER, &args.accession_number),
            (keys::SERIES_DESCRIPTION, &args.series_description),
            (keys::SERIES_NUMBER, &args.series_number),
            (keys::MODALITY, &args.modality),
            (keys::INSTITUTION_NAME, &args.institution_name),
            (keys::MANUFACTURER, &args.manufacturer),
            (keys::REFERRING_PHYSICIAN, &args.referring_physician),
            (keys::PROTOCOL_NAME, &args.protocol_name),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                debug!(key, value = value.as_str(), "header override");
                self.dict.set(key, value.trim());
            }
        }
    }

    fn apply_defaults(&mut self) {
        let now = Local::now();
        let date = now.format("%Y%m%d").to_string();
        let time = now.format("%H%M%S").to_string();

        let study_date = self.dict.get(keys::STUDY_DATE).unwrap_or(date.as_str()).to_string();
        let study_time = self.dict.get(keys::STUDY_TIME).unwrap_or(time.as_str()).to_string();
        let defaults = [
            (keys::PATIENT_NAME, "Anonymous".to_string()),
            (keys::PATIENT_ID, "ANONYMOUS".to_string()),
            (keys::MODALITY, "OT".to_string()),
            (keys::SERIES_NUMBER, "1".to_string()),
            (keys::STUDY_DATE, study_date),
            (keys::STUDY_TIME, study_time),
            (keys::SERIES_DATE, date),
            (keys::SERIES_TIME, time),
        ];
        for (key, value) in defaults {
            if !self.dict.contains(key) {
                self.dict.set(key, value);
            }
        }
    }

    fn validate(&self) -> Result<(), ConvertError> {
        for key in [keys::PATIENT_BIRTH_DATE, keys::STUDY_DATE, keys::SERIES_DATE] {
            if let Some(value) = self.dict.get(key) {
                if NaiveDate::parse_from_str(value, "%Y%m%d").is_err() {
                    return Err(invalid(key, value, "expected a YYYYMMDD date"));
                }
            }
        }
        for key in [keys::STUDY_TIME, keys::SERIES_TIME] {
            if let Some(value) = self.dict.get(key) {
                if !is_valid_time(value) {
                    return Err(invalid(key, value, "expected an HHMMSS time"));
                }
            }
        }
        if let Some(sex) = self.dict.get(keys::PATIENT_SEX) {
            if !matches!(sex, "M" | "F" | "O") {
                return Err(invalid(keys::PATIENT_SEX, sex, "expected M, F or O"));
            }
        }
        if let Some(age) = self.dict.get(keys::PATIENT_AGE) {
            if !is_valid_age(age) {
                return Err(invalid(keys::PATIENT_AGE, age, "expected nnnD, nnnW, nnnM or nnnY"));
            }
        }
        if let Some(number) = self.dict.get(keys::SERIES_NUMBER) {
            if number.parse::<i32>().is_err() {
                return Err(invalid(keys::SERIES_NUMBER, number, "expected an integer"));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> ConvertError {
    ConvertError::InvalidArgument(format!("{} = {:?}: {}", key, value, expected))
}

fn is_valid_time(value: &str) -> bool {
    let main = value.split('.').next().unwrap_or_default();
    if !matches!(main.len(), 2 | 4 | 6) || !main.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let padded = format!("{:0<6}", main);
    NaiveTime::parse_from_str(&padded, "%H%M%S").is_ok()
}

fn is_valid_age(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 4
        && bytes[..3].iter().all(|b| b.is_ascii_digit())
        && matches!(bytes[3], b'D' | b'W' | b'M' | b'Y')
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
    use dicom::dictionary_std::StandardDataDictionary;
    use dicom::object::{FileDicomObject, FileMetaTableBuilder};
    use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_missing_fields() {
        let mut dict = MetaDataDictionary::new();
        HeaderImporter::new(&DicomHeaderArgs::default(), &mut dict)
            .import()
            .expect("import");

        assert_eq!(dict.get(keys::PATIENT_NAME), Some("Anonymous"));
        assert_eq!(dict.get(keys::MODALITY), Some("OT"));
        assert_eq!(dict.get(keys::SERIES_NUMBER), Some("1"));
        assert_eq!(dict.get(keys::STUDY_DATE).map(str::len), Some(8));
        assert_eq!(dict.get(keys::SERIES_TIME).map(str::len), Some(6));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let args = DicomHeaderArgs {
            patient_name: Some("Doe^John".into()),
            modality: Some("MR".into()),
            study_date: Some("20240131".into()),
            series_number: Some("7".into()),
            ..Default::default()
        };
        let mut dict = MetaDataDictionary::new();
        HeaderImporter::new(&args, &mut dict).import().expect("import");

        assert_eq!(dict.get(keys::PATIENT_NAME), Some("Doe^John"));
        assert_eq!(dict.get(keys::MODALITY), Some("MR"));
        assert_eq!(dict.get(keys::STUDY_DATE), Some("20240131"));
        assert_eq!(dict.get(keys::SERIES_NUMBER), Some("7"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases = [
            DicomHeaderArgs {
                study_date: Some("2024-01-31".into()),
                ..Default::default()
            },
            DicomHeaderArgs {
                patient_sex: Some("X".into()),
                ..Default::default()
            },
            DicomHeaderArgs {
                study_time: Some("256000".into()),
                ..Default::default()
            },
            DicomHeaderArgs {
                patient_age: Some("42".into()),
                ..Default::default()
            },
            DicomHeaderArgs {
                series_number: Some("one".into()),
                ..Default::default()
            },
        ];
        for args in cases {
            let mut dict = MetaDataDictionary::new();
            let err = HeaderImporter::new(&args, &mut dict).import().unwrap_err();
            assert!(
                matches!(err.downcast_ref::<ConvertError>(), Some(ConvertError::InvalidArgument(_))),
                "{args:?} should fail validation, got {err}"
            );
        }
    }

    #[test]
    fn time_and_age_formats() {
        assert!(is_valid_time("1230"));
        assert!(is_valid_time("123015.250"));
        assert!(!is_valid_time("12301"));
        assert!(is_valid_age("042Y"));
        assert!(!is_valid_age("42Y"));
    }

    #[test]
    fn reference_file_is_copied_then_overridden() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("reference.dcm");

        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.9")
            .build()
            .expect("meta");
        let mut obj: FileDicomObject<_> =
            FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
        obj.put(DataElement::new(
            Tag(0x0010, 0x0010),
            VR::PN,
            PrimitiveValue::from("Reference^Patient"),
        ));
        obj.put(DataElement::new(
            Tag(0x0010, 0x0020),
            VR::LO,
            PrimitiveValue::from("REF42"),
        ));
        obj.put(DataElement::new(
            Tag(0x0020, 0x000D),
            VR::UI,
            PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.3"),
        ));
        obj.put(DataElement::new(
            Tag(0x0008, 0x0060),
            VR::CS,
            PrimitiveValue::from("MR"),
        ));
        obj.put(DataElement::new(
            Tag(0x0008, 0x103E),
            VR::LO,
            PrimitiveValue::from("T1 MPRAGE"),
        ));
        obj.put(DataElement::new(
            Tag(0x0020, 0x0011),
            VR::IS,
            PrimitiveValue::from("7"),
        ));
        obj.put(DataElement::new(
            Tag(0x0018, 0x1030),
            VR::LO,
            PrimitiveValue::from("t1_mprage_sag"),
        ));
        obj.write_to_file(&path).expect("write reference");

        let args = DicomHeaderArgs {
            reference_file: Some(path),
            use_reference_uids: true,
            patient_name: Some("Override^Name".into()),
            ..Default::default()
        };
        let mut dict = MetaDataDictionary::new();
        HeaderImporter::new(&args, &mut dict).import().expect("import");

        assert_eq!(dict.get(keys::PATIENT_NAME), Some("Override^Name"));
        assert_eq!(dict.get(keys::PATIENT_ID), Some("REF42"));
        assert_eq!(
            dict.get(keys::STUDY_INSTANCE_UID),
            Some("1.2.826.0.1.3680043.2.1125.3")
        );
        assert_eq!(dict.get(keys::MODALITY), Some("MR"));
        assert_eq!(dict.get(keys::SERIES_DESCRIPTION), Some("T1 MPRAGE"));
        assert_eq!(dict.get(keys::SERIES_NUMBER), Some("7"));
        assert_eq!(dict.get(keys::PROTOCOL_NAME), Some("t1_mprage_sag"));
    }
}
