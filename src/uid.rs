//
// uid.rs
// Nifti2Dicom-rs
//
// Validates user-supplied UIDs and generates the study, series, frame-of-reference and instance UIDs
// of a converted series.
//
// Thales Matheus Mendonça Santos - November 2025

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::dictionary::{keys, MetaDataDictionary};
use crate::error::{ConvertError, Result};

/// Root for UUID-derived UIDs (ISO/IEC 9834-8).
pub const UID_ROOT: &str = "2.25";
pub const MAX_UID_LEN: usize = 64;

static UID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// UIDs requested on the command line; anything left empty is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidArgs {
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub frame_of_reference_uid: Option<String>,
}

pub fn is_valid_uid(uid: &str) -> bool {
    if uid.is_empty() || uid.len() > MAX_UID_LEN {
        return false;
    }
    uid.split('.').all(|component| {
        !component.is_empty()
            && component.bytes().all(|b| b.is_ascii_digit())
            && (component.len() == 1 || !component.starts_with('0'))
    })
}

/// Generate a fresh `2.25.<u128>` UID.
pub fn generate_uid(label: &str) -> String {
    let count = UID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(count.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    format!("{}.{}", UID_ROOT, u128::from_be_bytes(bytes))
}

/// SOP Instance UID for the `number`-th slice of a series.
pub fn instance_uid(series_uid: &str, number: usize) -> String {
    let candidate = format!("{}.{}", series_uid, number);
    if candidate.len() <= MAX_UID_LEN {
        candidate
    } else {
        generate_uid("instance")
    }
}

pub struct UidGenerator<'a> {
    args: &'a UidArgs,
    dict: &'a mut MetaDataDictionary,
}

impl<'a> UidGenerator<'a> {
    pub fn new(args: &'a UidArgs, dict: &'a mut MetaDataDictionary) -> Self {
        Self { args, dict }
    }

    /// Fill study, series and frame-of-reference UIDs.
    ///
    /// Explicit arguments win over values already in the dictionary (e.g. copied from a reference
    /// file), which win over generated ones.
    pub fn generate(&mut self) -> Result<()> {
        let args = self.args;
        self.assign(keys::STUDY_INSTANCE_UID, args.study_instance_uid.as_deref(), "study")?;
        self.assign(keys::SERIES_INSTANCE_UID, args.series_instance_uid.as_deref(), "series")?;
        self.assign(
            keys::FRAME_OF_REFERENCE_UID,
            args.frame_of_reference_uid.as_deref(),
            "frame-of-reference",
        )?;
        Ok(())
    }

    fn assign(&mut self, key: &str, explicit: Option<&str>, label: &str) -> Result<()> {
        let uid = match explicit {
            Some(uid) if is_valid_uid(uid) => uid.to_string(),
            Some(uid) => {
                return Err(ConvertError::InvalidArgument(format!(
                    "{} UID {:?} is not a valid DICOM UID",
                    label, uid
                )))
            }
            None => match self.dict.get(key) {
                Some(existing) if is_valid_uid(existing) => {
                    debug!(key, uid = existing, "keeping existing {} UID", label);
                    return Ok(());
                }
                Some(existing) => {
                    warn!(key, uid = existing, "discarding malformed {} UID", label);
                    generate_uid(label)
                }
                None => generate_uid(label),
            },
        };
        debug!(key, %uid, "{} UID", label);
        self.dict.set(key, uid);
        Ok(())
    }
}
