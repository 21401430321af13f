use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

use crate::dictionary::{parse_tag_key, MetaDataDictionary};

/// Small helper trait to pull string values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn has_element(&self, tag: Tag) -> bool;
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches([' ', '\0']).to_string())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches([' ', '\0']).to_string())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

/// Copy the non-empty values of `keys` from `obj` into the dictionary, returning how many were copied.
pub fn copy_tags<T: ElementAccess>(obj: &T, dict: &mut MetaDataDictionary, keys: &[&str]) -> usize {
    let mut copied = 0;
    for key in keys {
        let Some(tag) = parse_tag_key(key) else {
            continue;
        };
        if !obj.has_element(tag) {
            continue;
        }
        if let Some(value) = obj.element_str(tag).filter(|v| !v.is_empty()) {
            dict.set(key, value);
            copied += 1;
        }
    }
    copied
}
