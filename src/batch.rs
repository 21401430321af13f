use anyhow::{bail, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::convert::{convert_file, ConvertOptions};
use crate::models::BatchSummary;

fn is_nifti(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

fn series_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    let lower = name.to_ascii_lowercase();
    let cut = if lower.ends_with(".nii.gz") {
        name.len() - ".nii.gz".len()
    } else if lower.ends_with(".nii") {
        name.len() - ".nii".len()
    } else {
        name.len()
    };
    name[..cut].to_string()
}

pub fn find_inputs(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_nifti(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Output directory for `path`: its location below `dir`, mirrored under `output_root`, plus the stem.
fn series_directory(dir: &Path, output_root: &Path, path: &Path) -> PathBuf {
    let relative_parent = path
        .strip_prefix(dir)
        .ok()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    output_root.join(relative_parent).join(series_stem(path))
}

/// Convert every NIfTI file below `dir` into its own series directory under `output_root`.
///
/// The shared options provide the template; output directory and generated UIDs are per file.
/// Inputs that would land in the same directory (`x.nii` next to `x.nii.gz`) are all rejected.
pub fn process_directory(
    dir: &Path,
    output_root: &Path,
    template: &ConvertOptions,
) -> Result<BatchSummary> {
    if !dir.is_dir() {
        bail!("{:?} is not a directory", dir);
    }
    info!(directory = %dir.display(), "batch conversion");

    let files = find_inputs(dir);
    info!("Found {} NIfTI file(s).", files.len());

    let mut targets: HashMap<PathBuf, usize> = HashMap::new();
    for path in &files {
        *targets
            .entry(series_directory(dir, output_root, path))
            .or_insert(0) += 1;
    }

    let results: Vec<bool> = files
        .par_iter()
        .map(|path| {
            let output = series_directory(dir, output_root, path);
            let clashes = targets.get(&output).copied().unwrap_or(0);
            if clashes > 1 {
                error!(
                    "Error in {:?}: {} inputs share the output directory {:?}",
                    path, clashes, output
                );
                return false;
            }

            let mut options = template.clone();
            options.output.directory = output;
            options.uids.series_instance_uid = None;

            match convert_file(path, &options) {
                Ok(report) => {
                    println!("Converted {:?} -> {} slice(s)", path, report.slices());
                    true
                }
                Err(e) => {
                    error!("Error in {:?}: {:#}", path, e);
                    false
                }
            }
        })
        .collect();

    let converted = results.iter().filter(|ok| **ok).count();
    Ok(BatchSummary {
        converted,
        failed: results.len() - converted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn stems_drop_nifti_extensions() {
        assert_eq!(series_stem(Path::new("/a/brain.nii.gz")), "brain");
        assert_eq!(series_stem(Path::new("T1.NII")), "T1");
        assert_eq!(series_stem(Path::new("notes.txt")), "notes.txt");
    }

    #[test]
    fn finds_only_nifti_files() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.nii"), b"").unwrap();
        fs::write(dir.path().join("nested/b.nii.gz"), b"").unwrap();
        fs::write(dir.path().join("c.dcm"), b"").unwrap();

        let found = find_inputs(dir.path());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| is_nifti(p)));
    }

    #[test]
    fn series_directories_mirror_the_input_tree() {
        let root = Path::new("/data/in");
        let out = Path::new("/data/out");
        assert_eq!(
            series_directory(root, out, Path::new("/data/in/a/brain.nii")),
            PathBuf::from("/data/out/a/brain")
        );
        assert_eq!(
            series_directory(root, out, Path::new("/data/in/b/brain.nii.gz")),
            PathBuf::from("/data/out/b/brain")
        );
        assert_eq!(
            series_directory(root, out, Path::new("/data/in/top.nii")),
            PathBuf::from("/data/out/top")
        );
    }
}
