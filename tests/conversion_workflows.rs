//
// conversion_workflows.rs
// Nifti2Dicom-rs
//
// Integration-style tests covering NIfTI loading, reorientation, rescaling, series writing and batch conversion.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::Tag;
use dicom::object::{open_file, DefaultDicomObject};
use ndarray::{Array3, Array4};
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use nifti2dicom::batch;
use nifti2dicom::convert::{convert_file, ConvertOptions};
use nifti2dicom::nifti_input;
use nifti2dicom::series::OutputArgs;
use tempfile::{tempdir, TempDir};

fn reference_header(spacing: [f32; 3]) -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.pixdim = [1.0, spacing[0], spacing[1], spacing[2], 1.0, 1.0, 1.0, 1.0];
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header.sform_code = 0;
    header.qform_code = 0;
    header.magic = *b"n+1\0";
    header
}

/// 3x2x4 volume where each voxel encodes its index as `i + 10 j + 100 k`.
fn build_test_nifti() -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("volume.nii");
    let data = Array3::from_shape_fn((3, 2, 4), |(i, j, k)| (i + 10 * j + 100 * k) as i16);

    WriterOptions::new(&path)
        .reference_header(&reference_header([1.0, 1.0, 2.5]))
        .write_nifti(&data)
        .expect("write nifti");
    (dir, path)
}

fn text(obj: &DefaultDicomObject, tag: Tag) -> String {
    obj.element(tag)
        .expect("element")
        .to_str()
        .expect("string value")
        .trim_end_matches(['\0', ' '])
        .to_string()
}

fn number(obj: &DefaultDicomObject, tag: Tag) -> u16 {
    obj.element(tag).expect("element").to_int::<u16>().expect("integer value")
}

fn pixels(obj: &DefaultDicomObject) -> Vec<i16> {
    let bytes = obj
        .element(Tag(0x7FE0, 0x0010))
        .expect("pixels")
        .to_bytes()
        .expect("pixel bytes")
        .into_owned();
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn options_for(dir: &Path) -> ConvertOptions {
    ConvertOptions::new(OutputArgs::new(dir))
}

#[test]
fn summary_reports_header_geometry() {
    let (_dir, path) = build_test_nifti();
    let summary = nifti_input::summarize(&path).expect("summary");

    assert_eq!(summary.datatype, 4);
    assert_eq!(summary.pixel_type.as_deref(), Some("short"));
    assert_eq!(summary.dimensions, vec![3, 2, 4]);
    assert_eq!(summary.spacing, [1.0, 1.0, 2.5]);
    assert_eq!(summary.orientation.as_deref(), Some("LPI"));
}

#[test]
fn default_conversion_reorients_to_rai() {
    let (dir, path) = build_test_nifti();
    let out = dir.path().join("series");

    let report = convert_file(&path, &options_for(&out)).expect("convert");
    assert_eq!(report.slices(), 4);
    assert_eq!((report.columns, report.rows), (3, 2));
    assert!(!report.rescaled);
    assert_eq!(report.files[0].file_name().unwrap(), "IMG0000.dcm");

    let first = open_file(&report.files[0]).expect("open first slice");
    assert_eq!(number(&first, Tag(0x0028, 0x0010)), 2); // Rows
    assert_eq!(number(&first, Tag(0x0028, 0x0011)), 3); // Columns
    assert_eq!(number(&first, Tag(0x0028, 0x0101)), 16); // Bits Stored
    assert_eq!(number(&first, Tag(0x0028, 0x0103)), 1); // Pixel Representation
    assert_eq!(text(&first, Tag(0x0020, 0x0013)), "1");
    assert_eq!(text(&first, Tag(0x0020, 0x0020)), "L\\P");
    assert_eq!(text(&first, Tag(0x0020, 0x0037)), "1\\0\\0\\0\\1\\0");
    assert_eq!(text(&first, Tag(0x0020, 0x0032)), "-2\\-1\\0");
    assert_eq!(text(&first, Tag(0x0010, 0x0010)), "Anonymous");

    // Both in-plane axes were flipped, so the first row holds the last input row reversed.
    assert_eq!(pixels(&first), vec![12, 11, 10, 2, 1, 0]);

    let second = open_file(&report.files[1]).expect("open second slice");
    assert_eq!(text(&second, Tag(0x0020, 0x0013)), "2");
    assert_eq!(text(&second, Tag(0x0020, 0x0032)), "-2\\-1\\2.5");
    assert_eq!(pixels(&second), vec![112, 111, 110, 102, 101, 100]);
}

#[test]
fn slices_share_study_and_series_uids() {
    let (dir, path) = build_test_nifti();
    let mut options = options_for(&dir.path().join("series"));
    options.uids.study_instance_uid = Some("1.2.3.4".into());

    let report = convert_file(&path, &options).expect("convert");
    assert_eq!(report.study_instance_uid, "1.2.3.4");
    assert!(report.series_instance_uid.starts_with("2.25."));

    let mut instance_uids = Vec::new();
    for file in &report.files {
        let obj = open_file(file).expect("open slice");
        assert_eq!(text(&obj, Tag(0x0020, 0x000D)), "1.2.3.4");
        assert_eq!(text(&obj, Tag(0x0020, 0x000E)), report.series_instance_uid);
        let sop_uid = text(&obj, Tag(0x0008, 0x0018));
        assert_eq!(obj.meta().media_storage_sop_instance_uid(), sop_uid);
        instance_uids.push(sop_uid);
    }
    instance_uids.sort();
    instance_uids.dedup();
    assert_eq!(instance_uids.len(), report.files.len());
}

#[test]
fn rescale_maps_into_twelve_bits() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("ramp.nii.gz");
    let mut data = Array3::from_shape_fn((4, 4, 2), |(i, j, _)| (i * 4 + j) as u8);
    data[[3, 3, 1]] = 255;
    WriterOptions::new(&path)
        .reference_header(&reference_header([0.5, 0.5, 1.0]))
        .write_nifti(&data)
        .expect("write nifti");

    let mut options = options_for(&dir.path().join("series"));
    options.filter.rescale = true;
    options.filter.reorient = "NONE".into();
    let report = convert_file(&path, &options).expect("convert");
    assert!(report.rescaled);

    let first = open_file(&report.files[0]).expect("open first slice");
    let last = open_file(&report.files[1]).expect("open last slice");
    assert_eq!(number(&first, Tag(0x0028, 0x0101)), 12); // Bits Stored
    assert_eq!(number(&first, Tag(0x0028, 0x0102)), 11); // High Bit
    assert_eq!(number(&first, Tag(0x0028, 0x0103)), 0);
    assert!(first.element(Tag(0x0020, 0x0020)).is_err());

    let values: Vec<i16> = pixels(&first).into_iter().chain(pixels(&last)).collect();
    assert_eq!(values.iter().min(), Some(&0));
    assert_eq!(values.iter().max(), Some(&2047));
    assert_eq!(pixels(&first)[0], 0);
}

#[test]
fn nan_masked_float_map_converts() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("masked.nii");
    let mut data = Array3::from_elem((2, 2, 2), 5.0f32);
    data[[0, 0, 0]] = f32::NAN;
    WriterOptions::new(&path)
        .reference_header(&reference_header([1.0, 1.0, 1.0]))
        .write_nifti(&data)
        .expect("write nifti");

    let mut options = options_for(&dir.path().join("series"));
    options.filter.reorient = "NONE".into();
    let report = convert_file(&path, &options).expect("convert");
    assert_eq!(report.slices(), 2);

    let first = open_file(&report.files[0]).expect("open first slice");
    assert_eq!(pixels(&first), vec![0, 5, 5, 5]);
}

#[test]
fn four_dimensional_input_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("dynamic.nii");
    let data = Array4::<u8>::zeros((2, 2, 2, 3));
    WriterOptions::new(&path)
        .reference_header(&reference_header([1.0, 1.0, 1.0]))
        .write_nifti(&data)
        .expect("write nifti");

    let out = dir.path().join("series");
    assert!(convert_file(&path, &options_for(&out)).is_err());
}

#[test]
fn occupied_output_directory_requires_force() {
    let (dir, path) = build_test_nifti();
    let out = dir.path().join("series");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("existing.txt"), b"keep").unwrap();

    let mut options = options_for(&out);
    assert!(convert_file(&path, &options).is_err());

    options.output.force = true;
    let report = convert_file(&path, &options).expect("forced convert");
    assert_eq!(report.slices(), 4);
    assert!(out.join("existing.txt").exists());
}

#[test]
fn invalid_header_values_abort_before_writing() {
    let (dir, path) = build_test_nifti();
    let out = dir.path().join("series");
    let mut options = options_for(&out);
    options.header.patient_sex = Some("X".into());

    assert!(convert_file(&path, &options).is_err());
    assert!(!out.exists());
}

#[test]
fn batch_converts_each_file_into_its_own_series() {
    let (dir, path) = build_test_nifti();
    let inputs = dir.path().join("inputs");
    fs::create_dir_all(inputs.join("nested")).unwrap();
    fs::copy(&path, inputs.join("first.nii")).unwrap();
    fs::copy(&path, inputs.join("nested/second.nii")).unwrap();
    fs::write(inputs.join("broken.nii"), b"not a nifti file").unwrap();

    let out = dir.path().join("out");
    let summary = batch::process_directory(&inputs, &out, &options_for(&out)).expect("batch");
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.failed, 1);

    let first = open_file(out.join("first/IMG0000.dcm")).expect("first series");
    let second = open_file(out.join("nested/second/IMG0000.dcm")).expect("second series");
    assert_ne!(
        text(&first, Tag(0x0020, 0x000E)),
        text(&second, Tag(0x0020, 0x000E))
    );
}

#[test]
fn batch_keeps_same_named_inputs_apart() {
    let (dir, path) = build_test_nifti();
    let inputs = dir.path().join("inputs");
    fs::create_dir_all(inputs.join("a")).unwrap();
    fs::create_dir_all(inputs.join("b")).unwrap();
    fs::copy(&path, inputs.join("a/brain.nii")).unwrap();
    fs::copy(&path, inputs.join("b/brain.nii")).unwrap();

    let out = dir.path().join("out");
    let mut options = options_for(&out);
    options.output.force = true;
    let summary = batch::process_directory(&inputs, &out, &options).expect("batch");
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.failed, 0);

    let a = open_file(out.join("a/brain/IMG0000.dcm")).expect("series from a/");
    let b = open_file(out.join("b/brain/IMG0000.dcm")).expect("series from b/");
    assert_ne!(text(&a, Tag(0x0020, 0x000E)), text(&b, Tag(0x0020, 0x000E)));
    assert_eq!(fs::read_dir(out.join("a/brain")).unwrap().count(), 4);
    assert_eq!(fs::read_dir(out.join("b/brain")).unwrap().count(), 4);
}

#[test]
fn batch_rejects_inputs_sharing_an_output_directory() {
    let (dir, path) = build_test_nifti();
    let inputs = dir.path().join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    fs::copy(&path, inputs.join("scan.nii")).unwrap();
    fs::copy(&path, inputs.join("scan.nii.gz")).unwrap();
    fs::copy(&path, inputs.join("other.nii")).unwrap();

    let out = dir.path().join("out");
    let summary = batch::process_directory(&inputs, &out, &options_for(&out)).expect("batch");
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.failed, 2);
    assert!(!out.join("scan").exists());
    assert!(out.join("other/IMG0000.dcm").exists());
}
