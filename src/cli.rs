//
// cli.rs
// Nifti2Dicom-rs
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use crate::convert::{convert_file, ConvertOptions};
use crate::filter::FilterArgs;
use crate::header::DicomHeaderArgs;
use crate::orientation::Orientation;
use crate::series::OutputArgs;
use crate::uid::UidArgs;
use crate::{batch, nifti_input};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "nifti2dicom")]
#[command(about = "Convert 3-D NIfTI volumes into 2-D DICOM series", long_about = None)]
pub struct Cli {
    /// Log pipeline details (DEBUG level)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a NIfTI volume into a DICOM series
    Convert {
        input: PathBuf,
        /// Output directory for the slice files
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        options: ConvertArgs,
    },
    /// Print header and geometry information of a NIfTI file
    Info {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Convert every .nii / .nii.gz below a directory
    Batch {
        #[arg(short, long)]
        directory: PathBuf,
        /// Root directory; each input gets its own sub-directory
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        options: ConvertArgs,
    },
    /// List the accepted --reorient values
    Orientations,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub filter: FilterCliArgs,
    #[command(flatten)]
    pub output: OutputCliArgs,
    #[command(flatten)]
    pub uids: UidCliArgs,
    #[command(flatten)]
    pub header: HeaderCliArgs,
    /// Print the conversion report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FilterCliArgs {
    /// Rescale intensities into the 12-bit range instead of casting
    #[arg(short, long)]
    pub rescale: bool,
    /// Target orientation code (e.g. RAI, LPS) or NONE to keep the input axes
    #[arg(long, default_value = "RAI", value_parser = parse_orientation)]
    pub reorient: String,
}

#[derive(Args, Debug, Clone)]
pub struct OutputCliArgs {
    #[arg(long, default_value = "IMG")]
    pub prefix: String,
    /// Zero-padded width of the slice index in file names
    #[arg(long, default_value_t = 4)]
    pub digits: usize,
    #[arg(long, default_value = "dcm")]
    pub suffix: String,
    /// Write into a non-empty output directory
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UidCliArgs {
    #[arg(long)]
    pub study_instance_uid: Option<String>,
    #[arg(long)]
    pub series_instance_uid: Option<String>,
    #[arg(long)]
    pub frame_of_reference_uid: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HeaderCliArgs {
    /// Reference DICOM file to copy patient/study attributes from
    #[arg(long = "dicom-header-file")]
    pub reference_file: Option<PathBuf>,
    /// Also copy Study Instance UID and Frame of Reference UID from the reference file
    #[arg(long, requires = "reference_file")]
    pub use_reference_uids: bool,
    #[arg(long)]
    pub patient_name: Option<String>,
    #[arg(long)]
    pub patient_id: Option<String>,
    #[arg(long)]
    pub patient_birth_date: Option<String>,
    #[arg(long)]
    pub patient_sex: Option<String>,
    #[arg(long)]
    pub patient_age: Option<String>,
    #[arg(long)]
    pub study_description: Option<String>,
    #[arg(long)]
    pub study_date: Option<String>,
    #[arg(long)]
    pub study_time: Option<String>,
    #[arg(long)]
    pub study_id: Option<String>,
    #[arg(long)]
    pub accession_number: Option<String>,
    #[arg(long)]
    pub series_description: Option<String>,
    #[arg(long)]
    pub series_number: Option<String>,
    #[arg(long)]
    pub modality: Option<String>,
    #[arg(long)]
    pub institution_name: Option<String>,
    #[arg(long)]
    pub manufacturer: Option<String>,
    #[arg(long)]
    pub referring_physician: Option<String>,
    #[arg(long)]
    pub protocol_name: Option<String>,
}

fn parse_orientation(value: &str) -> Result<String, String> {
    Orientation::parse(value)
        .map(|_| value.to_string())
        .map_err(|e| format!("{e}; run `nifti2dicom orientations` for the accepted values"))
}

impl From<FilterCliArgs> for FilterArgs {
    fn from(value: FilterCliArgs) -> Self {
        FilterArgs {
            rescale: value.rescale,
            reorient: value.reorient,
        }
    }
}

impl From<UidCliArgs> for UidArgs {
    fn from(value: UidCliArgs) -> Self {
        UidArgs {
            study_instance_uid: value.study_instance_uid,
            series_instance_uid: value.series_instance_uid,
            frame_of_reference_uid: value.frame_of_reference_uid,
        }
    }
}

impl From<HeaderCliArgs> for DicomHeaderArgs {
    fn from(value: HeaderCliArgs) -> Self {
        DicomHeaderArgs {
            reference_file: value.reference_file,
            use_reference_uids: value.use_reference_uids,
            patient_name: value.patient_name,
            patient_id: value.patient_id,
            patient_birth_date: value.patient_birth_date,
            patient_sex: value.patient_sex,
            patient_age: value.patient_age,
            study_description: value.study_description,
            study_date: value.study_date,
            study_time: value.study_time,
            study_id: value.study_id,
            accession_number: value.accession_number,
            series_description: value.series_description,
            series_number: value.series_number,
            modality: value.modality,
            institution_name: value.institution_name,
            manufacturer: value.manufacturer,
            referring_physician: value.referring_physician,
            protocol_name: value.protocol_name,
        }
    }
}

impl ConvertArgs {
    fn into_options(self, directory: &Path) -> ConvertOptions {
        let output = OutputArgs {
            directory: directory.to_path_buf(),
            prefix: self.output.prefix,
            digits: self.output.digits,
            suffix: self.output.suffix,
            force: self.output.force,
        };
        ConvertOptions {
            filter: self.filter.into(),
            output,
            uids: self.uids.into(),
            header: self.header.into(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Convert {
            input,
            output,
            options,
        } => {
            let json = options.json;
            let options = options.into_options(&output);
            let report = convert_file(&input, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Series written to {:?}: {} slice(s) of {}x{}",
                    report.output_directory,
                    report.slices(),
                    report.columns,
                    report.rows
                );
                println!("  Study Instance UID:  {}", report.study_instance_uid);
                println!("  Series Instance UID: {}", report.series_instance_uid);
            }
        }
        Commands::Info { file, json } => print_info(&file, json)?,
        Commands::Batch {
            directory,
            output,
            options,
        } => {
            let template = options.into_options(&output);
            let summary = batch::process_directory(&directory, &output, &template)?;
            println!(
                "Batch finished: {} converted, {} failed",
                summary.converted, summary.failed
            );
            if summary.failed > 0 {
                bail!("{} file(s) failed to convert", summary.failed);
            }
        }
        Commands::Orientations => {
            for value in Orientation::accepted_values() {
                println!("{}", value);
            }
        }
    }

    Ok(())
}

fn print_info(path: &Path, json: bool) -> anyhow::Result<()> {
    let summary = nifti_input::summarize(path)?;
    if json {
        let text = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{}", text);
        return Ok(());
    }

    println!("{}", "=".repeat(80));
    println!("NIfTI File Information: {}", summary.path);
    println!("{}", "=".repeat(80));
    println!(
        "  Datatype:    {} ({})",
        summary.datatype,
        summary.pixel_type.as_deref().unwrap_or("unsupported")
    );
    println!("  Dimensions:  {:?}", summary.dimensions);
    println!("  Spacing:     {:?}", summary.spacing);
    println!("  Origin:      {:?}", summary.origin);
    println!(
        "  Orientation: {}",
        summary.orientation.as_deref().unwrap_or("N/A")
    );
    println!(
        "  sform/qform: {}/{}",
        summary.sform_code, summary.qform_code
    );
    println!(
        "  Scaling:     slope {} inter {}",
        summary.scl_slope, summary.scl_inter
    );
    Ok(())
}
