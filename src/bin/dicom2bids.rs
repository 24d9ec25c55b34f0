use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dicom_bids::config::{ConfigLoader, Overrides, PipelineConfig};
use dicom_bids::converter::Dcm2niix;
use dicom_bids::driver::ConvertOptions;
use dicom_bids::error::BidsError;
use dicom_bids::output::{JsonOutput, LogSink, OutputMode, TextOutput};
use dicom_bids::pipeline::{Pipeline, RunOptions};
use dicom_bids::subjects::list_subjects;

#[derive(Parser)]
#[command(name = "dicom2bids")]
#[command(about = "Convert per-subject DICOM acquisitions into a BIDS dataset")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    source: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    target: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Convert every subject and write the dataset files")]
    Convert(ConvertArgs),
    #[command(about = "List the subject folders that would be converted")]
    Subjects,
    #[command(about = "Show the sequence registry")]
    Sequences,
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(long)]
    force: bool,

    #[arg(long)]
    dry_run: bool,

    #[arg(long = "subject", value_name = "ID")]
    subjects: Vec<u32>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<BidsError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BidsError) -> u8 {
    match error {
        BidsError::MissingSetting(_)
        | BidsError::MissingSourceRoot(_)
        | BidsError::ConfigRead(_)
        | BidsError::ConfigParse(_)
        | BidsError::DuplicateSequence(_)
        | BidsError::UnknownSequence(_)
        | BidsError::InvalidSuffix { .. }
        | BidsError::InvalidSubjectPattern(_) => 2,
        BidsError::MissingTool(_) | BidsError::ConverterFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = ConfigLoader::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sequences => {
            let overrides = Overrides {
                source_root: Some(cli.source.unwrap_or_else(|| Utf8PathBuf::from("."))),
                target_root: Some(cli.target.unwrap_or_else(|| Utf8PathBuf::from("."))),
            };
            let resolved = ConfigLoader::resolve_config(config, overrides)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_sequences(resolved.registry.iter())
                    .into_diagnostic()?,
                OutputMode::Text => TextOutput::print_sequences(resolved.registry.iter()),
            }
            Ok(())
        }
        Commands::Subjects => {
            let overrides = Overrides {
                source_root: cli.source,
                target_root: Some(cli.target.unwrap_or_else(|| Utf8PathBuf::from("."))),
            };
            let resolved = ConfigLoader::resolve_config(config, overrides)?;
            let scan = list_subjects(&resolved.source_root, &resolved.subject_pattern)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_subjects(&scan).into_diagnostic()?,
                OutputMode::Text => TextOutput::print_subjects(&scan),
            }
            Ok(())
        }
        Commands::Convert(args) => {
            let overrides = Overrides {
                source_root: cli.source,
                target_root: cli.target,
            };
            let resolved = ConfigLoader::resolve_config(config, overrides)?;
            run_convert(resolved, args, output_mode)
        }
    }
}

fn run_convert(
    config: PipelineConfig,
    args: ConvertArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let ConvertArgs {
        force,
        dry_run,
        subjects,
    } = args;

    let converter = Dcm2niix::new(&config.converter);
    if !dry_run && !converter.is_available() {
        return Err(BidsError::MissingTool(config.converter.clone()).into());
    }

    let pipeline = Pipeline::new(config, converter);
    let options = RunOptions {
        convert: ConvertOptions { force, dry_run },
        only_subjects: subjects,
    };

    match output_mode {
        OutputMode::Json => {
            let report = pipeline.run(&options, &JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()?;
        }
        OutputMode::Text => {
            let report = pipeline.run(&options, &LogSink)?;
            TextOutput::print_report(&report);
        }
    }
    Ok(())
}
