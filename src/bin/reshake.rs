use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use reshake::app::{BatchOptions, BatchOutcome, Prompter, Reshaker};
use reshake::config::ConfigLoader;
use reshake::convert;
use reshake::domain::{CancelToken, ChargeRange, FileFormat, Outcome};
use reshake::error::ReshakeError;
use reshake::output::{ConversionResult, JsonOutput, OutputMode};
use reshake::raw::{RawConverter, SystemRawConverter};
use reshake::remote::PrideHttpClient;
use reshake::store::Store;
use reshake::terminal::{DecliningPrompter, StdinPrompter, TerminalProgress};

const EXIT_CANCELED: u8 = 130;

#[derive(Parser)]
#[command(name = "reshake")]
#[command(about = "Reprocess proteomics repository submissions into MGF plus inferred search parameters")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download, convert and infer search parameters for a batch")]
    Run(RunArgs),
    #[command(about = "Convert one local PRIDE XML or MGF file to MGF")]
    Convert(ConvertArgs),
    #[command(about = "Show external tools found on PATH")]
    Tools,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    work_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    force: bool,

    #[arg(long)]
    no_cache: bool,
}

#[derive(Args)]
struct ConvertArgs {
    input: PathBuf,
    output: PathBuf,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<ReshakeError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &ReshakeError) -> u8 {
    match error {
        ReshakeError::MissingConfig
        | ReshakeError::ConfigRead(_)
        | ReshakeError::ConfigParse(_)
        | ReshakeError::InvalidRemoteFile(_) => 2,
        ReshakeError::Unreachable { .. } | ReshakeError::Http(_) | ReshakeError::HttpStatus { .. } => 3,
        ReshakeError::NoUsableSpectra(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Run(args) => run_batch(args, output_mode),
        Commands::Convert(args) => run_convert(args, output_mode),
        Commands::Tools => {
            JsonOutput::print_tools(&SystemRawConverter::new().tool_info()).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_batch(args: RunArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;
    let work_dir = args.work_dir.unwrap_or(resolved.work_dir);
    let cache_dir = match args.cache_dir.or(resolved.cache_dir) {
        Some(dir) => dir,
        None => Store::default_cache_root()?,
    };
    let store = Store::new_with_paths(work_dir, cache_dir);
    let client = PrideHttpClient::new()?;
    let reshaker = Reshaker::new(store, client, SystemRawConverter::new());
    let options = BatchOptions {
        force: args.force,
        no_cache: args.no_cache,
    };

    let prompter: Box<dyn Prompter> = match output_mode {
        OutputMode::Interactive => Box::new(StdinPrompter::new()),
        OutputMode::NonInteractive => Box::new(DecliningPrompter),
    };
    let outcome = match output_mode {
        OutputMode::Interactive => {
            let sink = TerminalProgress::new(CancelToken::new());
            reshaker.run(&resolved.request, &options, &sink, prompter.as_ref())?
        }
        OutputMode::NonInteractive => {
            reshaker.run(&resolved.request, &options, &JsonOutput, prompter.as_ref())?
        }
    };

    if output_mode == OutputMode::Interactive {
        print_summary(&outcome);
    } else {
        JsonOutput::print_outcome(&outcome).into_diagnostic()?;
    }

    Ok(match &outcome {
        BatchOutcome::Success { .. } | BatchOutcome::PartialSuccess { .. } => ExitCode::SUCCESS,
        BatchOutcome::Canceled => ExitCode::from(EXIT_CANCELED),
        BatchOutcome::Failed { error, .. } => ExitCode::from(map_exit_code(error)),
    })
}

fn run_convert(args: ConvertArgs, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let mut charges = ChargeRange::new();
    let sink = TerminalProgress::new(CancelToken::new());
    let outcome = match FileFormat::from_name(&name) {
        FileFormat::PrideXml => convert::convert(&args.input, &args.output, &mut charges, &sink)?,
        FileFormat::Mgf => {
            convert::passthrough_mgf(&args.input, &args.output, &mut charges, &sink)?
        }
        _ => {
            return Err(ReshakeError::UnsupportedFormat(format!(
                "{name}: expected a PRIDE XML or MGF file"
            ))
            .into());
        }
    };

    let summary = match outcome {
        Outcome::Done(summary) => summary,
        Outcome::Canceled => return Ok(ExitCode::from(EXIT_CANCELED)),
    };
    let input = args.input.display().to_string();
    let output = args.output.display().to_string();
    let result = ConversionResult {
        input: &input,
        output: &output,
        summary,
        min_charge: charges.min(),
        max_charge: charges.max(),
    };
    match output_mode {
        OutputMode::Interactive => {
            println!(
                "Converted {} of {} spectra into {output}",
                summary.valid, summary.total
            );
            if let (Some(min), Some(max)) = (charges.min(), charges.max()) {
                println!("Charge range: {min}..{max}");
            }
        }
        OutputMode::NonInteractive => JsonOutput::print_conversion(&result).into_diagnostic()?,
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Success {
            parameters_path,
            report,
            files,
            ..
        } => {
            println!();
            println!("{report}");
            println!("Processed {} file(s); parameters in {parameters_path}", files.len());
        }
        BatchOutcome::PartialSuccess {
            parameters_path,
            report,
            files,
            excluded,
            ..
        } => {
            println!();
            println!("{report}");
            println!("Processed {} file(s); parameters in {parameters_path}", files.len());
            println!("Excluded:");
            for file in excluded {
                println!("  - {}: {}", file.name, file.reason);
            }
        }
        BatchOutcome::Canceled => println!("Canceled."),
        BatchOutcome::Failed { reason, .. } => println!("Failed: {reason}"),
    }
}
