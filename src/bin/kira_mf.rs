use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_metadata_fetcher::app::{App, FetchOptions, FetchSummary, ProgressSink};
use kira_metadata_fetcher::config::{ConfigLoader, ResolvedConfig};
use kira_metadata_fetcher::domain::Pipeline;
use kira_metadata_fetcher::ena::EnaSampleClient;
use kira_metadata_fetcher::error::KiraError;
use kira_metadata_fetcher::fetch::{Fetcher, MetadataSource};
use kira_metadata_fetcher::output::{ConsoleProgress, JsonOutput, OutputMode};
use kira_metadata_fetcher::srr::SraRunClient;

#[derive(Parser)]
#[command(name = "kira-mf")]
#[command(about = "Fetch ENA BioSample and SRA run metadata for a table of accessions")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true, help = "JSON config file (defaults to ./kira-mf.json)")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch BioSample metadata from the ENA portal API")]
    Sample(SampleArgs),
    #[command(about = "Fetch run metadata from the SRA database backend")]
    Run(RunArgs),
}

#[derive(Args)]
struct CommonArgs {
    #[arg(short = 'i', long = "input-file", help = "TSV or CSV file with accession IDs")]
    input_file: Utf8PathBuf,

    #[arg(short = 'j', long = "output-json")]
    output_json: Utf8PathBuf,

    #[arg(short = 's', long = "chunk-size")]
    chunk_size: Option<usize>,

    #[arg(short = 'w', long = "max-workers")]
    max_workers: Option<usize>,
}

#[derive(Args)]
struct SampleArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(short = 'c', long = "output-csv")]
    output_csv: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(short = 'n', long = "column", default_value = "subjectID")]
    column: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InputRead { .. }
        | KiraError::MissingColumn { .. }
        | KiraError::InvalidAccession(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::InvalidConfig(_)
        | KiraError::InvalidChunkSize(_)
        | KiraError::InvalidWorkerCount(_) => 2,
        KiraError::CsvSchema(_) | KiraError::Filesystem(_) => 3,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Sample(args) => {
            let options = fetch_options(
                args.common,
                Pipeline::Sample.default_column().to_string(),
                args.output_csv,
                &config,
            );
            let client = EnaSampleClient::new(
                config.sample_base_url.clone(),
                config.timeout,
                config.missing_values.clone(),
            )?;
            run_fetch(Pipeline::Sample, client, &config, options, output_mode)
        }
        Commands::Run(args) => {
            let options = fetch_options(args.common, args.column, None, &config);
            let client = SraRunClient::new(
                config.run_base_url.clone(),
                config.timeout,
                config.missing_values.clone(),
            )?;
            run_fetch(Pipeline::Run, client, &config, options, output_mode)
        }
    }
}

fn fetch_options(
    common: CommonArgs,
    column: String,
    output_csv: Option<Utf8PathBuf>,
    config: &ResolvedConfig,
) -> FetchOptions {
    FetchOptions {
        input: common.input_file,
        column,
        output_json: common.output_json,
        output_csv,
        chunk_size: common.chunk_size.unwrap_or(config.chunk_size),
        max_workers: common.max_workers.unwrap_or(config.max_workers),
    }
}

fn run_fetch<S: MetadataSource>(
    pipeline: Pipeline,
    source: S,
    config: &ResolvedConfig,
    options: FetchOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = App::new(pipeline, Fetcher::new(source, config.retry));

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.fetch(&options, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let progress = ConsoleProgress::new();
            let summary = app.fetch(&options, &progress as &dyn ProgressSink)?;
            progress.finish(&summary);
            print_fetch_summary(&summary);
            Ok(())
        }
    }
}

fn print_fetch_summary(summary: &FetchSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-MF {} summary{reset}", summary.pipeline);
    println!(
        "{green}Fetched records: {} of {} accessions ({} chunks){reset}",
        summary.records, summary.accessions, summary.chunks
    );
    let failed = summary.failures.len();
    let color = if failed == 0 { green } else { yellow };
    println!("{color}Failed accessions: {failed}{reset}");
    for failure in &summary.failures {
        println!("{red}   {}: {}{reset}", failure.accession, failure.reason);
    }
    if !summary.failed_chunks.is_empty() {
        println!(
            "{red}Failed chunks: {:?}{reset}",
            summary.failed_chunks
        );
    }
    println!("{cyan}JSON: {}{reset}", summary.output_json);
    if let Some(path) = &summary.output_csv {
        println!("{cyan}CSV: {path}{reset}");
    }
}
