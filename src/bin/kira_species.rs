use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_species::app::{AnnotationSummary, App, ProgressEvent, ProgressSink};
use kira_species::blast::BlastHttpClient;
use kira_species::config::{
    ConfigLoader, ConfigOverrides, MAX_THREADS, MIN_POLL_INTERVAL_SECS,
};
use kira_species::domain::{BlastDatabase, BlastProgram, FailurePolicy, RowOrder};
use kira_species::error::SpeciesError;
use kira_species::output::{JsonOutput, OutputMode};
use kira_species::resolver::BlastSpeciesResolver;

#[derive(Parser)]
#[command(name = "kira-species")]
#[command(about = "Annotate FASTA/FASTQ reads with the species of their top BLAST hit")]
#[command(version, author)]
struct Cli {
    /// FASTA or FASTQ file to annotate
    #[arg(long)]
    input_path: Utf8PathBuf,

    /// CSV file to write
    #[arg(long)]
    output_path: Utf8PathBuf,

    /// Number of concurrent BLAST searches
    #[arg(long, value_parser = parse_threads)]
    threads: Option<usize>,

    #[arg(long, value_enum)]
    order: Option<RowOrder>,

    #[arg(long, value_enum)]
    on_error: Option<FailurePolicy>,

    /// Prepend a read_id column to the table
    #[arg(long)]
    with_read_id: bool,

    #[arg(long, value_enum)]
    program: Option<BlastProgram>,

    #[arg(long)]
    database: Option<BlastDatabase>,

    /// Seconds between BLAST status checks
    #[arg(long, value_parser = clap::value_parser!(u64).range(MIN_POLL_INTERVAL_SECS..))]
    poll_interval: Option<u64>,

    /// Optional JSON config file
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[arg(long)]
    non_interactive: bool,
}

fn parse_threads(value: &str) -> Result<usize, String> {
    let threads: usize = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !(1..=MAX_THREADS).contains(&threads) {
        return Err(format!("threads must be between 1 and {MAX_THREADS}"));
    }
    Ok(threads)
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SpeciesError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SpeciesError) -> u8 {
    if error.is_input_error() {
        2
    } else if error.is_resolution_error() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let bar = match output_mode {
        OutputMode::Interactive => ProgressBar::new(0),
        OutputMode::NonInteractive => ProgressBar::hidden(),
    };
    let log_bar = bar.clone();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(move || BarWriter {
            bar: log_bar.clone(),
        })
        .init();

    let overrides = ConfigOverrides {
        program: cli.program,
        database: cli.database,
        poll_interval_secs: cli.poll_interval,
        threads: cli.threads,
        order: cli.order,
        on_error: cli.on_error,
        with_read_id: cli.with_read_id,
    };
    let config_path = cli.config.as_deref().map(|path| path.as_std_path());
    let resolved = ConfigLoader::resolve(config_path, overrides)?;
    info!(
        program = %resolved.service.program,
        database = %resolved.service.database,
        threads = resolved.pipeline.threads,
        "configuration resolved"
    );

    let client = BlastHttpClient::new(resolved.service)?;
    let app = App::new(BlastSpeciesResolver::new(client), resolved.pipeline);

    match output_mode {
        OutputMode::Interactive => {
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )
                .into_diagnostic()?,
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            let sink = BarProgress { bar };
            let result = app.run(&cli.input_path, &cli.output_path, &sink);
            sink.bar.finish_and_clear();
            print_summary(&result?);
        }
        OutputMode::NonInteractive => {
            let summary = app.run(&cli.input_path, &cli.output_path, &LogProgress)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
    }
    Ok(())
}

/// Writes log lines to stderr with the progress bar cleared out of the way.
struct BarWriter {
    bar: ProgressBar,
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

struct BarProgress {
    bar: ProgressBar,
}

impl ProgressSink for BarProgress {
    fn event(&self, event: ProgressEvent) {
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.completed as u64);
        self.bar.set_message(event.message);
    }
}

struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        info!(
            completed = event.completed,
            total = event.total,
            "{}",
            event.message
        );
    }
}

fn print_summary(summary: &AnnotationSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-SPECIES summary{reset}");
    println!("{green}Reads annotated: {}{reset}", summary.total);
    println!("{green}  matched:   {}{reset}", summary.matched);
    println!("{yellow}  no match:  {}{reset}", summary.no_match);
    println!("{yellow}  malformed: {}{reset}", summary.malformed);
    let failed_color = if summary.failed > 0 { red } else { green };
    println!("{failed_color}  failed:    {}{reset}", summary.failed);
    println!("{cyan}Table written to {}{reset}", summary.output_path);
}
