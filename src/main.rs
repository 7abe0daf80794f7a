use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, subscriber::set_global_default};
use tracing_subscriber::EnvFilter;

use sheet_merge::MergeError;
use sheet_merge::config::AppConfig;
use sheet_merge::coordinator::{AddOutcome, Coordinator};
use sheet_merge::header::HeaderDescriptor;
use sheet_merge::ingestion::TracingObserver;
use sheet_merge::output::SaveFailure;
use sheet_merge::pipeline::{DecisionProvider, MergePipeline, PipelineOutcome};

const IDLE_POLL: Duration = Duration::from_millis(500);

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    let _ = set_global_default(subscriber);
}

#[derive(Parser)]
#[command(version, about = "Merge spreadsheet and CSV files into one table")]
pub struct Opts {
    /// Input files or folders (folders are scanned non-recursively).
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output path; `.csv` writes CSV, anything else XLSX. Prompted for when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use the header of the N-th section (1-based) when headers differ.
    #[arg(long, value_name = "N")]
    pub header: Option<usize>,

    /// Drop duplicate rows without asking.
    #[arg(long, conflicts_with = "keep_duplicates")]
    pub dedupe: bool,

    /// Keep duplicate rows without asking.
    #[arg(long)]
    pub keep_duplicates: bool,

    /// JSON configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the merge report as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Increase verbosity (-v, -vv). Default INFO.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Decrease verbosity (-q).
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

fn main() {
    let opts = Opts::parse();
    init_tracing(opts.verbose.saturating_add(1).saturating_sub(opts.quiet));
    if let Err(e) = run(opts) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let config = match &opts.config {
        Some(path) => AppConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    let mut options = config.coordinator_options()?;
    options.load.observer = Some(Arc::new(TracingObserver));

    let mut coordinator = Coordinator::new(options);
    for path in &opts.paths {
        if path.is_dir() {
            match coordinator.add_folder(path) {
                Ok(_) => {}
                Err(e @ MergeError::NoSupportedFiles { .. }) => tracing::warn!("{e}"),
                Err(e) => return Err(e.into()),
            }
        } else if coordinator.add_file(path) == AddOutcome::Unsupported {
            eprintln!("skipping {}: unsupported file type", path.display());
        }
    }

    while !coordinator.wait_idle(IDLE_POLL) {
        tracing::debug!(loading = coordinator.loading_count(), "waiting for loads");
    }
    print_entries(&coordinator);

    let files = coordinator.merge_input()?;
    let pipeline = MergePipeline::new(files, coordinator.default_output_path());
    let mut decisions = PromptDecisions::from_opts(&opts);

    match pipeline.run_with(&mut decisions) {
        PipelineOutcome::Saved { path, report } => {
            println!("{report}");
            println!("saved {} rows to {}", report.final_rows, path.display());
            if let Some(report_path) = &opts.report {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(report_path, json)
                    .with_context(|| format!("writing report {}", report_path.display()))?;
            }
        }
        PipelineOutcome::EmptyResult => {
            println!("merged result is empty; check the input files");
        }
        PipelineOutcome::Cancelled(reason) => {
            println!("merge cancelled: {reason:?}");
        }
    }
    tracing::debug!(metrics = %coordinator.metrics().snapshot(), "done");
    Ok(())
}

fn print_entries(coordinator: &Coordinator) {
    for entry in coordinator.entries() {
        println!("{:>8}  {}", entry.rows_display(), entry.path.display());
    }
    println!(
        "{} file(s), {} row(s) total",
        coordinator.file_count(),
        coordinator.total_rows()
    );
}

/// Answers pipeline questions from flags first, then from stdin.
struct PromptDecisions {
    header: Option<usize>,
    dedupe: Option<bool>,
    output: Option<PathBuf>,
}

impl PromptDecisions {
    fn from_opts(opts: &Opts) -> Self {
        let dedupe = match (opts.dedupe, opts.keep_duplicates) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Self {
            header: opts.header,
            dedupe,
            output: opts.output.clone(),
        }
    }
}

/// Print `prompt` and read one trimmed line; `None` on end of input or a read error.
fn ask(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

impl DecisionProvider for PromptDecisions {
    fn choose_header(&mut self, descriptors: &[HeaderDescriptor]) -> Option<Vec<String>> {
        println!("section headers differ:");
        for (i, d) in descriptors.iter().enumerate() {
            println!("  [{}] {}", i + 1, d.summary());
        }
        let index = match self.header.take() {
            Some(n) => n,
            None => ask("use header number (empty to cancel): ")?.parse().ok()?,
        };
        index
            .checked_sub(1)
            .and_then(|i| descriptors.get(i))
            .map(|d| d.headers.clone())
    }

    fn confirm_dedupe(&mut self, duplicates: usize, rows: usize) -> bool {
        if let Some(choice) = self.dedupe {
            return choice;
        }
        let answer = ask(&format!(
            "{duplicates} of {rows} rows are exact duplicates. Remove them? [Y/n] "
        ));
        !matches!(answer.as_deref(), Some("n" | "N" | "no"))
    }

    fn choose_save_path(
        &mut self,
        default_path: &Path,
        last_failure: Option<&SaveFailure>,
    ) -> Option<PathBuf> {
        if let Some(failure) = last_failure {
            eprintln!("could not save to {}: {}", failure.path.display(), failure.message);
        }
        if let Some(path) = self.output.take() {
            return Some(path);
        }
        let answer = ask(&format!("save to [{}] (\"-\" to skip): ", default_path.display()))?;
        match answer.as_str() {
            "-" => None,
            "" => Some(default_path.to_path_buf()),
            other => Some(PathBuf::from(other)),
        }
    }
}
