//! Eisen CLI - Command-line interface for Eisen Layout
//!
//! Commands:
//! - normalize: Spread and center a batch of task records
//! - bias record: Fold placement corrections into a user's bias
//! - bias show: Print a user's current bias
//! - defaults: Print the default layout options as JSON

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use eisen_layout::bias::{BiasLearnerConfig, JsonFileBiasStore, PreferenceBiasLearner};
use eisen_layout::normalizer::LayoutOptions;
use eisen_layout::pipeline::{layout_tasks, LayoutOutcome};
use eisen_layout::types::{PlacementObservation, TaskRecord};
use eisen_layout::{LayoutError, EISEN_VERSION};

/// Eisen - Task placement engine for Eisenhower-matrix boards
#[derive(Parser)]
#[command(name = "eisen")]
#[command(version = EISEN_VERSION)]
#[command(about = "Normalize task placements and learn placement bias", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spread and center a batch of task records
    Normalize {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Layout options file (JSON, missing fields use defaults)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fail when more priority-order violations than this are reported
        #[arg(long)]
        max_violations: Option<usize>,
    },

    /// Manage learned placement bias
    Bias {
        #[command(subcommand)]
        command: BiasCommands,
    },

    /// Print the default layout options as JSON
    Defaults,
}

#[derive(Subcommand)]
enum BiasCommands {
    /// Record placement observations for a user
    Record {
        /// Bias store file (created if missing)
        #[arg(long)]
        store: PathBuf,

        /// User identifier
        #[arg(long)]
        user: String,

        /// Observations file, JSON array (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Learner options file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a user's current bias
    Show {
        /// Bias store file
        #[arg(long)]
        store: PathBuf,

        /// User identifier
        #[arg(long)]
        user: String,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of task records
    Json,
    /// Newline-delimited JSON (one task record per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Layout outcome as a single JSON object
    Json,
    /// Pretty-printed layout outcome
    JsonPretty,
    /// One placed task per line
    Ndjson,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EisenCliError> {
    match cli.command {
        Commands::Normalize {
            input,
            output,
            input_format,
            output_format,
            config,
            max_violations,
        } => cmd_normalize(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            max_violations,
        ),

        Commands::Bias { command } => match command {
            BiasCommands::Record {
                store,
                user,
                input,
                config,
            } => cmd_bias_record(&store, &user, &input, config.as_deref()),
            BiasCommands::Show { store, user } => cmd_bias_show(&store, &user),
        },

        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&LayoutOptions::default())?);
            Ok(())
        }
    }
}

fn cmd_normalize(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    max_violations: Option<usize>,
) -> Result<(), EisenCliError> {
    let options = match config {
        Some(path) => LayoutOptions::from_json(&fs::read_to_string(path)?)?,
        None => LayoutOptions::default(),
    };

    let input_data = read_input(input)?;
    let records: Vec<TaskRecord> = match input_format {
        InputFormat::Json => serde_json::from_str(&input_data)?,
        InputFormat::Ndjson => input_data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<TaskRecord>)
            .collect::<Result<_, _>>()?,
    };

    let outcome = layout_tasks(&records, &options)?;
    info!(
        tasks = outcome.tasks.len(),
        violations = outcome.violations,
        recentered = outcome.diagnostics.recentered,
        "normalized task layout"
    );

    let output_data = format_output(&outcome, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if let Some(limit) = max_violations {
        if !outcome.should_auto_apply(limit) {
            return Err(EisenCliError::TooManyViolations {
                found: outcome.violations,
                limit,
            });
        }
    }

    Ok(())
}

fn cmd_bias_record(
    store: &Path,
    user: &str,
    input: &Path,
    config: Option<&Path>,
) -> Result<(), EisenCliError> {
    let config = match config {
        Some(path) => BiasLearnerConfig::from_json(&fs::read_to_string(path)?)?,
        None => BiasLearnerConfig::default(),
    };

    let observations: Vec<PlacementObservation> = serde_json::from_str(&read_input(input)?)?;
    let learner = PreferenceBiasLearner::with_config(JsonFileBiasStore::new(store), config)?;

    match learner.record_observations(user, &observations)? {
        Some(bias) => println!("{}", serde_json::to_string_pretty(&bias)?),
        None => {
            warn!(user, "no observation exceeded the noise threshold; bias unchanged");
            println!("null");
        }
    }

    Ok(())
}

fn cmd_bias_show(store: &Path, user: &str) -> Result<(), EisenCliError> {
    let learner = PreferenceBiasLearner::new(JsonFileBiasStore::new(store));
    match learner.current_bias(user)? {
        Some(bias) => {
            println!("{}", serde_json::to_string_pretty(&bias)?);
            Ok(())
        }
        None => Err(EisenCliError::UnknownUser(user.to_string())),
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, EisenCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            info!("reading from interactive stdin; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output(outcome: &LayoutOutcome, format: &OutputFormat) -> Result<String, EisenCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(outcome)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(outcome)? + "\n"),
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for task in &outcome.tasks {
                lines.push(serde_json::to_string(task)?);
            }
            Ok(lines.join("\n") + "\n")
        }
    }
}

// Error types

#[derive(Debug)]
enum EisenCliError {
    Io(io::Error),
    Layout(LayoutError),
    Json(serde_json::Error),
    TooManyViolations { found: usize, limit: usize },
    UnknownUser(String),
}

impl From<io::Error> for EisenCliError {
    fn from(e: io::Error) -> Self {
        EisenCliError::Io(e)
    }
}

impl From<LayoutError> for EisenCliError {
    fn from(e: LayoutError) -> Self {
        EisenCliError::Layout(e)
    }
}

impl From<serde_json::Error> for EisenCliError {
    fn from(e: serde_json::Error) -> Self {
        EisenCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EisenCliError> for CliError {
    fn from(e: EisenCliError) -> Self {
        match e {
            EisenCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EisenCliError::Layout(LayoutError::InvalidOptions(msg)) => CliError {
                code: "INVALID_OPTIONS".to_string(),
                message: msg,
                hint: Some("Run 'eisen defaults' to see valid options".to_string()),
            },
            EisenCliError::Layout(LayoutError::Store(msg)) => CliError {
                code: "STORE_ERROR".to_string(),
                message: msg,
                hint: Some("Check the bias store file".to_string()),
            },
            EisenCliError::Layout(e) => CliError {
                code: "LAYOUT_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            EisenCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EisenCliError::TooManyViolations { found, limit } => CliError {
                code: "TOO_MANY_VIOLATIONS".to_string(),
                message: format!("{} priority-order violations (limit {})", found, limit),
                hint: Some("Review the layout before applying it".to_string()),
            },
            EisenCliError::UnknownUser(user) => CliError {
                code: "UNKNOWN_USER".to_string(),
                message: format!("No bias recorded for user {}", user),
                hint: Some("Record observations with 'eisen bias record' first".to_string()),
            },
        }
    }
}
