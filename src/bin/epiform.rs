//! Epiform CLI - Command-line interface for Epiform
//!
//! Commands:
//! - detect: List the random walk terms of a formula
//! - parse: Resolve random walk terms against a dataset (backend payload)
//! - strip: Print a formula without its random walk terms
//! - schema: Describe the dataset input and payload output formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use epiform::dataset::Dataset;
use epiform::formula::Formula;
use epiform::pipeline::TermProcessor;
use epiform::types::BackendPayload;
use epiform::{ParseConfig, TermError, EPIFORM_VERSION};

/// Epiform - Random walk terms for renewal-equation models
#[derive(Parser)]
#[command(name = "epiform")]
#[command(version = EPIFORM_VERSION)]
#[command(about = "Resolve rw() formula terms into sparse design matrices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the random walk terms of a formula
    Detect {
        /// Model formula, e.g. "R(country, date) ~ 1 + rw(gr = country)"
        #[arg(short, long)]
        formula: String,
    },

    /// Parse random walk terms against a dataset
    Parse {
        /// Model formula
        #[arg(short, long)]
        formula: String,

        /// Dataset JSON file (use - for stdin)
        #[arg(short, long)]
        data: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Prior scale for terms that do not set one
        #[arg(long)]
        prior_scale: Option<f64>,

        /// Group name used for terms without a group column
        #[arg(long)]
        synthetic_group: Option<String>,
    },

    /// Print a formula without its random walk terms
    Strip {
        /// Model formula
        #[arg(short, long)]
        formula: String,
    },

    /// Print the dataset and payload formats
    Schema,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

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

fn run(cli: Cli) -> Result<(), EpiformCliError> {
    match cli.command {
        Commands::Detect { formula } => cmd_detect(&formula),

        Commands::Parse {
            formula,
            data,
            output,
            output_format,
            prior_scale,
            synthetic_group,
        } => {
            let mut config = ParseConfig::default();
            if let Some(scale) = prior_scale {
                config = config.with_default_prior_scale(scale)?;
            }
            if let Some(name) = synthetic_group {
                config = config.with_synthetic_group(name);
            }
            cmd_parse(&formula, &data, &output, output_format, config)
        }

        Commands::Strip { formula } => cmd_strip(&formula),

        Commands::Schema => {
            cmd_schema();
            Ok(())
        }
    }
}

fn cmd_detect(formula: &str) -> Result<(), EpiformCliError> {
    let labels = TermProcessor::new().detect(formula)?;
    println!("{}", serde_json::to_string(&labels)?);
    Ok(())
}

fn cmd_parse(
    formula: &str,
    data: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: ParseConfig,
) -> Result<(), EpiformCliError> {
    let formula = Formula::parse(formula)?;

    // Read input
    let dataset_json = if data.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(EpiformCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(data)?
    };
    let dataset = Dataset::from_json(&dataset_json)?;

    let payload = TermProcessor::with_config(config).payload(&formula, &dataset)?;

    // Write output
    let output_data = format_output(&payload, &output_format)?;
    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_strip(formula: &str) -> Result<(), EpiformCliError> {
    let formula = Formula::parse(formula)?;
    println!("{}", formula.without_random_walks());
    Ok(())
}

fn cmd_schema() {
    println!("Dataset input (JSON)");
    println!();
    println!("{{");
    println!("  \"date_column\": \"date\",            (optional, default \"date\")");
    println!("  \"columns\": [");
    println!("    {{ \"name\": \"date\", \"type\": \"date\", \"values\": [\"2020-02-22\", ...] }},");
    println!("    {{ \"name\": \"week\", \"type\": \"integer\", \"values\": [8, ...] }},");
    println!("    {{ \"name\": \"temp\", \"type\": \"real\", \"values\": [12.5, ...] }},");
    println!("    {{ \"name\": \"region\", \"type\": \"text\", \"values\": [\"A\", ...] }},");
    println!("    {{ \"name\": \"country\", \"type\": \"factor\", \"levels\": [\"Italy\", \"UK\"], \"values\": [\"UK\", ...] }}");
    println!("  ]");
    println!("}}");
    println!();
    println!("Payload output (JSON)");
    println!();
    println!("- producer, version: Producer name and version");
    println!("- formula: Canonical formula text");
    println!("- fixed_effects_formula: Formula with random walk terms removed");
    println!("- labels: Random walk term labels in formula order");
    println!("- num_terms: Number of random walk terms");
    println!("- num_processes: Processes per term");
    println!("- periods_per_process: Periods per process, all terms end to end");
    println!("- prior_scale: Prior scale per process");
    println!("- num_coefficients: Total design matrix columns");
    println!("- coefficient_names: label[time,group] per column");
    println!("- design: {{ rows, cols, w, v, u }} 1-based CSR parts");
}

// Helper functions

fn format_output(payload: &BackendPayload, format: &OutputFormat) -> Result<String, EpiformCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(payload)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(payload)?),
    }
}

// Error handling

#[derive(Debug)]
enum EpiformCliError {
    Io(io::Error),
    Term(TermError),
    Json(serde_json::Error),
    NoInput,
}

impl From<io::Error> for EpiformCliError {
    fn from(e: io::Error) -> Self {
        EpiformCliError::Io(e)
    }
}

impl From<TermError> for EpiformCliError {
    fn from(e: TermError) -> Self {
        EpiformCliError::Term(e)
    }
}

impl From<serde_json::Error> for EpiformCliError {
    fn from(e: serde_json::Error) -> Self {
        EpiformCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EpiformCliError> for CliError {
    fn from(e: EpiformCliError) -> Self {
        match e {
            EpiformCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EpiformCliError::Term(e) => {
                let hint = match &e {
                    TermError::InvalidFormula(_) => "Formulas look like 'R(country, date) ~ 1 + rw(gr = country)'",
                    TermError::InvalidTerm { .. } => "rw() accepts time, gr and prior_scale",
                    TermError::UnknownColumn { .. } => "Check the column names in the dataset",
                    TermError::InvalidDataset(_) => "Run 'epiform schema' for the dataset format",
                    TermError::InvalidConfig(_) => "--prior-scale must be a positive number",
                    TermError::RowCountMismatch { .. } | TermError::JsonError(_) => "Check input format",
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            EpiformCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EpiformCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No dataset piped to stdin".to_string(),
                hint: Some("Pipe a dataset JSON file or pass --data FILE".to_string()),
            },
        }
    }
}
