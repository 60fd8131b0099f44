//! CLI entry point for the omics QC pipeline.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use qcp_omics::steps::{MethodRule, registry};
use qcp_omics::{Pipeline, ReportWriter, RunMetadata, RunReport, StepOutput};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Quality control and preprocessing for tabular omics data",
    long_about = "Runs an ordered list of QC, preprocessing and analysis steps over a \
                  genomics, proteomics or clinical table.\n\n\
                  EXAMPLES:\n  \
                  # Run the steps listed in the metadata file\n  \
                  qcp-omics -i cohort.csv -m metadata.json\n\n  \
                  # Accept a shape warning and save the report\n  \
                  qcp-omics -i cohort.tsv -m metadata.json --yes --emit-report reports/\n\n  \
                  # Show every registered step\n  \
                  qcp-omics --list-steps"
)]
struct Args {
    /// Path to the CSV/TSV table (first column holds the index)
    #[arg(short, long, required_unless_present = "list_steps")]
    input: Option<String>,

    /// Path to the JSON run metadata
    #[arg(short, long, required_unless_present = "list_steps")]
    metadata: Option<String>,

    /// Field separator
    ///
    /// Defaults to tab for .tsv/.tab/.txt files and comma otherwise
    #[arg(long)]
    sep: Option<char>,

    /// Proceed even when the table's shape contradicts `features_cols`
    #[arg(short, long)]
    yes: bool,

    /// Run the plan as given: unknown steps are skipped with a warning
    #[arg(long)]
    skip_plan_validation: bool,

    /// Print the step registry and exit
    #[arg(long)]
    list_steps: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the JSON report to stdout instead of a human-readable summary
    ///
    /// Disables all logs. Useful for piping: `... --json | jq .state`
    #[arg(long)]
    json: bool,

    /// Write the JSON report into this directory as <input_name>_report.json
    #[arg(short = 'r', long, value_name = "DIR")]
    emit_report: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if args.list_steps {
        print_registry();
        return Ok(());
    }

    let (Some(input), Some(metadata_path)) = (args.input.as_deref(), args.metadata.as_deref())
    else {
        return Err(anyhow!("--input and --metadata are required"));
    };

    if !Path::new(input).exists() {
        return Err(anyhow!("Input file not found: {}", input));
    }

    let metadata = RunMetadata::from_path(Path::new(metadata_path))
        .with_context(|| format!("Failed to load metadata from {}", metadata_path))?;

    let separator = resolve_separator(input, args.sep)?;
    info!("Loading dataset from: {}", input);
    let data = load_table(input, separator)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let mut builder = Pipeline::builder()
        .confirm_shape(args.yes)
        .validate_plan(!args.skip_plan_validation);

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    let pipeline = builder.build()?;

    match pipeline.run(data, &metadata) {
        Ok(report) => handle_output(&report, input, &args),
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            } else if let Some(violations) = e.violations() {
                for violation in violations {
                    error!("{}", violation);
                }
            }
            if e.is_recoverable() {
                error!("Re-run with --yes to continue anyway");
            }
            Err(anyhow!("Pipeline failed: {}", e))
        }
    }
}

/// Explicit separator, or one guessed from the file extension.
fn resolve_separator(path: &str, explicit: Option<char>) -> Result<u8> {
    if let Some(sep) = explicit {
        return u8::try_from(sep).map_err(|_| anyhow!("Separator must be a single-byte character"));
    }
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    Ok(match extension.as_deref() {
        Some("tsv" | "tab" | "txt") => b'\t',
        _ => b',',
    })
}

fn load_table(path: &str, separator: u8) -> Result<DataFrame> {
    debug!("Reading {} with separator {:?}", path, separator as char);
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"')),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .map_err(|e| anyhow!("Failed to read {}: {}", path, e))
}

/// Handle pipeline output based on CLI flags.
///
/// - Default: print a human-readable summary
/// - `--json`: print the JSON report only
/// - `--emit-report`: also write the report to a file
fn handle_output(report: &RunReport, input: &str, args: &Args) -> Result<()> {
    if let Some(dir) = &args.emit_report {
        std::fs::create_dir_all(dir)?;
        let writer = ReportWriter::new(dir);
        let path = writer.write(report, &extract_file_stem(input))?;
        info!("Report written to: {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    print_summary(report, input);
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

fn print_registry() {
    println!("{:<32} {:<15} {}", "Step", "Category", "Methods");
    println!("{}", "-".repeat(80));
    for def in registry().steps() {
        let methods = match def.method {
            MethodRule::Forbidden => "-".to_string(),
            MethodRule::Any { required } => {
                format!("any{}", if required { " (required)" } else { "" })
            }
            MethodRule::OneOf { values, required } => {
                format!("{}{}", values.join(" | "), if required { " (required)" } else { "" })
            }
        };
        println!("{:<32} {:<15} {}", def.name, def.category.display_name(), methods);
    }
}

/// Short description of a step's structured output.
fn describe_output(output: &StepOutput) -> String {
    match output {
        StepOutput::MissingValues { columns } => {
            format!("{} column(s) with missing values", columns.len())
        }
        StepOutput::MissingValuesHandled(r) => format!(
            "{} column(s) dropped, {} imputed",
            r.dropped.len(),
            r.imputed.len()
        ),
        StepOutput::Outliers { columns } | StepOutput::OutliersHandled { columns, .. } => {
            let cells: usize = columns.iter().map(|c| c.cells.len()).sum();
            format!("{} outlier(s) in {} column(s)", cells, columns.len())
        }
        StepOutput::TrainTestSplit {
            train_samples,
            test_samples,
            ..
        } => format!("{} train / {} test samples", train_samples, test_samples),
        StepOutput::DimensionalityReduction { result, .. } => {
            format!("{} component(s)", result.explained_variance.len())
        }
        StepOutput::Plot { .. } => "plot".to_string(),
        StepOutput::DescriptiveStatistics { columns } => {
            format!("statistics for {} column(s)", columns.len())
        }
        StepOutput::Correlation { matrix, .. } => {
            format!("{} matrix over {} column(s)", matrix.method, matrix.columns.len())
        }
        StepOutput::Distributions { histograms } => {
            format!("{} histogram(s)", histograms.len())
        }
        StepOutput::NoColumns { reason } => reason.clone(),
    }
}

/// Human-readable summary, the default output.
fn print_summary(report: &RunReport, input: &str) {
    let (rows, columns) = report.final_data.shape();

    println!();
    println!("{}", "=".repeat(80));
    println!("RUN COMPLETE ({:?} dataset)", report.metadata.dataset_type);
    println!("{}", "=".repeat(80));
    println!();
    println!("Input:  {}", input);
    println!("Result: {} samples x {} features", rows, columns);
    if let Some(held_out) = &report.held_out {
        println!("Held out: {} test samples", held_out.shape().0);
    }
    println!("Duration: {}ms", report.duration_ms);
    println!();

    println!("Steps:");
    for (i, entry) in report.steps.iter().enumerate() {
        let method = entry
            .method
            .as_deref()
            .map(|m| format!(" [{}]", m))
            .unwrap_or_default();
        match &entry.output {
            Some(output) => println!("  {}. {}{}: {}", i + 1, entry.step, method, describe_output(output)),
            None => println!("  {}. {}{}", i + 1, entry.step, method),
        }
    }
    println!();

    if !report.skipped_steps.is_empty() {
        println!("Skipped (not recognised):");
        for step in &report.skipped_steps {
            println!("  ! {}", step);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report <DIR> to save the JSON report");
    println!("{}", "=".repeat(80));
}
