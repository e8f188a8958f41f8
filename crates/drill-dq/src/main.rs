//! CLI entry point for the drilling data-quality engine.

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{Args as ClapArgs, Parser, Subcommand};
use dotenv::dotenv;
use drill_dq::{
    AnomalySummary, ApplyActions, ApplyRequest, ApplyResult, CleansingPreview, ColumnProfile,
    DedupOptions, EngineConfig, FlaggedRows, Overview, QualityService, StepOptions, Table,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    author = "Drill DQ Team",
    version,
    about = "Data-quality profiling, cleansing and anomaly detection for drilling CSVs",
    long_about = "Profile, cleanse and scan a drilling dataset for anomalies.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  DRILL_DQ_PERSIST_DIR    Directory that receives a copy of each loaded CSV\n\n\
                  EXAMPLES:\n  \
                  # Column profile\n  \
                  drill-dq profile wells.csv\n\n  \
                  # Preview a full cleanse without keeping it\n  \
                  drill-dq clean wells.csv --dedup --standardize --impute --dry-run\n\n  \
                  # Cleanse and export\n  \
                  drill-dq clean wells.csv --dedup --subset well,depth --impute --export out/\n\n  \
                  # Anomaly report with the first 20 flagged rows as JSON\n  \
                  drill-dq --json anomalies wells.csv --rows 20"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output JSON to stdout instead of human-readable tables
    ///
    /// Disables all logging so stdout holds only the JSON document.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write each loaded CSV into this directory
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Fence width in interquartile ranges
    #[arg(long, default_value = "1.5", global = true)]
    iqr_multiplier: f64,

    /// Expected share of anomalous rows for the Isolation Forest
    #[arg(long, default_value = "0.02", global = true)]
    contamination: f64,

    /// Seed for the Isolation Forest
    #[arg(long, default_value = "42", global = true)]
    seed: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-column null, distinct, range and z-score outlier statistics
    Profile(InputArgs),

    /// What cleansing would change: duplicates, missing values, suggestions
    Preview(InputArgs),

    /// Run deduplicate → standardize → impute and report the impact
    Clean(CleanArgs),

    /// IQR and Isolation Forest anomaly report
    Anomalies(AnomalyArgs),

    /// Completeness, uniqueness and quality score
    Overview(InputArgs),
}

#[derive(ClapArgs, Debug)]
struct InputArgs {
    /// Path to the CSV file
    input: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct CleanArgs {
    /// Path to the CSV file
    input: PathBuf,

    /// Remove duplicate rows, keeping the first
    #[arg(long)]
    dedup: bool,

    /// Columns that define a duplicate (default: all columns)
    #[arg(long, value_delimiter = ',', requires = "dedup")]
    subset: Vec<String>,

    /// Add canonical alias and unit-converted columns
    #[arg(long)]
    standardize: bool,

    /// Fill missing values by median (numeric) or mode (other)
    #[arg(long)]
    impute: bool,

    /// Report the impact without keeping the result
    #[arg(long)]
    dry_run: bool,

    /// Write the cleansed CSV to this file, or into this directory
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct AnomalyArgs {
    /// Path to the CSV file
    input: PathBuf,

    /// Also list up to N flagged rows
    #[arg(long, value_name = "N")]
    rows: Option<usize>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
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
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    dotenv().ok();

    let service = build_service(&cli)?;

    match &cli.command {
        Command::Profile(args) => {
            let id = load(&service, &args.input)?;
            let profiles = service.profile(Some(&id))?;
            emit(cli.json, &profiles, print_profiles)
        }
        Command::Preview(args) => {
            let id = load(&service, &args.input)?;
            let preview = service.cleansing_preview(Some(&id))?;
            emit(cli.json, &preview, print_preview)
        }
        Command::Clean(args) => run_clean(&service, args, cli.json),
        Command::Anomalies(args) => {
            let id = load(&service, &args.input)?;
            let summary = service.anomaly_summary(Some(&id))?;
            let rows = args
                .rows
                .map(|limit| service.anomaly_rows(Some(&id), Some(limit)))
                .transpose()?;
            emit(cli.json, &AnomalyReport { summary, rows }, print_anomalies)
        }
        Command::Overview(args) => {
            let id = load(&service, &args.input)?;
            let overview = service.overview(Some(&id))?;
            emit(cli.json, &overview, print_overview)
        }
    }
}

fn build_service(cli: &Cli) -> Result<QualityService> {
    let mut builder = EngineConfig::builder()
        .iqr_multiplier(cli.iqr_multiplier)
        .contamination(cli.contamination)
        .random_seed(cli.seed);

    let persist_dir = cli
        .persist_dir
        .clone()
        .or_else(|| std::env::var("DRILL_DQ_PERSIST_DIR").ok().map(PathBuf::from));
    if let Some(dir) = persist_dir {
        builder = builder.persist_dir(dir);
    }

    let config = builder.build()?;
    debug!("Engine configuration: {:?}", config);

    QualityService::builder()
        .config(config)
        .build()
        .map_err(|e| anyhow!("Failed to build service: {}", e))
}

/// Parse the CSV and store it, returning the dataset id.
fn load(service: &QualityService, path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }

    info!("Loading dataset from: {}", path.display());
    let table = Table::from_csv_path(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    let receipt = service.upload(table, name);
    info!(
        "Dataset loaded: {} rows x {} columns",
        receipt.rows,
        receipt.columns.len()
    );
    match &receipt.persistence {
        drill_dq::PersistStatus::Failed { reason } => warn!("Raw copy not written: {}", reason),
        drill_dq::PersistStatus::Written { path } => info!("Raw copy written to {}", path.display()),
        drill_dq::PersistStatus::Disabled => {}
    }
    Ok(receipt.dataset_id)
}

fn run_clean(service: &QualityService, args: &CleanArgs, json: bool) -> Result<()> {
    let actions = ApplyActions {
        deduplicate: args.dedup.then(|| DedupOptions {
            subset: (!args.subset.is_empty()).then(|| args.subset.clone()),
        }),
        standardize: args.standardize.then(StepOptions::default),
        impute: args.impute.then(StepOptions::default),
    };
    if actions.is_empty() {
        warn!("No cleansing step selected; use --dedup, --standardize or --impute");
    }

    let id = load(service, &args.input)?;
    let result = service.apply(ApplyRequest {
        dataset_id: Some(id),
        actions,
        dry_run: args.dry_run,
    })?;

    if let Some(target) = &args.export {
        match &result.new_dataset_id {
            Some(new_id) => {
                let path = export_path(target);
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, service.export_csv(Some(new_id))?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Exported cleansed dataset to {}", path.display());
            }
            None => warn!("Dry run: nothing exported"),
        }
    }

    emit(json, &result, print_apply)
}

/// A directory target gets a timestamped file name.
fn export_path(target: &Path) -> PathBuf {
    if target.is_dir() {
        target.join(format!(
            "drill_dq_export_{}.csv",
            Local::now().format("%Y%m%d_%H%M%S")
        ))
    } else {
        target.to_path_buf()
    }
}

#[derive(Debug, Serialize)]
struct AnomalyReport {
    summary: AnomalySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<FlaggedRows>,
}

/// Print `value` as JSON, or through `human`.
fn emit<T: Serialize>(json: bool, value: &T, human: fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

// Human-readable output uses println! directly: it is the command's result,
// not a log line, and must show regardless of log level.

fn heading(title: &str) {
    println!();
    println!("{}", "=".repeat(80));
    println!("{}", title);
    println!("{}", "=".repeat(80));
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_profiles(profiles: &Vec<ColumnProfile>) {
    heading("COLUMN PROFILES");
    println!(
        "{:<24} {:<8} {:>8} {:>8} {:>12} {:>12} {:>8}",
        "Column", "Kind", "Null %", "Uniq %", "Min", "Max", "|z|>3"
    );
    println!("{}", "-".repeat(80));
    for p in profiles {
        println!(
            "{:<24} {:<8} {:>8.2} {:>8.2} {:>12} {:>12} {:>8}",
            truncate_str(&p.column, 23),
            p.kind,
            p.null_pct,
            p.unique_pct,
            fmt_opt(p.min),
            fmt_opt(p.max),
            p.outlier_count
        );
        if let Some(note) = &p.note {
            println!("    note: {}", note);
        }
    }
}

fn print_preview(preview: &CleansingPreview) {
    heading("CLEANSING PREVIEW");
    let stats = &preview.stats;
    println!("  Rows:                 {}", stats.rows);
    println!("  Duplicate rows:       {}", stats.duplicates);
    println!("  Columns with missing: {}", stats.columns_with_missing);
    println!("  Mean missing %:       {:.2}", stats.missing_pct);
    println!("  Completeness %:       {:.2}", stats.completeness_pct);
    println!();
    println!("MISSING BY COLUMN");
    println!("{}", "-".repeat(40));
    for col in preview.missing_by_column.iter().filter(|c| c.missing > 0) {
        println!("  {:<24} {:>6} ({:.2}%)", truncate_str(&col.column, 23), col.missing, col.pct);
    }
    println!();
    println!("SUGGESTIONS");
    println!("{}", "-".repeat(40));
    for suggestion in &preview.suggestions {
        println!("  - {}", suggestion);
    }
    println!();
    println!("STANDARDIZATION TARGETS");
    println!("{}", "-".repeat(40));
    for target in &preview.standardization_targets {
        println!("  - {}", target);
    }
}

fn print_apply(result: &ApplyResult) {
    heading(if result.dry_run {
        "CLEANSING DRY RUN"
    } else {
        "CLEANSING APPLIED"
    });
    for step in &result.applied {
        println!("  - {}", step);
    }
    if let Some(report) = &result.standardize {
        for alias in &report.applied_aliases {
            println!("    alias {} <- {}", alias.canonical, alias.source);
        }
        for unit in &report.applied_units {
            println!(
                "    unit {} <- {} x {} (+{}), {} cells not numeric",
                unit.derived, unit.source, unit.multiplier, unit.offset, unit.failed_cells
            );
        }
    }
    for imputation in &result.imputations {
        println!(
            "    filled {} in {} ({:?})",
            imputation.filled, imputation.column, imputation.method
        );
    }

    let k = &result.kpis;
    println!();
    println!("{:<20} {:>12} {:>12}", "KPI", "Before", "After");
    println!("{}", "-".repeat(46));
    println!("{:<20} {:>12} {:>12}", "Rows", k.rows_before, k.rows_after);
    println!(
        "{:<20} {:>12} {:>12}",
        "Duplicates", k.duplicates_before, k.duplicates_after
    );
    println!(
        "{:<20} {:>12.2} {:>12.2}",
        "Completeness %", k.completeness_before_pct, k.completeness_after_pct
    );
    if let Some(id) = &result.new_dataset_id {
        println!();
        println!("  New dataset id: {}", id);
    }
}

fn print_anomalies(report: &AnomalyReport) {
    let s = &report.summary;
    heading("ANOMALY SUMMARY");
    println!("  Shape:          {} rows x {} columns", s.shape.rows, s.shape.columns);
    println!(
        "  Missing:        {} cells ({:.2}%)",
        s.missing.total_missing, s.missing.pct_missing
    );
    println!(
        "  Duplicates:     {} rows ({:.2}%)",
        s.duplicates.row_duplicates, s.duplicates.row_duplicates_pct
    );
    println!("  IQR flagged:    {} rows", s.outliers.n_rows_flagged);
    if s.iforest.available {
        println!(
            "  Model flagged:  {} rows ({:.2}%)",
            s.iforest.n_rows_flagged, s.iforest.pct_rows_flagged
        );
    } else if let Some(note) = &s.iforest.note {
        println!("  Model:          {}", note);
    }
    println!("  Either:         {} rows", s.n_rows_flagged_union);
    if !s.columns.constants.is_empty() {
        println!("  Constant:       {}", s.columns.constants.join(", "));
    }

    println!();
    println!("{:<24} {:>14} {:>14} {:>8}", "Column", "Lower", "Upper", "Count");
    println!("{}", "-".repeat(64));
    for b in &s.outliers.per_column {
        println!(
            "{:<24} {:>14.3} {:>14.3} {:>8}",
            truncate_str(&b.column, 23),
            b.lower,
            b.upper,
            b.count
        );
    }

    if let Some(rows) = &report.rows {
        println!();
        println!(
            "FLAGGED ROWS ({} of {})",
            rows.rows.len(),
            rows.total_flagged
        );
        println!("{}", "-".repeat(40));
        for row in &rows.rows {
            let tags: Vec<String> = row
                .attribution
                .iter()
                .map(|(col, tags)| format!("{}={}", col, tags.label()))
                .collect();
            println!(
                "  row {:>6}  iqr={:<5} iforest={:<5} {}",
                row.row_index,
                row.is_outlier_iqr,
                row.is_outlier_iforest,
                tags.join(" ")
            );
        }
    }
}

fn print_overview(overview: &Overview) {
    heading("DATA QUALITY OVERVIEW");
    println!("  Rows:           {}", overview.rows);
    println!("  Columns:        {}", overview.columns);
    println!("  Completeness:   {:.1}%", overview.completeness_pct);
    println!("  Uniqueness:     {:.1}%", overview.uniqueness_pct);
    println!("  Quality score:  {:.1}", overview.quality_score);
    println!();
    println!("COLUMN TYPES");
    println!("{}", "-".repeat(40));
    for (bucket, count) in &overview.column_type_distribution {
        println!("  {:<10} {}", bucket, count);
    }
}
