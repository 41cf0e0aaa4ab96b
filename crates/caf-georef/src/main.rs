use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use caf_georef_core::config::PipelineConfig;
use caf_georef_core::outputs::{DateStamp, WrittenFile};
use caf_georef_core::pipelines;
use caf_georef_core::rules::{cook_east_rules, Labeling, RowCountRule, ZoneSource};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cook Agronomy Farm georeference tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign every Cook East grid point its treatment for each year-span
    AssignTreatments(AssignArgs),
    /// Reproject and clean field boundaries and grid points into GeoJSON
    Standardize(RunArgs),
    /// Print the year-span rule table
    Rules {
        /// Last harvest year covered by the whole-field span
        #[arg(long)]
        end_year: Option<i32>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// TOML config; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory dataset paths are relative to
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Directory outputs are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Date stamp for output names (YYYYMMDD); defaults to today
    #[arg(long)]
    date: Option<String>,
}

#[derive(Args, Debug, Default)]
struct AssignArgs {
    #[command(flatten)]
    run: RunArgs,
    /// Last harvest year covered by the whole-field span
    #[arg(long)]
    end_year: Option<i32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::AssignTreatments(args) => handle_assign(args),
        Command::Standardize(args) => handle_standardize(args),
        Command::Rules { end_year } => {
            print_rules(end_year.unwrap_or(PipelineConfig::default().end_year));
            Ok(())
        }
    }
}

fn load_config(args: &RunArgs) -> Result<(PipelineConfig, DateStamp)> {
    dotenvy::dotenv().ok();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Ok(dir) = env::var("CAF_GEOREF_INPUT_DIR") {
        config.input_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = env::var("CAF_GEOREF_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }

    let stamp = match &args.date {
        Some(value) => DateStamp::parse(value).context("invalid --date")?,
        None => DateStamp::today(),
    };

    Ok((config, stamp))
}

fn handle_assign(args: AssignArgs) -> Result<()> {
    let (mut config, stamp) = load_config(&args.run)?;
    if let Some(end_year) = args.end_year {
        config.end_year = end_year;
    }

    info!(input_dir = %config.input_dir.display(), %stamp, "assigning treatments");
    let run = pipelines::run_treatment_assignment(&config, &stamp)
        .context("treatment assignment failed")?;

    let mut table = Table::new();
    table.set_header(vec!["Span", "Years", "Rows"]);
    for result in &run.assignment.results {
        table.add_row(vec![
            result.key.to_string(),
            result.span.to_string(),
            result.len().to_string(),
        ]);
    }
    println!("{table}");
    print_written(&run.written);
    Ok(())
}

fn handle_standardize(args: RunArgs) -> Result<()> {
    let (config, stamp) = load_config(&args)?;
    info!(input_dir = %config.input_dir.display(), %stamp, "standardizing layers");
    let written = pipelines::run_standardize(&config, &stamp).context("standardize failed")?;
    print_written(&written);
    Ok(())
}

fn print_written(written: &[WrittenFile]) {
    for file in written {
        println!("{}  {} bytes  blake3:{}", file.path.display(), file.bytes, file.blake3);
    }
}

fn print_rules(end_year: i32) {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Years", "Source", "Labeling", "Filter", "Count", "Note"]);

    for rule in cook_east_rules(end_year) {
        let source = match rule.source {
            ZoneSource::None => "none".to_string(),
            ZoneSource::Dataset => "dataset".to_string(),
            ZoneSource::ReusePrior { key } => format!("reuse {key}"),
            ZoneSource::Boundary => "field boundary".to_string(),
        };
        let labeling = match rule.labeling {
            Labeling::Constant {
                plot_id,
                treatment_id,
            } => format!("{plot_id} / {treatment_id}"),
            Labeling::BinaryZone {
                attribute,
                one_means,
                treatment_id,
            } => format!("{attribute}=1 -> {} / {treatment_id}", one_means.as_str()),
            Labeling::Composite { parts, remaps } => {
                let remaps: Vec<String> =
                    remaps.iter().map(|(from, to)| format!("{from}->{to}")).collect();
                format!("{} ({})", parts.join("+"), remaps.join(", "))
            }
        };
        let filter = rule
            .filter
            .map(|filter| format!("{} == {}", filter.attribute, filter.equals))
            .unwrap_or_default();
        let count = match rule.row_count {
            RowCountRule::Exact => "exact".to_string(),
            RowCountRule::Group(group) => format!("group {group}"),
        };

        table.add_row(vec![
            rule.key.to_string(),
            rule.span.to_string(),
            source,
            labeling,
            filter,
            count,
            rule.note.unwrap_or_default().to_string(),
        ]);
    }

    println!("{table}");
}
