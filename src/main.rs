use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use conflict_stats::csv_reader;
use conflict_stats::data::RawTable;
use conflict_stats::parser::parse_dimension_list;
use conflict_stats::{CountryTable, Dataset, Dimension, Pipeline, PipelineConfig, Selection};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "conflict-stats")]
#[command(about = "Aggregate conflict-event tables into chart-ready statistics", long_about = None)]
struct Cli {
    /// JSON file with pipeline settings (year window, allow-list, bandwidth)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference table of in-scope countries, merged into the allow-list
    #[arg(long, global = true)]
    countries: Option<PathBuf>,

    /// Log every pipeline stage to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Input {
    /// CSV (or JSON array) file; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// How to read the table's columns
    #[arg(long, value_enum, default_value = "events")]
    dataset: Dataset,
}

#[derive(Args, Debug)]
struct Filter {
    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    subtype: Option<String>,

    #[arg(long)]
    event_type: Option<String>,
}

impl Filter {
    fn selection(&self) -> Selection {
        Selection {
            country: self.country.clone(),
            subtype: self.subtype.clone(),
            event_type: self.event_type.clone(),
        }
    }
}

/// Comma-separated grouping dimensions, e.g. `country,year`
#[derive(Debug, Clone)]
struct Dims(Vec<Dimension>);

fn parse_dims(s: &str) -> Result<Dims, String> {
    parse_dimension_list(s).map(Dims)
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sum values per group
    Rollup {
        #[command(flatten)]
        input: Input,
        #[arg(long, value_parser = parse_dims)]
        by: Dims,
    },
    /// Countries ranked by their total in one year
    Top {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        year: i32,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Each country's share of one year's total
    Proportions {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        year: i32,
    },
    /// Box plot statistics per group
    Box {
        #[command(flatten)]
        input: Input,
        #[arg(long, value_parser = parse_dims)]
        by: Dims,
    },
    /// Kernel density curve per group
    Density {
        #[command(flatten)]
        input: Input,
        #[arg(long, value_parser = parse_dims)]
        by: Dims,
    },
    /// One density curve per year of the window, newest first
    Ridgeline {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        filter: Filter,
    },
    /// Binned value distribution per year
    Violin {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        filter: Filter,
    },
    /// Yearly totals with missing years marked
    Series {
        #[command(flatten)]
        input: Input,
        #[command(flatten)]
        filter: Filter,
    },
    /// Country x year grid
    Heatmap {
        #[command(flatten)]
        input: Input,
    },
    /// Share of one table in another per country and year
    Share {
        #[arg(long)]
        part: PathBuf,
        #[arg(long)]
        whole: PathBuf,
        #[arg(long, value_enum, default_value = "events")]
        dataset: Dataset,
    },
    /// Source -> target flows from the weekly table (sankey or network)
    Flows {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Exactly two dimensions, source first (e.g. `country,event_type`)
        #[arg(long, value_parser = parse_dims, default_value = "event_type,subtype")]
        by: Dims,
        /// Also sum the FATALITIES column onto every link
        #[arg(long)]
        with_fatalities: bool,
        #[command(flatten)]
        filter: Filter,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_table(path: Option<&Path>) -> Result<RawTable> {
    match path {
        Some(path) if path.extension().is_some_and(|ext| ext == "json") => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
            RawTable::from_json(&value)
                .with_context(|| format!("Unusable JSON table in {}", path.display()))
        }
        Some(path) => {
            let csv = csv_reader::read_csv_file(path)
                .with_context(|| format!("Failed to read CSV from {}", path.display()))?;
            Ok(RawTable::from_csv(csv))
        }
        None => {
            let csv = csv_reader::read_csv_from_stdin().context("Failed to read CSV from stdin")?;
            Ok(RawTable::from_csv(csv))
        }
    }
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Invalid config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let mut pipeline = Pipeline::new(config);

    if let Some(path) = &cli.countries {
        let countries = CountryTable::from_table(&load_table(Some(path))?);
        info!(countries = countries.names().len(), "loaded country allow-list");
        pipeline = pipeline.with_countries(&countries);
    }

    Ok(pipeline)
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write output to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn prepare(pipeline: &Pipeline, input: &Input) -> Result<Vec<conflict_stats::Record>> {
    let table = load_table(input.input.as_deref())?;
    let records = pipeline.prepare(&table, input.dataset);
    info!(rows = table.len(), records = records.len(), dataset = ?input.dataset, "prepared input");
    Ok(records)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let pipeline = build_pipeline(&cli)?;

    match &cli.command {
        Command::Rollup { input, by } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.rollup(&records, &by.0))
        }
        Command::Top { input, year, limit } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.top(&records, *year, *limit))
        }
        Command::Proportions { input, year } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.proportions(&records, *year))
        }
        Command::Box { input, by } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.box_stats_by(&records, &by.0))
        }
        Command::Density { input, by } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.density_by(&records, &by.0))
        }
        Command::Ridgeline { input, filter } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.ridgeline(&records, &filter.selection()))
        }
        Command::Violin { input, filter } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.violin(&records, &filter.selection()))
        }
        Command::Series { input, filter } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.year_series(&records, &filter.selection()))
        }
        Command::Heatmap { input } => {
            let records = prepare(&pipeline, input)?;
            emit(&pipeline.heatmap(&records))
        }
        Command::Share { part, whole, dataset } => {
            let part = prepare(&pipeline, &Input { input: Some(part.clone()), dataset: *dataset })?;
            let whole = prepare(&pipeline, &Input { input: Some(whole.clone()), dataset: *dataset })?;
            emit(&pipeline.shares(&part, &whole))
        }
        Command::Flows { input, by, with_fatalities, filter } => {
            let [source, target] = by.0.as_slice() else {
                bail!("flows needs exactly two dimensions, got {}", by.0.len());
            };
            let table = load_table(input.as_deref())?;
            let events = pipeline.prepare(&table, Dataset::Aggregated);
            let fatalities = with_fatalities
                .then(|| pipeline.prepare(&table, Dataset::AggregatedFatalities));
            info!(records = events.len(), "prepared weekly table");
            emit(&pipeline.flows_with_fatalities(
                &events,
                fatalities.as_deref(),
                &filter.selection(),
                [*source, *target],
            ))
        }
    }
}
