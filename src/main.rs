//! chronicle-schedule CLI
//!
//! Command-line interface over CSV-imported schedules:
//! - Inspect a schedule
//! - Query values, ranges and reductions
//! - Integrate and average
//! - Replay samples through a recording policy
//! - Generate a default config file

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chronicle_schedule::config::{generate_default_config, Config, LoggingConfig};
use chronicle_schedule::import::{CsvImportResult, CsvImporter};
use chronicle_schedule::recording::{replay_samples, RecordingPolicy};
use chronicle_schedule::series::{
    analysis, InterpolationMode, ReadOnlyTimeSeries, ReductionMode, SampledPoint, Schedule,
    TimeSeries,
};

#[derive(Parser)]
#[command(name = "chronicle-schedule")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query and analyse time-series schedules")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Where the schedule comes from and how to read it
#[derive(Args)]
pub struct SeriesArgs {
    /// CSV file with timestamp and value columns
    pub file: PathBuf,

    /// Interpolation mode (steps, linear, nearest, none)
    #[arg(short, long)]
    pub mode: Option<InterpolationMode>,

    /// strftime format of the timestamp column
    #[arg(long)]
    pub time_format: Option<String>,

    /// Field delimiter
    #[arg(long)]
    pub delimiter: Option<char>,

    /// The file has no header row
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show size, bounds and statistics
    Info {
        #[command(flatten)]
        series: SeriesArgs,
    },

    /// Value at a timestamp
    ValueAt {
        #[command(flatten)]
        series: SeriesArgs,
        /// Timestamp: epoch milliseconds or RFC 3339
        #[arg(value_parser = parse_time)]
        time: i64,
    },

    /// Stored points in [start, end)
    Range {
        #[command(flatten)]
        series: SeriesArgs,
        #[arg(short, long, value_parser = parse_time)]
        start: Option<i64>,
        #[arg(short, long, value_parser = parse_time)]
        end: Option<i64>,
    },

    /// Aggregate [start, end) into fixed-width buckets
    Reduce {
        #[command(flatten)]
        series: SeriesArgs,
        #[arg(short, long, value_parser = parse_time)]
        start: i64,
        #[arg(short, long, value_parser = parse_time)]
        end: i64,
        /// Bucket width in milliseconds
        #[arg(short, long)]
        width: i64,
        /// Reduction (none, avg, min, max, minmax)
        #[arg(short, long, default_value = "avg")]
        reduction: ReductionMode,
    },

    /// Integral and time-weighted average over [start, end]
    Integrate {
        #[command(flatten)]
        series: SeriesArgs,
        #[arg(short, long, value_parser = parse_time)]
        start: i64,
        #[arg(short, long, value_parser = parse_time)]
        end: i64,
    },

    /// Record the file's samples under a recording policy
    Record {
        #[command(flatten)]
        series: SeriesArgs,
        /// Policy (fixed-interval, on-value-changed, on-value-update); default from config
        #[arg(short, long)]
        policy: Option<RecordingPolicy>,
        /// Tick interval in milliseconds for fixed-interval recording
        #[arg(short, long)]
        interval: Option<i64>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Info { series } => {
            let schedule = load_schedule(&series, &config)?;
            print_info(&schedule, cli.format)?;
        }

        Commands::ValueAt { series, time } => {
            let schedule = load_schedule(&series, &config)?;
            let points: Vec<SampledPoint> = schedule.value_at(time).into_iter().collect();
            if points.is_empty() && cli.format == OutputFormat::Table {
                println!("No value at {}", format_time(time));
            } else {
                print_points(&points, cli.format)?;
            }
        }

        Commands::Range { series, start, end } => {
            let schedule = load_schedule(&series, &config)?;
            let points = schedule.range(start.unwrap_or(i64::MIN), end.unwrap_or(i64::MAX));
            print_points(&points, cli.format)?;
        }

        Commands::Reduce {
            series,
            start,
            end,
            width,
            reduction,
        } => {
            let schedule = load_schedule(&series, &config)?;
            let points = schedule.reduced_range(start, end, width, reduction)?;
            print_points(&points, cli.format)?;
        }

        Commands::Integrate { series, start, end } => {
            let schedule = load_schedule(&series, &config)?;
            let integral = analysis::integrate(&schedule, start, end);
            let average = analysis::average(&schedule, start, end);
            print_summary(
                &[
                    ("mode", schedule.interpolation_mode().to_string()),
                    ("integral", format_opt(integral)),
                    ("average", format_opt(average)),
                ],
                cli.format,
            )?;
        }

        Commands::Record {
            series,
            policy,
            interval,
        } => {
            let mut recording = config.recording.clone();
            if let Some(policy) = policy {
                recording.policy = policy;
            }
            if let Some(interval) = interval {
                recording.interval_ms = interval;
            }

            let samples = import_samples(&series, &config)?.points;
            let replay = replay_samples(series_id(&series.file), &samples, recording.to_config())?;
            replay
                .series
                .set_interpolation_mode(series.mode.unwrap_or(config.series.default_interpolation))?;
            tracing::info!(
                "Recorded {} of {} samples ({} ignored events)",
                replay.stats.points_written,
                samples.len(),
                replay.stats.ignored_events
            );
            print_points(&replay.series.range(i64::MIN, i64::MAX), cli.format)?;
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| format!("chronicle_schedule={}", config.level)),
    );

    // Keep stdout for command output
    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }
    Ok(())
}

fn import_samples(args: &SeriesArgs, config: &Config) -> anyhow::Result<CsvImportResult> {
    let mut import = config.import.clone();
    if let Some(format) = &args.time_format {
        import.timestamp_format = Some(format.clone());
    }
    if let Some(delimiter) = args.delimiter {
        import.delimiter = delimiter;
    }
    if args.no_header {
        import.has_header = false;
    }

    let result = CsvImporter::from_config(&import)
        .import(&args.file)
        .with_context(|| format!("importing {}", args.file.display()))?;
    for error in &result.errors {
        tracing::warn!("{}", error);
    }
    tracing::info!(
        "Loaded {} points from {} ({} rows skipped)",
        result.points.len(),
        args.file.display(),
        result.rows_failed
    );
    Ok(result)
}

fn load_schedule(args: &SeriesArgs, config: &Config) -> anyhow::Result<Schedule> {
    let result = import_samples(args, config)?;
    let mode = args.mode.unwrap_or(config.series.default_interpolation);
    Ok(result.into_schedule(series_id(&args.file), mode)?)
}

fn series_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "series".to_string())
}

/// Epoch milliseconds or an RFC 3339 date
fn parse_time(s: &str) -> Result<i64, String> {
    match s.trim() {
        "min" => Ok(i64::MIN),
        "max" => Ok(i64::MAX),
        "now" => Ok(Utc::now().timestamp_millis()),
        s => s
            .parse::<i64>()
            .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.timestamp_millis()))
            .map_err(|_| format!("invalid timestamp '{}'", s)),
    }
}

fn format_time(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn format_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn print_points(points: &[SampledPoint], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(points)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["timestamp", "value", "quality"])?;
            for point in points {
                writer.write_record([
                    point.timestamp.to_string(),
                    point.value.to_string(),
                    point.quality.to_string(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            if points.is_empty() {
                println!("No data for the selected time range");
                return Ok(());
            }

            println!("{:<32} | {:<16} | {:<7}", "Time", "Value", "Quality");
            println!("{}", "-".repeat(61));
            for point in points {
                println!(
                    "{:<32} | {:<16} | {:<7}",
                    format_time(point.timestamp),
                    point.value.to_string(),
                    point.quality.to_string()
                );
            }
        }
    }
    Ok(())
}

fn print_summary(rows: &[(&str, String)], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = rows
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["key", "value"])?;
            for (key, value) in rows {
                writer.write_record([*key, value.as_str()])?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            for (key, value) in rows {
                println!("{:<14} {}", format!("{}:", key), value);
            }
        }
    }
    Ok(())
}

fn print_info(schedule: &Schedule, format: OutputFormat) -> anyhow::Result<()> {
    let snapshot = schedule.snapshot();
    let first = snapshot.next_at_or_after(i64::MIN);
    let last = snapshot.previous_at_or_before(i64::MAX);
    let (start, end) = match (&first, &last) {
        (Some(f), Some(l)) => (f.timestamp, l.timestamp.saturating_add(1)),
        _ => (0, 0),
    };

    let rows = [
        ("id", schedule.id().to_string()),
        ("kind", schedule.kind().to_string()),
        ("mode", snapshot.interpolation_mode().to_string()),
        ("points", snapshot.size().to_string()),
        ("first", first.map(|p| format_time(p.timestamp)).unwrap_or_default()),
        ("last", last.map(|p| format_time(p.timestamp)).unwrap_or_default()),
        (
            "minimum",
            format_opt(analysis::minimum(schedule, start, end).and_then(|p| p.value.as_f64())),
        ),
        (
            "maximum",
            format_opt(analysis::maximum(schedule, start, end).and_then(|p| p.value.as_f64())),
        ),
        ("average", format_opt(analysis::average(schedule, start, end))),
    ];
    print_summary(&rows, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("1500"), Ok(1500));
        assert_eq!(parse_time("min"), Ok(i64::MIN));
        assert_eq!(parse_time("1970-01-01T00:00:01Z"), Ok(1000));
        assert!(parse_time("tomorrow").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "chronicle-schedule",
            "--format",
            "json",
            "reduce",
            "data.csv",
            "--start",
            "0",
            "--end",
            "15001",
            "--width",
            "5000",
            "--reduction",
            "max",
        ])
        .unwrap();

        assert!(cli.format == OutputFormat::Json);
        match cli.command {
            Commands::Reduce {
                width, reduction, ..
            } => {
                assert_eq!(width, 5000);
                assert_eq!(reduction, ReductionMode::Maximum);
            }
            _ => panic!("expected reduce"),
        }
    }

    #[test]
    fn test_record_parses() {
        let cli = Cli::try_parse_from([
            "chronicle-schedule",
            "record",
            "data.csv",
            "--policy",
            "fixed-interval",
            "--interval",
            "900000",
        ])
        .unwrap();

        match cli.command {
            Commands::Record {
                policy, interval, ..
            } => {
                assert_eq!(policy, Some(RecordingPolicy::FixedInterval));
                assert_eq!(interval, Some(900_000));
            }
            _ => panic!("expected record"),
        }
    }
}
