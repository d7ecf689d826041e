//! CSV Import
//!
//! Reads `(timestamp, value)` rows into good `Double` points.
//! Timestamps are either formatted dates or plain numbers in a `TimeUnit`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::{ImportError, ImportResult};
use crate::config::ImportConfig;
use crate::series::{
    InterpolationMode, SampledPoint, Schedule, SeriesResult, TimeSeries, Value, ValueKind,
};

const MAX_ERRORS: usize = 100;

/// Unit of numeric timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub fn millis(&self) -> i64 {
        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
        }
    }
}

/// CSV file importer with configurable column mapping
#[derive(Debug, Clone)]
pub struct CsvImporter {
    /// Column index for timestamps (0-indexed)
    timestamp_column: usize,
    /// Column index for values
    value_column: usize,
    /// strftime format; numeric timestamps when absent
    timestamp_format: Option<String>,
    time_unit: TimeUnit,
    has_header: bool,
    delimiter: u8,
    decimal_separator: char,
}

/// Result of a CSV import operation
#[derive(Debug)]
pub struct CsvImportResult {
    pub points: Vec<SampledPoint>,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

impl CsvImportResult {
    /// Load the imported points into a new double schedule
    pub fn into_schedule(
        self,
        id: impl Into<String>,
        mode: InterpolationMode,
    ) -> SeriesResult<Schedule> {
        let schedule = Schedule::new(id, ValueKind::Double).with_interpolation_mode(mode)?;
        schedule.insert_many(self.points, None);
        Ok(schedule)
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    /// Create a new CSV importer with default settings
    pub fn new() -> Self {
        Self {
            timestamp_column: 0,
            value_column: 1,
            timestamp_format: None,
            time_unit: TimeUnit::Milliseconds,
            has_header: true,
            delimiter: b',',
            decimal_separator: '.',
        }
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        let mut importer = Self::new()
            .with_timestamp_column(config.timestamp_column)
            .with_value_column(config.value_column)
            .with_time_unit(config.time_unit)
            .with_header(config.has_header)
            .with_delimiter(config.delimiter)
            .with_decimal_separator(config.decimal_separator);
        if let Some(format) = &config.timestamp_format {
            importer = importer.with_timestamp_format(format);
        }
        importer
    }

    pub fn with_timestamp_column(mut self, column: usize) -> Self {
        self.timestamp_column = column;
        self
    }

    pub fn with_value_column(mut self, column: usize) -> Self {
        self.value_column = column;
        self
    }

    /// Parse timestamps with a strftime format instead of as numbers
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = Some(format.to_string());
        self
    }

    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    /// Set whether the CSV has a header row
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Field delimiter; non-ASCII characters fall back to `,`
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = u8::try_from(delimiter).unwrap_or(b',');
        self
    }

    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    fn parse_timestamp(&self, raw: &str) -> Result<i64, String> {
        let Some(format) = &self.timestamp_format else {
            return self.parse_numeric_timestamp(raw);
        };

        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc).timestamp_millis());
        }
        Err(format!("Could not parse timestamp: {}", raw))
    }

    fn parse_numeric_timestamp(&self, raw: &str) -> Result<i64, String> {
        let factor = self.time_unit.millis();
        if let Ok(n) = raw.parse::<i64>() {
            return n
                .checked_mul(factor)
                .ok_or_else(|| format!("Timestamp out of range: {}", raw));
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok((n * factor as f64).round() as i64),
            _ => Err(format!("Could not parse timestamp: {}", raw)),
        }
    }

    fn parse_value(&self, raw: &str) -> Result<f64, String> {
        let normalized = if self.decimal_separator == '.' {
            raw.to_string()
        } else {
            raw.replace(self.decimal_separator, ".")
        };
        normalized
            .parse::<f64>()
            .map_err(|_| format!("Invalid value: {}", raw))
    }

    fn parse_record(&self, record: &csv::StringRecord) -> Result<SampledPoint, String> {
        let raw_time = record
            .get(self.timestamp_column)
            .map(str::trim)
            .ok_or("missing timestamp column")?;
        let raw_value = record
            .get(self.value_column)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or("missing value")?;

        let timestamp = self.parse_timestamp(raw_time)?;
        let value = self.parse_value(raw_value)?;
        Ok(SampledPoint::good(timestamp, Value::Double(value)))
    }

    fn read<R: Read>(&self, mut reader: csv::Reader<R>) -> CsvImportResult {
        let mut points = Vec::new();
        let mut rows_processed = 0;
        let mut rows_failed = 0;
        let mut errors = Vec::new();

        for (line_num, result) in reader.records().enumerate() {
            let actual_line = if self.has_header {
                line_num + 2
            } else {
                line_num + 1
            };

            let parsed = result
                .map_err(|e| e.to_string())
                .and_then(|record| self.parse_record(&record));
            match parsed {
                Ok(point) => {
                    points.push(point);
                    rows_processed += 1;
                }
                Err(e) => {
                    errors.push(format!("Line {}: {}", actual_line, e));
                    rows_failed += 1;
                }
            }
        }

        if errors.len() > MAX_ERRORS {
            let total = errors.len();
            errors.truncate(MAX_ERRORS);
            errors.push(format!("... and {} more errors", total - MAX_ERRORS));
        }
        if rows_failed > 0 {
            warn!("Skipped {} unparsable CSV rows", rows_failed);
        }
        debug!("Imported {} points from CSV", points.len());

        CsvImportResult {
            points,
            rows_processed,
            rows_failed,
            errors,
        }
    }

    fn builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(self.has_header)
            .delimiter(self.delimiter)
            .flexible(true);
        builder
    }

    /// Import data from a CSV file
    pub fn import(&self, path: &Path) -> ImportResult<CsvImportResult> {
        if !path.exists() {
            return Err(ImportError::NotFound(path.to_path_buf()));
        }
        let reader = self.builder().from_path(path)?;
        Ok(self.read(reader))
    }

    /// Import from a CSV string
    pub fn import_str(&self, csv_data: &str) -> CsvImportResult {
        self.read(self.builder().from_reader(csv_data.as_bytes()))
    }
}
