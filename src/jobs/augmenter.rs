use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{display_name, FileError, FileJob};
use crate::data::Table;

pub const EXPORT_PATTERN: &str = "Orders Export_MM.DD.YY.csv";
pub const CSV_PATTERN: &str = "*.csv";
pub const OUTPUT_PREFIX: &str = "enhanced_";
pub const SOURCE_FILENAME_COLUMN: &str = "source_filename";
pub const EXPORT_DATE_COLUMN: &str = "export_date";

const CENTURY_PREFIX: &str = "20";

// `\d` would match any Unicode digit.
static EXPORT_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Orders Export_([0-9]{2})\.([0-9]{2})\.([0-9]{2})\.csv$").expect("valid export filename regex"));

/// Date embedded in an export filename. Components are kept exactly as written;
/// nothing checks that they form a real calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDate {
    year: String,
    month: String,
    day: String,
}

impl ExportDate {
    /// Two digit years are always read as 20YY.
    pub fn from_filename(file_name: &str) -> Option<ExportDate> {
        let captures = EXPORT_FILENAME.captures(file_name)?;

        Some(ExportDate {
            year: format!("{}{}", CENTURY_PREFIX, &captures[3]),
            month: captures[1].to_string(),
            day: captures[2].to_string(),
        })
    }

    pub fn is_calendar_date(&self) -> bool {
        match (self.year.parse::<i32>(), self.month.parse::<u32>(), self.day.parse::<u32>()) {
            (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for ExportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)
    }
}

/// Tags each row of an order export with the export's filename and the date
/// encoded in it.
pub struct Augmenter {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl Augmenter {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Augmenter {
        Augmenter {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", OUTPUT_PREFIX, file_name))
    }
}

impl FileJob for Augmenter {
    fn name(&self) -> &'static str {
        "augment"
    }

    fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn discovery_pattern(&self) -> &'static str {
        CSV_PATTERN
    }

    fn is_own_output(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(OUTPUT_PREFIX))
    }

    fn process_file(&self, path: &Path) -> Result<PathBuf, FileError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(FileError::InvalidFilename)?;

        let export_date = ExportDate::from_filename(file_name).ok_or(FileError::FilenameMismatch {
            expected: EXPORT_PATTERN,
        })?;
        if !export_date.is_calendar_date() {
            warn!("{} is not a calendar date, writing it unchanged, file={}", export_date, file_name);
        }

        let mut table = Table::from_csv(path)?;
        let export_date = export_date.to_string();
        table.set_column(SOURCE_FILENAME_COLUMN, file_name);
        table.set_column(EXPORT_DATE_COLUMN, &export_date);

        let output = self.output_path(file_name);
        table.write_csv(&output)?;

        info!(
            "enhanced: {} -> {} (date: {}, rows: {})",
            file_name,
            display_name(&output),
            export_date,
            table.len()
        );

        Ok(output)
    }
}
