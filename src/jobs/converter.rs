use std::path::{Path, PathBuf};

use log::info;

use super::{display_name, FileError, FileJob};
use crate::data::Table;

pub const SPREADSHEET_PATTERN: &str = "*.xlsx";
pub const OUTPUT_EXTENSION: &str = "csv";

/// Converts every workbook in a directory into a delimited text file with the
/// same base name.
pub struct Converter {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl Converter {
    /// Without an `output_dir` the text files are written next to the workbooks.
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: Option<PathBuf>) -> Converter {
        let source_dir = source_dir.into();
        let output_dir = output_dir.unwrap_or_else(|| source_dir.clone());

        Converter { source_dir, output_dir }
    }

    pub fn output_path(&self, source: &Path) -> Result<PathBuf, FileError> {
        // Built by hand: `set_extension` would eat dotted stems like `May.v2`.
        let mut file_name = source.file_stem().ok_or(FileError::InvalidFilename)?.to_os_string();
        file_name.push(".");
        file_name.push(OUTPUT_EXTENSION);

        Ok(self.output_dir.join(file_name))
    }
}

impl FileJob for Converter {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn discovery_pattern(&self) -> &'static str {
        SPREADSHEET_PATTERN
    }

    fn process_file(&self, path: &Path) -> Result<PathBuf, FileError> {
        let output = self.output_path(path)?;
        info!("converting: {} -> {}", display_name(path), display_name(&output));

        let table = Table::from_workbook(path)?;
        table.write_csv(&output)?;

        Ok(output)
    }
}
