use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveTime;
use getset::Getters;
use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const UTF8_BOM: char = '\u{feff}';
// Largest magnitude below which every integral f64 is exactly representable.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook has no worksheet")]
    NoWorksheet,
    #[error("file has no header row")]
    EmptyInput,
    #[error("line {line} has {found} fields, header has {expected}")]
    TooManyFields { line: u64, expected: usize, found: usize },
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("failed to move output into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// In-memory tabular dataset: a header row and the rows beneath it, every
/// value rendered as text. Rows always have as many values as there are headers.
#[derive(Debug, Default, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Table {
        Table { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Loads the first worksheet of a workbook. The first row of the used range
    /// becomes the header row.
    pub fn from_workbook(path: &Path) -> Result<Table, DataError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or(DataError::NoWorksheet)??;

        if range.is_empty() {
            debug!("first worksheet is empty, path={}", path.display());
            return Ok(Table::default());
        }

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header_row) => header_names(header_row),
            None => return Ok(Table::default()),
        };

        let body: Vec<&[Data]> = rows.collect();
        let kinds: Vec<ColumnKind> = (0..headers.len()).map(|col| column_kind(&body, col)).collect();
        let rows = body
            .iter()
            .map(|row| row.iter().zip(&kinds).map(|(cell, kind)| render_cell(cell, *kind)).collect())
            .collect();

        Ok(Table { headers, rows })
    }

    /// Loads a comma delimited file with a header row. Rows shorter than the
    /// header are padded with empty values; longer rows are rejected.
    pub fn from_csv(path: &Path) -> Result<Table, DataError> {
        let file = File::open(path)?;
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let mut headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(DataError::EmptyInput);
        }
        if let Some(stripped) = headers[0].strip_prefix(UTF8_BOM) {
            headers[0] = stripped.to_string();
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(DataError::TooManyFields {
                    line: record.position().map_or(0, |pos| pos.line()),
                    expected: headers.len(),
                    found: record.len(),
                });
            }

            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Table { headers, rows })
    }

    /// Sets `value` on every row under the column `name`. An existing column of
    /// that name is overwritten in place, otherwise the column is appended.
    pub fn set_column(&mut self, name: &str, value: &str) {
        match self.headers.iter().position(|header| header == name) {
            Some(idx) => {
                for row in self.rows.iter_mut() {
                    row[idx] = value.to_string();
                }
            },
            None => {
                self.headers.push(name.to_string());
                for row in self.rows.iter_mut() {
                    row.push(value.to_string());
                }
            },
        }
    }

    /// Writes the table as comma delimited UTF-8 with a header row. The output
    /// is staged in a temporary file next to `path` and renamed into place, so
    /// `path` is either fully written or untouched.
    pub fn write_csv(&self, path: &Path) -> Result<(), DataError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = staging_file(dir)?;

        {
            let mut csv_writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(staged.as_file_mut());

            if !self.headers.is_empty() {
                csv_writer.write_record(&self.headers)?;
                for row in &self.rows {
                    csv_writer.write_record(row)?;
                }
            }

            csv_writer.flush()?;
        }

        staged.persist(path)?;

        Ok(())
    }
}

// Temporary files default to owner-only access; outputs should look like any
// other file written by the user.
fn staging_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".orderbatch").suffix(".tmp");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }

    builder.tempfile_in(dir)
}

fn header_names(row: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    row.iter()
        .enumerate()
        .map(|(idx, cell)| {
            let mut name = render_cell(cell, ColumnKind::Mixed);
            if name.is_empty() {
                name = format!("Unnamed: {}", idx);
            }

            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 { name } else { format!("{}.{}", name, count) };
            *count += 1;

            unique
        })
        .collect()
}

/// How a worksheet column is rendered, decided from all of its body cells the
/// way a typed dataframe column would be.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    /// Only whole numbers, no gaps.
    Integer,
    /// Numbers with a fractional part or with gaps.
    Float,
    /// Only date-times, all at midnight.
    Date,
    Mixed,
}

fn column_kind(body: &[&[Data]], col: usize) -> ColumnKind {
    let mut empty = 0;
    let mut numbers = 0;
    let mut fractional = false;
    let mut dates = 0;
    let mut midnight = true;

    for row in body {
        match row.get(col).unwrap_or(&Data::Empty) {
            Data::Empty => empty += 1,
            Data::Int(_) => numbers += 1,
            Data::Float(f) => {
                numbers += 1;
                fractional |= f.fract() != 0.0;
            },
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(datetime) => {
                    dates += 1;
                    midnight &= datetime.time() == NaiveTime::MIN;
                },
                None => return ColumnKind::Mixed,
            },
            _ => return ColumnKind::Mixed,
        }
    }

    let filled = body.len() - empty;
    if filled == 0 {
        ColumnKind::Mixed
    } else if numbers == filled {
        if fractional || empty > 0 {
            ColumnKind::Float
        } else {
            ColumnKind::Integer
        }
    } else if dates == filled && midnight {
        ColumnKind::Date
    } else {
        ColumnKind::Mixed
    }
}

fn render_cell(cell: &Data, kind: ColumnKind) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) if kind == ColumnKind::Float => render_number(*i as f64, kind),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => render_number(*f, kind),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) if kind == ColumnKind::Date => datetime.format(DATE_FORMAT).to_string(),
            Some(datetime) => datetime.format(DATETIME_FORMAT).to_string(),
            None => render_number(dt.as_f64(), kind),
        },
        Data::Error(err) => err.to_string(),
    }
}

/// Float columns keep a fractional part on whole values (`120.0`); anywhere
/// else whole values are written as integers.
fn render_number(value: f64, kind: ColumnKind) -> String {
    if kind == ColumnKind::Float {
        format!("{:?}", value)
    } else if value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
