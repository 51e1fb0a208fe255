use std::fs;
use std::path::{Path, PathBuf};

use enum_dispatch::enum_dispatch;
use getset::Getters;
use glob::{glob_with, MatchOptions, Pattern};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::data::DataError;

pub mod augmenter;
pub mod converter;

#[cfg(test)]
mod augmenter_tests;

use augmenter::Augmenter;
use converter::Converter;

/// Errors that stop a whole batch before any file is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("source directory `{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot access `{}`: {source}", path.display())]
    Inaccessible { path: PathBuf, source: std::io::Error },
    #[error("invalid discovery pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Errors confined to a single file. The batch records them and moves on.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("filename does not match `{expected}`")]
    FilenameMismatch { expected: &'static str },
    #[error("path has no usable file name")]
    InvalidFilename,
    #[error("{0}")]
    Data(#[from] DataError),
}

#[derive(Debug, Default, Getters)]
#[getset(get = "pub")]
pub struct BatchReport {
    /// Output files written, in processing order.
    succeeded: Vec<PathBuf>,
    /// Source files that could not be processed, in processing order.
    failed: Vec<PathBuf>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

#[enum_dispatch]
pub trait FileJob {
    fn name(&self) -> &'static str;

    fn source_dir(&self) -> &Path;
    fn output_dir(&self) -> &Path;

    /// Glob matched against file names directly inside the source directory.
    fn discovery_pattern(&self) -> &'static str;

    /// Discovered files the job wrote itself on an earlier run. They are left
    /// out of the batch and not counted.
    fn is_own_output(&self, _path: &Path) -> bool {
        false
    }

    /// Transforms one source file and returns the path of the written output.
    fn process_file(&self, path: &Path) -> Result<PathBuf, FileError>;
}

#[enum_dispatch(FileJob)]
pub enum Job {
    Converter,
    Augmenter,
}

/// Runs `job` over every discovered file, one at a time. Per-file failures are
/// logged and collected in the report; only directory level problems are
/// returned as errors.
pub fn run_batch<J: FileJob>(job: &J) -> Result<BatchReport, BatchError> {
    let files: Vec<PathBuf> = discover(job.source_dir(), job.discovery_pattern())?
        .into_iter()
        .filter(|path| {
            let own = job.is_own_output(path);
            if own {
                debug!("{}: ignoring earlier output {}", job.name(), display_name(path));
            }
            !own
        })
        .collect();

    fs::create_dir_all(job.output_dir()).map_err(|source| BatchError::Inaccessible {
        path: job.output_dir().to_path_buf(),
        source,
    })?;

    if files.is_empty() {
        info!("{}: no files matching `{}` in {}", job.name(), job.discovery_pattern(), job.source_dir().display());
        return Ok(BatchReport::default());
    }

    info!("{}: found {} files to process", job.name(), files.len());

    let mut report = BatchReport::default();
    for path in files {
        match job.process_file(&path) {
            Ok(output) => report.succeeded.push(output),
            Err(err) => {
                match &err {
                    FileError::FilenameMismatch { .. } => {
                        warn!("skipping {}, err={}", display_name(&path), err)
                    },
                    _ => error!("failed to process {}, err={}", display_name(&path), err),
                }
                report.failed.push(path);
            },
        }
    }

    Ok(report)
}

/// Lists regular files in `dir` whose names match `pattern`, sorted by path.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, BatchError> {
    let metadata = fs::metadata(dir).map_err(|source| BatchError::Inaccessible {
        path: dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(BatchError::NotADirectory(dir.to_path_buf()));
    }

    let full_pattern = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), pattern);
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in glob_with(&full_pattern, options)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {},
            Err(err) => warn!("unreadable entry during discovery, err={}", err),
        }
    }
    files.sort();

    Ok(files)
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
