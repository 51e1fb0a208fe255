use std::fs;

use anyhow::{bail, Result};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::augmenter::{ExportDate, EXPORT_DATE_COLUMN, SOURCE_FILENAME_COLUMN};
use super::*;
use crate::data::Table;

const ORDERS_CSV: &str = "Order ID,SKU,Qty\n1001,PERF-001,2\n1002,PERF-002,1\n";

struct Dirs {
    _root: TempDir,
    source: PathBuf,
    output: PathBuf,
}

fn setup() -> Result<Dirs> {
    let root = TempDir::new()?;
    let source = root.path().join("CSV_Files");
    let output = root.path().join("Enhanced_CSV_Files");
    fs::create_dir(&source)?;

    Ok(Dirs {
        _root: root,
        source,
        output,
    })
}

#[test]
fn test_export_date_from_filename() -> Result<()> {
    let date = match ExportDate::from_filename("Orders Export_07.04.23.csv") {
        Some(date) => date,
        None => bail!("filename should match the export pattern"),
    };

    assert_eq!(date.to_string(), "2023-07-04");
    assert!(date.is_calendar_date());

    Ok(())
}

#[test]
fn test_export_date_is_not_validated() {
    let date = ExportDate::from_filename("Orders Export_13.31.99.csv");

    assert_eq!(date.as_ref().map(ToString::to_string), Some("2099-13-31".to_string()));
    assert_eq!(date.map(|date| date.is_calendar_date()), Some(false));
}

#[test]
fn test_export_date_rejects_other_names() {
    for name in [
        "random.csv",
        "Orders Export_7.4.23.csv",
        "Orders Export_07.04.2023.csv",
        "Orders Export_07-04-23.csv",
        "Orders Export_07.04.23.xlsx",
        "enhanced_Orders Export_07.04.23.csv",
        "Orders Export_07.04.23.csv.bak",
        "Orders Export_٠٧.04.23.csv",
    ] {
        assert_eq!(ExportDate::from_filename(name), None, "{}", name);
    }
}

#[test]
fn test_augment_export() -> Result<()> {
    let dirs = setup()?;
    fs::write(dirs.source.join("Orders Export_07.04.23.csv"), ORDERS_CSV)?;

    let report = run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    let output = dirs.output.join("enhanced_Orders Export_07.04.23.csv");
    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.succeeded(), &vec![output.clone()]);
    assert_eq!(
        fs::read_to_string(&output)?,
        "Order ID,SKU,Qty,source_filename,export_date\n\
         1001,PERF-001,2,Orders Export_07.04.23.csv,2023-07-04\n\
         1002,PERF-002,1,Orders Export_07.04.23.csv,2023-07-04\n"
    );

    let table = Table::from_csv(&output)?;
    assert_eq!(table.len(), 2);
    assert_eq!(table.headers()[3], SOURCE_FILENAME_COLUMN);
    assert_eq!(table.headers()[4], EXPORT_DATE_COLUMN);
    for row in table.rows() {
        assert_eq!(row[3], "Orders Export_07.04.23.csv");
        assert_eq!(row[4], "2023-07-04");
    }

    Ok(())
}

#[test]
fn test_augment_skips_unmatched_names() -> Result<()> {
    let dirs = setup()?;
    fs::write(dirs.source.join("random.csv"), ORDERS_CSV)?;
    fs::write(dirs.source.join("Orders Export_07.05.23.csv"), ORDERS_CSV)?;

    let report = run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failed(), &vec![dirs.source.join("random.csv")]);
    assert!(!dirs.output.join("enhanced_random.csv").exists());
    assert_eq!(fs::read_dir(&dirs.output)?.count(), 1);

    Ok(())
}

#[test]
fn test_augment_pads_short_rows() -> Result<()> {
    let dirs = setup()?;
    fs::write(
        dirs.source.join("Orders Export_07.04.23.csv"),
        "Order ID,SKU,Note\n1001,PERF-001\n1002,PERF-002,gift\n",
    )?;

    let report = run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 0);
    assert_eq!(
        fs::read_to_string(dirs.output.join("enhanced_Orders Export_07.04.23.csv"))?,
        "Order ID,SKU,Note,source_filename,export_date\n\
         1001,PERF-001,,Orders Export_07.04.23.csv,2023-07-04\n\
         1002,PERF-002,gift,Orders Export_07.04.23.csv,2023-07-04\n"
    );

    Ok(())
}

#[test]
fn test_augment_rejects_rows_longer_than_header() -> Result<()> {
    let dirs = setup()?;
    let path = dirs.source.join("Orders Export_07.04.23.csv");
    fs::write(&path, "Order ID,SKU\n1001,PERF-001\n1002,PERF-002,extra\n")?;

    match Table::from_csv(&path) {
        Err(crate::data::DataError::TooManyFields { line, expected, found }) => {
            assert_eq!((line, expected, found), (3, 2, 3));
        },
        other => bail!("expected TooManyFields, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_augment_rerun_in_place_ignores_outputs() -> Result<()> {
    let dirs = setup()?;
    fs::write(dirs.source.join("Orders Export_07.04.23.csv"), ORDERS_CSV)?;
    fs::write(dirs.source.join("random.csv"), ORDERS_CSV)?;
    let augmenter = Augmenter::new(&dirs.source, &dirs.source);

    let first = run_batch(&augmenter)?;
    let second = run_batch(&augmenter)?;

    for report in [&first, &second] {
        assert_eq!(report.succeeded(), &vec![dirs.source.join("enhanced_Orders Export_07.04.23.csv")]);
        assert_eq!(report.failed(), &vec![dirs.source.join("random.csv")]);
    }
    assert!(!dirs.source.join("enhanced_enhanced_Orders Export_07.04.23.csv").exists());

    Ok(())
}

#[test]
fn test_augment_continues_after_malformed_file() -> Result<()> {
    let dirs = setup()?;
    fs::write(dirs.source.join("Orders Export_07.04.23.csv"), "Order ID,SKU\n1001,PERF-001,extra\n")?;
    fs::write(dirs.source.join("Orders Export_07.05.23.csv"), ORDERS_CSV)?;
    fs::write(dirs.source.join("Orders Export_07.06.23.csv"), "")?;

    let report = run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(report.success_count(), 1);
    assert_eq!(
        report.failed(),
        &vec![
            dirs.source.join("Orders Export_07.04.23.csv"),
            dirs.source.join("Orders Export_07.06.23.csv"),
        ]
    );
    assert!(!dirs.output.join("enhanced_Orders Export_07.04.23.csv").exists());
    assert!(dirs.output.join("enhanced_Orders Export_07.05.23.csv").is_file());
    assert_eq!(fs::read_dir(&dirs.output)?.count(), 1);

    Ok(())
}

#[test]
fn test_augment_overwrites_existing_columns() -> Result<()> {
    let dirs = setup()?;
    fs::write(
        dirs.source.join("Orders Export_12.01.24.csv"),
        "\u{feff}Order ID,export_date\n1001,stale\n",
    )?;

    run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(
        fs::read_to_string(dirs.output.join("enhanced_Orders Export_12.01.24.csv"))?,
        "Order ID,export_date,source_filename\n1001,2024-12-01,Orders Export_12.01.24.csv\n"
    );

    Ok(())
}

#[test]
fn test_augment_passes_invalid_dates_through() -> Result<()> {
    let dirs = setup()?;
    fs::write(dirs.source.join("Orders Export_13.31.23.csv"), "Order ID\n1001\n")?;

    let report = run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(report.success_count(), 1);
    assert_eq!(
        fs::read_to_string(dirs.output.join("enhanced_Orders Export_13.31.23.csv"))?,
        "Order ID,source_filename,export_date\n1001,Orders Export_13.31.23.csv,2023-13-31\n"
    );

    Ok(())
}

#[test]
fn test_augment_header_only_file() -> Result<()> {
    let dirs = setup()?;
    fs::write(dirs.source.join("Orders Export_01.02.25.csv"), "Order ID,SKU\n")?;

    run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(
        fs::read_to_string(dirs.output.join("enhanced_Orders Export_01.02.25.csv"))?,
        "Order ID,SKU,source_filename,export_date\n"
    );

    Ok(())
}

#[test]
fn test_augment_empty_dir() -> Result<()> {
    let dirs = setup()?;

    let report = run_batch(&Augmenter::new(&dirs.source, &dirs.output))?;

    assert_eq!(report.success_count(), 0);
    assert_eq!(report.failure_count(), 0);
    assert!(dirs.output.is_dir());
    assert_eq!(fs::read_dir(&dirs.output)?.count(), 0);

    Ok(())
}

#[test]
fn test_augment_source_is_a_file() -> Result<()> {
    let dirs = setup()?;
    let file = dirs.source.join("Orders Export_07.04.23.csv");
    fs::write(&file, ORDERS_CSV)?;

    match run_batch(&Augmenter::new(&file, &dirs.output)) {
        Err(BatchError::NotADirectory(path)) => assert_eq!(path, file),
        other => bail!("expected NotADirectory, got {:?}", other.map(|report| report.success_count())),
    }

    Ok(())
}
