use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lookup::Query;
use crate::record::{RecordStatus, ResultRecord};

pub const RESULT_CSV_HEADER: [&str; 8] = [
    "subject_id",
    "birth_date",
    "status",
    "name",
    "status_label",
    "category_label",
    "facility_label",
    "timestamp",
];

const SAMPLE_QUERIES: [(&str, &str); 2] = [
    ("3317110608050001", "2005-08-06"),
    ("1234567890123456", "1990-01-01"),
];

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("input is missing column {0} (expected header subject_id,birth_date)")]
    MissingColumn(&'static str),
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Queries read from an input file, plus the rows that could not be used.
#[derive(Debug, Default)]
pub struct InputBatch {
    pub queries: Vec<Query>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the source file, header included.
    pub line: u64,
    pub reason: String,
}

#[derive(Deserialize)]
struct QueryRow {
    #[serde(default, alias = "nik")]
    subject_id: Option<String>,
    #[serde(default, alias = "tgl_lahir")]
    birth_date: Option<String>,
}

#[derive(Serialize)]
struct ResultRow<'a> {
    subject_id: &'a str,
    birth_date: NaiveDate,
    status: RecordStatus,
    name: Option<&'a str>,
    status_label: Option<&'a str>,
    category_label: Option<&'a str>,
    facility_label: Option<&'a str>,
    timestamp: &'a DateTime<Utc>,
}

impl<'a> From<&'a ResultRecord> for ResultRow<'a> {
    fn from(record: &'a ResultRecord) -> Self {
        Self {
            subject_id: &record.subject_id,
            birth_date: record.birth_date,
            status: record.status,
            name: record.name.as_deref(),
            status_label: record.status_label.as_deref(),
            category_label: record.category_label.as_deref(),
            facility_label: record.facility_label.as_deref(),
            timestamp: &record.timestamp,
        }
    }
}

pub fn read_queries_csv(path: &Path) -> Result<InputBatch, PersistError> {
    let file = File::open(path).map_err(|err| PersistError::io(path, err))?;
    read_queries_from(file)
}

pub fn read_queries_from<R: Read>(reader: R) -> Result<InputBatch, PersistError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let has_column = |names: [&str; 2]| headers.iter().any(|h| names.contains(&h));
    if !has_column(["subject_id", "nik"]) {
        return Err(PersistError::MissingColumn("subject_id"));
    }
    if !has_column(["birth_date", "tgl_lahir"]) {
        return Err(PersistError::MissingColumn("birth_date"));
    }

    let mut batch = InputBatch::default();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map(|pos| pos.line()).unwrap_or(0);
                batch.skipped.push(SkippedRow {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: QueryRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(err) => {
                batch.skipped.push(SkippedRow {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let subject_id = row.subject_id.unwrap_or_default();
        let birth_date = row.birth_date.unwrap_or_default();
        match Query::parse(&subject_id, &birth_date) {
            Ok(query) => batch.queries.push(query),
            Err(reason) => batch.skipped.push(SkippedRow { line, reason }),
        }
    }
    Ok(batch)
}

pub fn write_sample_queries_csv(path: &Path) -> Result<usize, PersistError> {
    let file = create_file(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["subject_id", "birth_date"])?;
    for (subject_id, birth_date) in SAMPLE_QUERIES {
        writer.write_record([subject_id, birth_date])?;
    }
    writer.flush().map_err(|err| PersistError::io(path, err))?;
    Ok(SAMPLE_QUERIES.len())
}

pub fn save_results_json(path: &Path, records: &[ResultRecord]) -> Result<(), PersistError> {
    let mut writer = BufWriter::new(create_file(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|err| PersistError::io(path, err))
}

pub fn load_results_json(path: &Path) -> Result<Vec<ResultRecord>, PersistError> {
    let file = File::open(path).map_err(|err| PersistError::io(path, err))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn save_results_csv(path: &Path, records: &[ResultRecord]) -> Result<(), PersistError> {
    let file = create_file(path)?;
    write_results_csv(file, records)?;
    Ok(())
}

pub fn write_results_csv<W: Write>(writer: W, records: &[ResultRecord]) -> Result<(), PersistError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    // Header is written explicitly so an empty batch still produces one.
    writer.write_record(RESULT_CSV_HEADER)?;
    for record in records {
        writer.serialize(ResultRow::from(record))?;
    }
    writer.flush().map_err(|err| PersistError::Io {
        path: "<csv writer>".to_string(),
        source: err,
    })
}

pub fn load_results_csv(path: &Path) -> Result<Vec<ResultRecord>, PersistError> {
    let file = File::open(path).map_err(|err| PersistError::io(path, err))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut out = Vec::new();
    for record in reader.deserialize() {
        out.push(record?);
    }
    Ok(out)
}

fn create_file(path: &Path) -> Result<File, PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| PersistError::io(parent, err))?;
    }
    File::create(path).map_err(|err| PersistError::io(path, err))
}
