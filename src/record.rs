//! The experiment event sink: an append-only CSV of trial events.
//!
//! The file is opened and closed around every row so a crash loses at most
//! the row being written. Columns are fixed-then-user:
//! `psych_version, start_date, start_time, offset, trial, time`, the
//! experiment's info fields, `code`, then the user columns.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{Error, Result};

pub const PSYCH_VERSION: &str = env!("CARGO_PKG_VERSION");

const FIXED_COLUMNS: &[&str] = &[
    "psych_version",
    "start_date",
    "start_time",
    "offset",
    "trial",
    "time",
    "code",
];

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    start_date: String,
    start_time: String,
    info: Vec<(String, String)>,
    columns: Vec<String>,
}

impl Recorder {
    /// Create the record file and write its header. `info` fields are
    /// constant per experiment (subject id, condition, ...); `columns` are
    /// the user columns later rows may fill.
    pub fn create(
        path: impl AsRef<Path>,
        info: &[(&str, &str)],
        columns: &[&str],
    ) -> Result<Self> {
        let mut seen: Vec<&str> = Vec::new();
        for name in info.iter().map(|(k, _)| *k).chain(columns.iter().copied()) {
            if FIXED_COLUMNS.contains(&name) {
                return Err(Error::ReservedColumn(name.to_string()));
            }
            if seen.contains(&name) {
                return Err(Error::ReservedColumn(format!("{name} (duplicated)")));
            }
            seen.push(name);
        }

        let now = Local::now();
        let recorder = Recorder {
            path: path.as_ref().to_path_buf(),
            start_date: now.format("%Y-%m-%d").to_string(),
            start_time: now.format("%H:%M:%S").to_string(),
            info: info
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
        };

        let mut header: Vec<&str> = vec![
            "psych_version",
            "start_date",
            "start_time",
            "offset",
            "trial",
            "time",
        ];
        header.extend(recorder.info.iter().map(|(k, _)| k.as_str()));
        header.push("code");
        header.extend(recorder.columns.iter().map(|s| s.as_str()));
        let line = header
            .iter()
            .map(|s| csv_field(s))
            .collect::<Vec<_>>()
            .join(",");
        std::fs::write(&recorder.path, format!("{line}\n"))?;
        Ok(recorder)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append exactly one row. Unknown keys in `values` fail; columns
    /// without a value record as empty strings.
    pub fn record(
        &self,
        code: &str,
        offset: usize,
        trial: usize,
        time: f64,
        values: &[(&str, &str)],
    ) -> Result<()> {
        for (key, _) in values {
            if !self.columns.iter().any(|c| c == key) {
                return Err(Error::UnknownColumn(key.to_string()));
            }
        }

        let mut fields: Vec<String> = vec![
            PSYCH_VERSION.to_string(),
            self.start_date.clone(),
            self.start_time.clone(),
            offset.to_string(),
            trial.to_string(),
            format!("{time:.6}"),
        ];
        fields.extend(self.info.iter().map(|(_, v)| csv_field(v)));
        fields.push(csv_field(code));
        for column in &self.columns {
            let value = values
                .iter()
                .find(|(k, _)| k == column)
                .map(|(_, v)| *v)
                .unwrap_or("");
            fields.push(csv_field(value));
        }

        // open-append-close per row
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", fields.join(","))?;
        Ok(())
    }
}
