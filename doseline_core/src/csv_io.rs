//! CSV import and export of the multidose table.
//!
//! Records are `(time, dose, method)`. Import is lenient: each record is
//! checked on its own and failures are reported, never fatal.

use crate::catalog::get_default_catalog;
use crate::table::RegimenTable;
use crate::types::{parse_finite, EntryDraft, TimeValue};
use crate::Result;
use std::fmt;
use std::io::{Read, Write};

/// Header written on export
pub const HEADER: [&str; 3] = ["time (days)", "dose (mg)", "ester"];

/// Why a record was not imported
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    TooFewFields(usize),
    UnknownMethod(String),
    BadTime(String),
    BadDose(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooFewFields(n) => write!(f, "expected 3 fields, found {}", n),
            RejectReason::UnknownMethod(token) => write!(f, "unknown delivery method '{}'", token),
            RejectReason::BadTime(text) => write!(f, "'{}' is neither a number nor a date", text),
            RejectReason::BadDose(text) => write!(f, "dose '{}' is not a positive number", text),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based record number in the input
    pub line: u64,
    pub reason: RejectReason,
}

/// Result of an import: accepted drafts in input order plus rejections
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    pub drafts: Vec<EntryDraft>,
    pub rejected: Vec<RejectedRow>,
}

impl ImportReport {
    pub fn accepted(&self) -> usize {
        self.drafts.len()
    }

    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }
}

/// Check one record and turn it into a draft
pub fn parse_row<S: AsRef<str>>(fields: &[S]) -> std::result::Result<EntryDraft, RejectReason> {
    if fields.len() < 3 {
        return Err(RejectReason::TooFewFields(fields.len()));
    }
    let (time, dose, token) = (
        fields[0].as_ref().trim(),
        fields[1].as_ref().trim(),
        fields[2].as_ref().trim(),
    );

    let method = get_default_catalog()
        .find_intersecting(token)
        .ok_or_else(|| RejectReason::UnknownMethod(token.to_string()))?;
    let time = TimeValue::parse(time).ok_or_else(|| RejectReason::BadTime(time.to_string()))?;
    let dose = parse_finite(dose)
        .filter(|d| *d > 0.0)
        .ok_or_else(|| RejectReason::BadDose(dose.to_string()))?;

    Ok(EntryDraft::new(time, dose, method))
}

fn is_header<S: AsRef<str>>(fields: &[S]) -> bool {
    fields
        .first()
        .is_some_and(|f| f.as_ref().trim().eq_ignore_ascii_case(HEADER[0]))
}

/// Read records from `reader`. A header record is skipped silently.
pub fn import_rows<R: Read>(reader: R) -> Result<ImportReport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = ImportReport::default();
    for (i, record) in reader.records().enumerate() {
        let line = i as u64 + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to read CSV record {}: {}", line, e);
                continue;
            }
        };
        let fields: Vec<&str> = record.iter().collect();
        if fields.iter().all(|f| f.is_empty()) || is_header(&fields) {
            continue;
        }

        match parse_row(&fields) {
            Ok(draft) => report.drafts.push(draft),
            Err(reason) => {
                tracing::debug!("Skipping CSV record {}: {}", line, reason);
                report.rejected.push(RejectedRow { line, reason });
            }
        }
    }

    tracing::info!(
        "Read {} CSV records, rejected {}",
        report.accepted(),
        report.skipped()
    );
    Ok(report)
}

/// Write the header and every non-blank multidose entry's raw text.
pub fn export_rows<W: Write>(table: &RegimenTable, writer: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(HEADER)?;

    let mut count = 0;
    for entry in table.entries().iter().filter(|e| !e.is_blank()) {
        writer.write_record([entry.time.as_str(), entry.dose.as_str(), entry.method.key()])?;
        count += 1;
    }
    writer.flush()?;

    tracing::debug!("Exported {} entries", count);
    Ok(count)
}
