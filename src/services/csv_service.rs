//! CSV mechanics: delimiter sniffing, strict parsing, and JSON row
//! rendering.
//!
//! Everything here operates on an in-memory byte buffer. Callers own the
//! bytes; nothing is mutated (sniffing builds an independent reader per
//! candidate).

use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Number, Value};
use tracing::debug;

use super::{ServiceError, ServiceResult};

/// Candidate delimiters, tried in priority order.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Fallback when no candidate splits the sample into more than one column.
pub const DEFAULT_DELIMITER: u8 = b',';

/// How many records beyond the header a sniffing trial parse reads.
const SNIFF_SAMPLE_ROWS: usize = 5;

/// A fully parsed CSV buffer: header names plus every data record.
#[derive(Debug)]
pub struct ParsedCsv {
    pub columns: Vec<String>,
    pub records: Vec<StringRecord>,
}

impl ParsedCsv {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Detect the most plausible field delimiter by trial-parsing a small
/// sample with each candidate. The first candidate that parses cleanly
/// and splits the header into more than one column wins; single-column
/// files fall back to the default. Heuristic only — the full parse that
/// follows still decides whether the file is acceptable.
pub fn sniff_delimiter(content: &[u8]) -> u8 {
    for candidate in DELIMITER_CANDIDATES {
        match sample_column_count(content, candidate) {
            Some(columns) if columns > 1 => {
                debug!(
                    delimiter = %delimiter_label(candidate),
                    columns,
                    "detected delimiter from sample"
                );
                return candidate;
            }
            _ => {}
        }
    }
    debug!("no candidate split the sample; falling back to default delimiter");
    DEFAULT_DELIMITER
}

/// Column count of the sample when it parses cleanly with `delimiter`,
/// `None` when the trial parse errors.
fn sample_column_count(content: &[u8], delimiter: u8) -> Option<usize> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(content);
    let columns = reader.headers().ok()?.len();
    for record in reader.records().take(SNIFF_SAMPLE_ROWS) {
        record.ok()?;
    }
    Some(columns)
}

/// Parse the whole buffer with a known delimiter.
///
/// Strict: ragged rows, broken quoting, and invalid UTF-8 are all
/// reported as [`ServiceError::Parse`], as is a buffer with no header at
/// all. A header-only file parses to zero records.
pub fn parse_csv(content: &[u8], delimiter: u8) -> ServiceResult<ParsedCsv> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(content);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| ServiceError::Parse(err.to_string()))?
        .iter()
        .map(str::to_owned)
        .collect();
    if columns.is_empty() {
        return Err(ServiceError::Parse("no columns to parse from file".into()));
    }

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record.map_err(|err| ServiceError::Parse(err.to_string()))?);
    }

    Ok(ParsedCsv { columns, records })
}

/// How a column's raw values are rendered into JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

/// Render the data records in `[start, end)` as ordered column → value
/// maps.
///
/// Each column's kind is decided over the whole file rather than the
/// requested slice, so a row renders the same regardless of which page it
/// lands on: a column where every non-empty value parses as `i64` renders
/// as integers, else as floats when every value is a finite `f64`,
/// otherwise as raw text. Empty cells render as `null`.
pub fn render_rows(parsed: &ParsedCsv, start: usize, end: usize) -> Vec<Map<String, Value>> {
    let kinds = classify_columns(parsed);
    parsed.records[start..end]
        .iter()
        .map(|record| {
            parsed
                .columns
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let raw = record.get(idx).unwrap_or("");
                    (name.clone(), render_value(raw, kinds[idx]))
                })
                .collect()
        })
        .collect()
}

fn classify_columns(parsed: &ParsedCsv) -> Vec<ColumnKind> {
    (0..parsed.column_count())
        .map(|idx| {
            let mut kind = ColumnKind::Integer;
            let mut saw_value = false;
            for record in &parsed.records {
                let raw = record.get(idx).unwrap_or("").trim();
                if raw.is_empty() {
                    continue;
                }
                saw_value = true;
                if kind == ColumnKind::Integer && raw.parse::<i64>().is_err() {
                    kind = ColumnKind::Float;
                }
                if kind == ColumnKind::Float && !parses_as_finite_float(raw) {
                    kind = ColumnKind::Text;
                    break;
                }
            }
            // A column with no values at all has no numeric evidence.
            if saw_value { kind } else { ColumnKind::Text }
        })
        .collect()
}

fn parses_as_finite_float(raw: &str) -> bool {
    raw.parse::<f64>().is_ok_and(f64::is_finite)
}

fn render_value(raw: &str, kind: ColumnKind) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnKind::Text => Value::String(raw.to_owned()),
    }
}

/// Single-character label persisted in the catalog for a delimiter byte.
pub fn delimiter_label(delimiter: u8) -> String {
    (delimiter as char).to_string()
}

/// Recover the delimiter byte from its persisted label.
pub fn delimiter_from_label(label: &str) -> ServiceResult<u8> {
    match label.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(ServiceError::Parse(format!(
            "stored delimiter {label:?} is not a single character"
        ))),
    }
}
