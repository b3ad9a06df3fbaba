//! CSV encoding of per-principal audit logs.
//!
//! Readers resolve columns by header name, so producers may append new
//! trailing columns without breaking older readers and older files stay
//! readable by newer code.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use csv::{Position, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::warn;

use coffer_core::{AppError, AppResult};
use coffer_domain::{AuditEvent, AuditEventType};

/// Column order written by this version. New columns go after `actor`.
pub const AUDIT_LOG_COLUMNS: [&str; 12] = [
    "event_id",
    "event_type",
    "timestamp",
    "principal",
    "subject_name",
    "storage_key",
    "size_bytes",
    "content_type",
    "origin_address",
    "client_descriptor",
    "session_token",
    "actor",
];

const CORE_COLUMNS: [&str; 4] = ["event_id", "event_type", "timestamp", "principal"];

const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Result of decoding one audit log document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedAuditLog {
    /// Events in physical order.
    pub events: Vec<AuditEvent>,
    /// Number of data rows that could not be decoded and were skipped.
    pub skipped_rows: usize,
}

/// Encodes events as CSV lines, optionally preceded by the header row.
pub fn encode_audit_log(events: &[AuditEvent], include_header: bool) -> AppResult<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if include_header {
        writer
            .write_record(AUDIT_LOG_COLUMNS)
            .map_err(|error| AppError::Internal(format!("failed to encode audit header: {error}")))?;
    }

    for event in events {
        writer.write_record(event_fields(event)).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode audit event '{}': {error}",
                event.event_id
            ))
        })?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| AppError::Internal(format!("failed to flush audit encoder: {error}")))?;

    String::from_utf8(bytes)
        .map_err(|error| AppError::Internal(format!("audit encoder produced invalid UTF-8: {error}")))
}

/// Decodes an audit log document.
///
/// Rows with a missing or unparsable core column are skipped with a warning;
/// the remaining rows still decode. A row whose unterminated quote swallowed
/// the lines after it is skipped on its own and decoding resumes on the next
/// line.
#[must_use]
pub fn decode_audit_log(text: &str) -> DecodedAuditLog {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = match reader.headers() {
        Ok(headers) => ColumnIndex::from_headers(headers),
        Err(error) => {
            warn!(error = %error, "unreadable audit log header, ignoring document");
            return DecodedAuditLog::default();
        }
    };

    if columns.is_empty() {
        return DecodedAuditLog::default();
    }

    if let Some(missing) = columns.first_missing_core_column() {
        warn!(
            column = missing,
            "audit log header lacks a core column, ignoring document"
        );
        return DecodedAuditLog::default();
    }

    let mut decoded = DecodedAuditLog::default();
    let mut segment = BodySegment {
        offset: byte_offset(reader.position()),
        first_line: reader.position().line(),
    };
    while let Some(next) = columns.decode_segment(text, segment, &mut decoded) {
        segment = next;
    }

    decoded
}

/// Reports whether `text` starts with a header naming every core column.
pub(crate) fn has_audit_header(text: &str) -> bool {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    reader.headers().is_ok_and(|headers| {
        ColumnIndex::from_headers(headers)
            .first_missing_core_column()
            .is_none()
    })
}

/// Header row alone, newline terminated.
pub(crate) fn audit_log_header() -> AppResult<String> {
    encode_audit_log(&[], true)
}

#[derive(Debug, Clone, Copy)]
struct BodySegment {
    offset: usize,
    first_line: u64,
}

impl BodySegment {
    fn line_of(self, position: &Position) -> u64 {
        self.first_line + position.line().saturating_sub(1)
    }
}

fn byte_offset(position: &Position) -> usize {
    usize::try_from(position.byte()).unwrap_or(usize::MAX)
}

fn event_fields(event: &AuditEvent) -> [String; 12] {
    [
        event.event_id.clone(),
        event.event_type.as_str().to_owned(),
        event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        event.principal.clone(),
        event.subject_name.clone(),
        event.storage_key.clone(),
        event
            .size_bytes
            .map(|size| size.to_string())
            .unwrap_or_default(),
        event.content_type.clone().unwrap_or_default(),
        event.origin_address.clone().unwrap_or_default(),
        event.client_descriptor.clone().unwrap_or_default(),
        event.session_token.clone().unwrap_or_default(),
        event.actor.clone(),
    ]
}

#[derive(Debug)]
enum RowDefect {
    MissingValue(&'static str),
    InvalidTimestamp(String),
}

impl Display for RowDefect {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue(column) => write!(formatter, "missing value for '{column}'"),
            Self::InvalidTimestamp(value) => write!(formatter, "invalid timestamp '{value}'"),
        }
    }
}

struct ColumnIndex {
    positions: HashMap<String, usize>,
    width: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(position, name)| {
                (
                    name.trim_start_matches('\u{feff}').trim().to_owned(),
                    position,
                )
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();

        Self {
            positions,
            width: headers.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Decodes the rows of `text` starting at `segment`.
    ///
    /// Returns the segment to resume from when a row ran past its own line
    /// because of an unterminated quote.
    fn decode_segment(
        &self,
        text: &str,
        segment: BodySegment,
        decoded: &mut DecodedAuditLog,
    ) -> Option<BodySegment> {
        let body = text.get(segment.offset..)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());

        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(error) => {
                    warn!(
                        line = error.position().map(|position| segment.line_of(position)),
                        error = %error,
                        "skipping unreadable audit log row"
                    );
                    decoded.skipped_rows += 1;
                    continue;
                }
            };

            let (start, line) = row.position().map_or((0, segment.first_line), |position| {
                (byte_offset(position), segment.line_of(position))
            });

            if self.swallowed_following_lines(&row) {
                warn!(line, "skipping audit log row with an unterminated quote");
                decoded.skipped_rows += 1;
                let line_end = body
                    .get(start..)
                    .and_then(|rest| {
                        let row_text = rest.trim_start_matches(['\r', '\n']);
                        row_text
                            .find('\n')
                            .map(|newline| rest.len() - row_text.len() + newline)
                    })
                    .map(|newline| segment.offset + start + newline + 1)?;
                return Some(BodySegment {
                    offset: line_end,
                    first_line: line + 1,
                });
            }

            match self.decode_row(&row, line) {
                Ok(event) => decoded.events.push(event),
                Err(defect) => {
                    warn!(line, defect = %defect, "skipping malformed audit log row");
                    decoded.skipped_rows += 1;
                }
            }
        }

        None
    }

    /// A short row whose last value spans lines opened a quote it never closed.
    fn swallowed_following_lines(&self, row: &StringRecord) -> bool {
        row.len() < self.width
            && row
                .iter()
                .last()
                .is_some_and(|value| value.contains('\n'))
    }

    fn first_missing_core_column(&self) -> Option<&'static str> {
        CORE_COLUMNS
            .into_iter()
            .find(|column| !self.positions.contains_key(*column))
    }

    fn raw<'a>(&self, row: &'a StringRecord, column: &str) -> Option<&'a str> {
        self.positions
            .get(column)
            .and_then(|position| row.get(*position))
    }

    fn optional_text(&self, row: &StringRecord, column: &str) -> Option<String> {
        self.raw(row, column)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_owned)
    }

    fn optional_number(&self, row: &StringRecord, column: &str, line: u64) -> Option<u64> {
        let value = self.optional_text(row, column)?;
        match value.trim().parse::<u64>() {
            Ok(number) => Some(number),
            Err(error) => {
                warn!(
                    line,
                    column,
                    value = %value,
                    error = %error,
                    "ignoring unparsable numeric audit field"
                );
                None
            }
        }
    }

    fn required_text(&self, row: &StringRecord, column: &'static str) -> Result<String, RowDefect> {
        self.optional_text(row, column)
            .ok_or(RowDefect::MissingValue(column))
    }

    fn decode_row(&self, row: &StringRecord, line: u64) -> Result<AuditEvent, RowDefect> {
        let event_id = self.required_text(row, "event_id")?;
        let event_type = AuditEventType::from(self.required_text(row, "event_type")?);
        let raw_timestamp = self.required_text(row, "timestamp")?;
        let timestamp = parse_timestamp(&raw_timestamp)
            .ok_or(RowDefect::InvalidTimestamp(raw_timestamp))?;
        let principal = self.required_text(row, "principal")?;
        let actor = self
            .optional_text(row, "actor")
            .unwrap_or_else(|| principal.clone());

        Ok(AuditEvent {
            event_id,
            event_type,
            timestamp,
            subject_name: self.raw(row, "subject_name").unwrap_or_default().to_owned(),
            storage_key: self.raw(row, "storage_key").unwrap_or_default().to_owned(),
            size_bytes: self.optional_number(row, "size_bytes", line),
            content_type: self.optional_text(row, "content_type"),
            origin_address: self.optional_text(row, "origin_address"),
            client_descriptor: self.optional_text(row, "client_descriptor"),
            session_token: self.optional_text(row, "session_token"),
            actor,
            principal,
        })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, NAIVE_TIMESTAMP_FORMAT)
                .ok()
                .map(|timestamp| timestamp.and_utc())
        })
}
