//! Purpose: Render every record of one table as raw bytes or decoded documents.
//! Exports: `DumpMode`, `DumpOptions`, `RecordOutput`, `DumpSummary`, `dump`, `write_to`, `render_key`.
//! Role: Backs the `table` command and the export pipeline.
//! Invariants: Records come out in table key order; the cursor is released on every exit path.
//! Invariants: A record that fails to decode is reported in place; table corruption aborts.
use std::io::Write;

use bstr::BStr;
use tracing::warn;

use crate::core::cursor::{Record, TableCursor};
use crate::core::doc;
use crate::core::error::{Error, ErrorKind};
use crate::core::extjson;
use crate::core::layout::table_uri;
use crate::core::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpMode {
    /// Undecoded value bytes, escaped, one line per record.
    Raw,
    /// Undecoded value bytes under a key banner.
    RawPretty,
    /// One extended-JSON line per record.
    Compact,
    /// Indented extended JSON under a key banner.
    Pretty,
}

impl DumpMode {
    pub fn from_flags(raw: bool, pretty: bool) -> Self {
        match (raw, pretty) {
            (true, true) => DumpMode::RawPretty,
            (true, false) => DumpMode::Raw,
            (false, true) => DumpMode::Pretty,
            (false, false) => DumpMode::Compact,
        }
    }

    fn is_banner(self) -> bool {
        matches!(self, DumpMode::RawPretty | DumpMode::Pretty)
    }
}

#[derive(Debug)]
pub enum RecordOutput {
    Rendered { key: String, text: String },
    Failed { key: String, error: Error },
}

impl RecordOutput {
    pub fn key(&self) -> &str {
        match self {
            RecordOutput::Rendered { key, .. } | RecordOutput::Failed { key, .. } => key,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RecordOutput::Failed { .. })
    }

    /// The rendered text, or a flagged line for a record that failed to decode.
    pub fn text(&self, mode: DumpMode) -> String {
        match self {
            RecordOutput::Rendered { text, .. } => text.clone(),
            RecordOutput::Failed { key, error } => {
                let reason = error.message().unwrap_or("undecodable record");
                if mode.is_banner() {
                    format!("{}\n!! decode failed: {reason}", banner(key))
                } else {
                    format!("!! decode failed for key {key}: {reason}")
                }
            }
        }
    }
}

/// Renders an already-converted document body for the banner modes.
pub type PrettyRenderer = fn(&serde_json::Value) -> String;

#[derive(Clone, Copy, Debug)]
pub struct DumpOptions {
    pub mode: DumpMode,
    /// Count undecodable records without writing them.
    pub skip_failed: bool,
    pub pretty_renderer: Option<PrettyRenderer>,
}

impl DumpOptions {
    pub fn new(mode: DumpMode) -> Self {
        Self {
            mode,
            skip_failed: false,
            pretty_renderer: None,
        }
    }

    pub fn skip_failed(mut self, skip: bool) -> Self {
        self.skip_failed = skip;
        self
    }

    pub fn with_pretty_renderer(mut self, renderer: PrettyRenderer) -> Self {
        self.pretty_renderer = Some(renderer);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub records: usize,
    pub failed: usize,
}

pub fn dump(session: &Session, table: &str, mode: DumpMode) -> Result<Vec<RecordOutput>, Error> {
    let options = DumpOptions::new(mode);
    let cursor = session.open_cursor(&table_uri(table))?;
    let mut out = Vec::new();
    for record in cursor {
        out.push(render_record(&record?, &options));
    }
    Ok(out)
}

/// Streams a dump into `out` and counts what was rendered.
pub fn write_to<W: Write>(
    session: &Session,
    table: &str,
    options: &DumpOptions,
    out: &mut W,
) -> Result<DumpSummary, Error> {
    let cursor = session.open_cursor(&table_uri(table))?;
    write_cursor(cursor, options, out)
}

/// Streams an already-open cursor into `out`; the cursor is released on return.
pub(crate) fn write_cursor<W: Write>(
    cursor: TableCursor<'_>,
    options: &DumpOptions,
    out: &mut W,
) -> Result<DumpSummary, Error> {
    let table = cursor.name().to_string();
    let mut summary = DumpSummary::default();
    for record in cursor {
        let output = render_record(&record?, options);
        summary.records += 1;
        if output.is_failed() {
            summary.failed += 1;
            warn!(table = %table, key = %output.key(), "record failed to decode");
            if options.skip_failed {
                continue;
            }
        }
        write_block(out, &output.text(options.mode), options.mode)?;
    }
    out.flush().map_err(write_error)?;
    Ok(summary)
}

pub fn render_record(record: &Record, options: &DumpOptions) -> RecordOutput {
    let key = render_key(&record.key);
    let text = match options.mode {
        DumpMode::Raw => Ok(raw_text(&record.value)),
        DumpMode::RawPretty => Ok(format!("{}\n{}", banner(&key), raw_text(&record.value))),
        DumpMode::Compact => {
            doc::decode(&record.value).and_then(|document| extjson::to_compact_line(&document))
        }
        DumpMode::Pretty => doc::decode(&record.value)
            .and_then(|document| match options.pretty_renderer {
                Some(render) => Ok(render(&extjson::to_extended_json(&document))),
                None => extjson::to_pretty_string(&document),
            })
            .map(|body| format!("{}\n{body}", banner(&key))),
    };
    match text {
        Ok(text) => RecordOutput::Rendered { key, text },
        Err(error) => RecordOutput::Failed {
            error: error.with_key(key.clone()),
            key,
        },
    }
}

/// Printable UTF-8 keys as text, 8-byte record ids as integers, anything else as hex.
pub fn render_key(key: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(key) {
        if !text.chars().any(char::is_control) {
            return text.to_string();
        }
    }
    if let Ok(id) = <[u8; 8]>::try_from(key) {
        return i64::from_be_bytes(id).to_string();
    }
    let mut hex = String::with_capacity(key.len() * 2 + 2);
    hex.push_str("0x");
    for byte in key {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

fn banner(key: &str) -> String {
    format!("-----Key: {key}-----")
}

fn raw_text(value: &[u8]) -> String {
    format!("{:?}", BStr::new(value))
}

fn write_block<W: Write>(out: &mut W, text: &str, mode: DumpMode) -> Result<(), Error> {
    out.write_all(text.as_bytes())
        .and_then(|_| out.write_all(b"\n"))
        .and_then(|_| {
            if mode.is_banner() {
                out.write_all(b"\n")
            } else {
                Ok(())
            }
        })
        .map_err(write_error)
}

fn write_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write dump output")
        .with_source(err)
}
