//! Purpose: Export namespaces as line-delimited extended JSON.
//! Exports: `export_one`, `export_all`, `ExportSummary`, `ExportedNamespace`, `SkippedNamespace`, `SkipReason`.
//! Role: Single-namespace export for stdout and bulk export to one artifact per namespace.
//! Invariants: Namespaces whose collection file is absent or unreadable are skipped, never errors.
//! Invariants: The first catalog entry for a namespace wins; an artifact is only renamed into place once complete.
//! Invariants: Artifacts contain only records that decoded; failures are counted.
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::catalog::CatalogReader;
use crate::core::cursor::TableCursor;
use crate::core::dump::{self, DumpMode, DumpOptions, DumpSummary, RecordOutput};
use crate::core::error::{Error, ErrorKind, io_error_kind};
use crate::core::layout::table_uri;
use crate::core::probe::probe;
use crate::core::session::Session;

#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportSummary {
    pub exported: Vec<ExportedNamespace>,
    pub skipped: Vec<SkippedNamespace>,
}

impl ExportSummary {
    pub fn exported_count(&self) -> usize {
        self.exported.len()
    }

    fn skip(&mut self, namespace: String, reason: SkipReason) {
        self.skipped.push(SkippedNamespace { namespace, reason });
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExportedNamespace {
    pub namespace: String,
    pub path: PathBuf,
    pub records: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedNamespace {
    pub namespace: String,
    pub reason: SkipReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingArtifact,
    InvalidName,
    /// A later catalog entry for a namespace already handled.
    Duplicate,
    /// The collection file exists but is not a readable table.
    Unreadable,
}

pub fn export_one(session: &Session, namespace: &str) -> Result<Vec<RecordOutput>, Error> {
    let entry = CatalogReader::new(session)
        .resolve(namespace)?
        .ok_or_else(|| namespace_not_found(namespace))?;
    dump::dump(session, &entry.ident, DumpMode::Compact)
}

pub fn export_all(session: &Session, out_dir: &Path) -> Result<ExportSummary, Error> {
    fs::create_dir_all(out_dir).map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_message("failed to create export directory")
            .with_path(out_dir)
            .with_source(err)
    })?;

    let mut summary = ExportSummary::default();
    let mut seen = HashSet::new();
    for entry in CatalogReader::new(session).entries()? {
        let entry = entry?;
        if !seen.insert(entry.namespace.clone()) {
            warn!(namespace = %entry.namespace, ident = %entry.ident, "duplicate catalog entry; skipped");
            summary.skip(entry.namespace, SkipReason::Duplicate);
            continue;
        }
        if !is_safe_file_stem(&entry.namespace) {
            warn!(namespace = %entry.namespace, "namespace is not a valid file name; skipped");
            summary.skip(entry.namespace, SkipReason::InvalidName);
            continue;
        }
        if !probe(session, &entry.ident).exists {
            warn!(namespace = %entry.namespace, ident = %entry.ident, "collection file missing; skipped");
            summary.skip(entry.namespace, SkipReason::MissingArtifact);
            continue;
        }

        let cursor = match session.open_cursor(&table_uri(&entry.ident)) {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(namespace = %entry.namespace, error = %err, "collection table unreadable; skipped");
                summary.skip(entry.namespace, SkipReason::Unreadable);
                continue;
            }
        };
        let table_path = cursor.path().to_path_buf();
        let path = out_dir.join(format!("{}.json", entry.namespace));
        let staging = out_dir.join(format!("{}.json.tmp", entry.namespace));
        match write_artifact(cursor, &staging) {
            Ok(dumped) => {
                fs::rename(&staging, &path).map_err(|err| {
                    let _ = fs::remove_file(&staging);
                    Error::new(io_error_kind(&err))
                        .with_message("failed to finalize export artifact")
                        .with_path(&path)
                        .with_source(err)
                })?;
                info!(namespace = %entry.namespace, records = dumped.records, "namespace exported");
                summary.exported.push(ExportedNamespace {
                    namespace: entry.namespace,
                    path,
                    records: dumped.records - dumped.failed,
                    failed: dumped.failed,
                });
            }
            Err(err) => {
                let _ = fs::remove_file(&staging);
                // Table failures carry the table path; anything else is the output side.
                if err.path() != Some(table_path.as_path()) {
                    return Err(match err.path() {
                        Some(_) => err,
                        None => err.with_path(&path),
                    });
                }
                warn!(namespace = %entry.namespace, error = %err, "collection table unreadable; skipped");
                summary.skip(entry.namespace, SkipReason::Unreadable);
            }
        }
    }
    Ok(summary)
}

fn write_artifact(cursor: TableCursor<'_>, path: &Path) -> Result<DumpSummary, Error> {
    let file = File::create(path).map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_message("failed to create export artifact")
            .with_path(path)
            .with_source(err)
    })?;
    let mut writer = BufWriter::new(file);
    let options = DumpOptions::new(DumpMode::Compact).skip_failed(true);
    dump::write_cursor(cursor, &options, &mut writer)
}

fn namespace_not_found(namespace: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message(format!("namespace `{namespace}` is not in the catalog"))
        .with_key(namespace)
}

fn is_safe_file_stem(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace != "."
        && namespace != ".."
        && !namespace.contains(['/', '\\', '\0'])
}
