//! Purpose: Per-namespace space accounting joined from catalog, statistics, and disk state.
//! Exports: `report`, `NamespaceReport`, `StatsBlock`, `IndexReport`, `Warning`, `is_internal_namespace`.
//! Role: Structured data only; rendering and coloring belong to the CLI.
//! Invariants: Every catalog namespace appears, even when its artifacts are missing.
//! Invariants: Stats are reported only for an existing main file; utilization only for a non-empty one.
//! Invariants: Index sizes are summed over every existing index file.
use std::path::PathBuf;

use tracing::debug;

use crate::core::catalog::{CatalogEntry, CatalogReader};
use crate::core::error::Error;
use crate::core::probe::{DiskFileRef, probe};
use crate::core::session::Session;
use crate::core::sizes::SizeStore;

const INTERNAL_PREFIXES: [&str; 3] = ["admin", "local", "config"];

#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceReport {
    pub namespace: String,
    pub ident: String,
    pub file: DiskFileRef,
    pub stats: Option<StatsBlock>,
    pub indexes: Vec<IndexReport>,
    pub index_size_bytes: u64,
    pub total_size_bytes: u64,
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatsBlock {
    pub data_size: u64,
    pub num_records: u64,
    /// Percent of the file occupied by live data, rounded to two decimals.
    pub utilization_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexReport {
    pub name: String,
    pub ident: String,
    pub file: DiskFileRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// `index` is set when the missing file backs an index.
    MissingArtifact {
        ident: String,
        path: PathBuf,
        index: Option<String>,
    },
    MissingStatistics {
        ident: String,
    },
}

impl Warning {
    pub fn code(&self) -> &'static str {
        match self {
            Warning::MissingArtifact { .. } => "missing_artifact",
            Warning::MissingStatistics { .. } => "missing_statistics",
        }
    }
}

impl NamespaceReport {
    pub fn is_internal(&self) -> bool {
        is_internal_namespace(&self.namespace)
    }
}

/// Prefix match on the reserved database names, as the server's own tools do.
pub fn is_internal_namespace(namespace: &str) -> bool {
    INTERNAL_PREFIXES
        .iter()
        .any(|prefix| namespace.starts_with(prefix))
}

pub fn report(session: &Session) -> Result<Vec<NamespaceReport>, Error> {
    let sizes = SizeStore::open(session)?;
    let mut out = Vec::new();
    for entry in CatalogReader::new(session).entries()? {
        out.push(report_entry(session, &sizes, &entry?)?);
    }
    Ok(out)
}

pub fn report_entry(
    session: &Session,
    sizes: &SizeStore<'_>,
    entry: &CatalogEntry,
) -> Result<NamespaceReport, Error> {
    let mut warnings = Vec::new();
    let file = probe(session, &entry.ident);

    let stats = if file.exists {
        match sizes.lookup(&entry.ident)? {
            Some(stat) => Some(StatsBlock {
                data_size: stat.data_size,
                num_records: stat.num_records,
                utilization_pct: utilization_pct(stat.data_size, file.size_bytes),
            }),
            None => {
                warnings.push(Warning::MissingStatistics {
                    ident: entry.ident.clone(),
                });
                None
            }
        }
    } else {
        debug!(namespace = %entry.namespace, path = %file.path.display(), "collection file missing");
        warnings.push(Warning::MissingArtifact {
            ident: entry.ident.clone(),
            path: file.path.clone(),
            index: None,
        });
        None
    };

    let mut indexes = Vec::with_capacity(entry.index_idents.len());
    let mut index_size_bytes = 0u64;
    for (name, ident) in &entry.index_idents {
        let index_file = probe(session, ident);
        if index_file.exists {
            index_size_bytes = index_size_bytes.saturating_add(index_file.size_bytes);
        } else {
            debug!(namespace = %entry.namespace, index = %name, "index file missing");
            warnings.push(Warning::MissingArtifact {
                ident: ident.clone(),
                path: index_file.path.clone(),
                index: Some(name.clone()),
            });
        }
        indexes.push(IndexReport {
            name: name.clone(),
            ident: ident.clone(),
            file: index_file,
        });
    }

    let data_size = stats.as_ref().map_or(0, |stats| stats.data_size);
    Ok(NamespaceReport {
        namespace: entry.namespace.clone(),
        ident: entry.ident.clone(),
        file,
        stats,
        indexes,
        index_size_bytes,
        total_size_bytes: data_size.saturating_add(index_size_bytes),
        warnings,
    })
}

fn utilization_pct(data_size: u64, file_size: u64) -> Option<f64> {
    if file_size == 0 {
        return None;
    }
    let pct = data_size as f64 * 100.0 / file_size as f64;
    Some((pct * 100.0).round() / 100.0)
}
