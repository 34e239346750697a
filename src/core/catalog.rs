//! Purpose: Resolve logical namespaces to the storage idents recorded in the catalog table.
//! Exports: `CatalogEntry`, `CatalogReader`, `CatalogEntries`.
//! Role: Source of truth for reports and exports; every other lookup is keyed by ident.
//! Invariants: Entries stream in catalog key order; records without a namespace are skipped.
//! Invariants: A namespace with a malformed `ident`/`idxIdent` is a decode error, never skipped.
use std::collections::BTreeMap;

use tracing::debug;

use crate::core::cursor::{Record, TableCursor};
use crate::core::doc::{self, Document};
use crate::core::error::{Error, ErrorKind};
use crate::core::layout::table_uri;
use crate::core::session::Session;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub namespace: String,
    pub ident: String,
    /// Index name to index ident, sorted by index name.
    pub index_idents: BTreeMap<String, String>,
}

pub struct CatalogReader<'s> {
    session: &'s Session,
}

impl<'s> CatalogReader<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Opens a fresh cursor over the catalog. The cursor lives as long as the returned iterator.
    pub fn entries(&self) -> Result<CatalogEntries<'s>, Error> {
        let uri = table_uri(&self.session.layout().catalog_table);
        let cursor = self.session.open_cursor(&uri)?;
        Ok(CatalogEntries {
            cursor,
            failed: false,
        })
    }

    pub fn resolve(&self, namespace: &str) -> Result<Option<CatalogEntry>, Error> {
        for entry in self.entries()? {
            let entry = entry?;
            if entry.namespace == namespace {
                debug!(namespace, ident = %entry.ident, "namespace resolved");
                return Ok(Some(entry));
            }
        }
        debug!(namespace, "namespace not in catalog");
        Ok(None)
    }
}

pub struct CatalogEntries<'s> {
    cursor: TableCursor<'s>,
    failed: bool,
}

impl Iterator for CatalogEntries<'_> {
    type Item = Result<CatalogEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let record = match self.cursor.next()? {
                Ok(record) => record,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };
            match parse_entry(&record) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err.with_path(self.cursor.path())));
                }
            }
        }
    }
}

fn parse_entry(record: &Record) -> Result<Option<CatalogEntry>, Error> {
    let value = doc::decode(&record.value)?;
    let Some(map) = value.as_map() else {
        return Err(malformed("catalog value is not a document"));
    };
    let namespace = match map.get("ns") {
        None | Some(Document::Null) => return Ok(None),
        Some(Document::String(ns)) if ns.is_empty() => return Ok(None),
        Some(Document::String(ns)) => ns.clone(),
        Some(other) => {
            return Err(malformed(format!(
                "catalog `ns` must be a string, found {}",
                other.type_name()
            )));
        }
    };
    let ident = map
        .get_str("ident")
        .ok_or_else(|| malformed("catalog entry has no string `ident`").with_key(&namespace))?
        .to_string();

    let mut index_idents = BTreeMap::new();
    match map.get("idxIdent") {
        None | Some(Document::Null) => {}
        Some(Document::Map(indexes)) => {
            for (name, value) in indexes.iter() {
                let index_ident = value.as_str().ok_or_else(|| {
                    malformed(format!("index `{name}` ident must be a string")).with_key(&namespace)
                })?;
                index_idents.insert(name.to_string(), index_ident.to_string());
            }
        }
        Some(other) => {
            return Err(malformed(format!(
                "catalog `idxIdent` must be a document, found {}",
                other.type_name()
            ))
            .with_key(&namespace));
        }
    }

    Ok(Some(CatalogEntry {
        namespace,
        ident,
        index_idents,
    }))
}

fn malformed(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Decode).with_message(message)
}
