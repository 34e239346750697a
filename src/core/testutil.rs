// Test-only database builder shared by the core unit tests.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::doc::{self, DocMap, Document};
use crate::core::layout::Layout;
use crate::core::session::{Session, SessionOptions};
use crate::core::table::write_table;

pub(crate) struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn session(&self) -> Session {
        Session::open(self.path(), SessionOptions::new()).expect("session")
    }

    pub(crate) fn table(&self, name: &str, records: Vec<(Vec<u8>, Vec<u8>)>) {
        let path = Layout::default().file_path(self.path(), name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("table dir");
        }
        let records = records.into_iter().collect::<BTreeMap<_, _>>();
        write_table(&path, &records).expect("write table");
    }

    /// Writes documents keyed by ascending record ids starting at 1.
    pub(crate) fn documents(&self, name: &str, docs: &[DocMap]) {
        let records = docs
            .iter()
            .enumerate()
            .map(|(idx, map)| (record_id(idx as i64 + 1), encode_map(map)))
            .collect();
        self.table(name, records);
    }

    pub(crate) fn catalog(&self, docs: &[DocMap]) {
        self.documents("_mdb_catalog", docs);
    }

    pub(crate) fn sizes(&self, stats: &[(&str, i64, i64)]) {
        let records = stats
            .iter()
            .map(|(ident, data_size, num_records)| {
                let value = DocMap::new()
                    .with("numRecords", *num_records)
                    .with("dataSize", *data_size);
                (format!("table:{ident}").into_bytes(), encode_map(&value))
            })
            .collect();
        self.table("sizeStorer", records);
    }

    /// A plain file of `len` bytes standing in for an engine artifact.
    pub(crate) fn raw_file(&self, ident: &str, len: usize) {
        let path = Layout::default().file_path(self.path(), ident);
        fs::write(path, vec![0u8; len]).expect("raw file");
    }
}

pub(crate) fn catalog_entry(ns: &str, ident: &str, indexes: &[(&str, &str)]) -> DocMap {
    let mut map = DocMap::new().with("ns", ns).with("ident", ident);
    if !indexes.is_empty() {
        let idx = indexes
            .iter()
            .map(|(name, ident)| (name.to_string(), Document::from(*ident)))
            .collect::<DocMap>();
        map.insert("idxIdent", idx);
    }
    map
}

pub(crate) fn record_id(id: i64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

pub(crate) fn encode_map(map: &DocMap) -> Vec<u8> {
    doc::encode(&Document::Map(map.clone())).expect("encode")
}
