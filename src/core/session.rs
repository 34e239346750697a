//! Purpose: Explicit engine context: one database directory, its cursors, and its scratch transaction.
//! Exports: `Session`, `SessionOptions`, `Transaction`.
//! Role: Every component receives a `&Session`; nothing holds ambient connection state.
//! Invariants: At most one transaction per session; uncommitted writes never reach disk.
//! Invariants: Open cursors are counted and released on drop, on every exit path.
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::cursor::TableCursor;
use crate::core::error::{Error, ErrorKind};
use crate::core::layout::{self, Layout};
use crate::core::table::{self, TableFile};

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub create: bool,
    pub layout: Layout,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the database directory when it does not exist.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

#[derive(Debug)]
pub struct Session {
    home: PathBuf,
    layout: Layout,
    open_cursors: Cell<usize>,
    in_transaction: Cell<bool>,
}

impl Session {
    pub fn open(home: impl AsRef<Path>, options: SessionOptions) -> Result<Self, Error> {
        let home = home.as_ref().to_path_buf();
        match fs::metadata(&home) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::new(ErrorKind::Connection)
                    .with_message("database path is not a directory")
                    .with_path(&home));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && options.create => {
                fs::create_dir_all(&home).map_err(|err| {
                    Error::new(ErrorKind::Connection)
                        .with_message("failed to create database directory")
                        .with_path(&home)
                        .with_source(err)
                })?;
            }
            Err(err) => {
                return Err(Error::new(ErrorKind::Connection)
                    .with_message("failed to open database directory")
                    .with_path(&home)
                    .with_source(err));
            }
        }
        debug!(home = %home.display(), "session opened");
        Ok(Self {
            home,
            layout: options.layout,
            open_cursors: Cell::new(0),
            in_transaction: Cell::new(false),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.layout.file_path(&self.home, name)
    }

    pub fn open_cursor(&self, uri: &str) -> Result<TableCursor<'_>, Error> {
        let name = layout::parse_table_uri(uri)?;
        let path = self.table_path(name);
        TableCursor::open(self, name, &path)
    }

    /// Like `open_cursor`, but a missing table file yields `None`.
    pub fn open_cursor_if_exists(&self, uri: &str) -> Result<Option<TableCursor<'_>>, Error> {
        match self.open_cursor(uri) {
            Ok(cursor) => Ok(Some(cursor)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn open_cursor_count(&self) -> usize {
        self.open_cursors.get()
    }

    pub fn begin_transaction(&self) -> Result<Transaction<'_>, Error> {
        if self.in_transaction.get() {
            return Err(Error::new(ErrorKind::Busy)
                .with_message("a transaction is already active on this session"));
        }
        self.in_transaction.set(true);
        debug!("transaction started");
        Ok(Transaction {
            session: self,
            created: BTreeSet::new(),
            writes: BTreeMap::new(),
            finished: false,
        })
    }

    pub fn close(self) -> Result<(), Error> {
        if self.open_cursors.get() > 0 || self.in_transaction.get() {
            return Err(Error::new(ErrorKind::Busy)
                .with_message("session still has open cursors or an active transaction")
                .with_path(&self.home));
        }
        debug!(home = %self.home.display(), "session closed");
        Ok(())
    }

    pub(crate) fn cursor_opened(&self) {
        self.open_cursors.set(self.open_cursors.get() + 1);
    }

    pub(crate) fn cursor_closed(&self) {
        self.open_cursors.set(self.open_cursors.get().saturating_sub(1));
    }
}

/// Buffered writes against one session. Dropping without `commit` rolls back.
pub struct Transaction<'s> {
    session: &'s Session,
    created: BTreeSet<String>,
    writes: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    finished: bool,
}

impl Transaction<'_> {
    /// Idempotent; the table becomes visible to `insert` in this transaction.
    pub fn create_table(&mut self, uri: &str) -> Result<(), Error> {
        let name = layout::parse_table_uri(uri)?;
        self.created.insert(name.to_string());
        Ok(())
    }

    pub fn insert(&mut self, uri: &str, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let name = layout::parse_table_uri(uri)?;
        if !self.created.contains(name) && !self.session.table_path(name).is_file() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("table `{name}` does not exist"))
                .with_path(self.session.table_path(name)));
        }
        self.writes
            .entry(name.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.values().map(BTreeMap::len).sum()
    }

    pub fn rollback(mut self) -> Result<(), Error> {
        let discarded = self.pending_writes();
        self.created.clear();
        self.writes.clear();
        self.finished = true;
        debug!(discarded, "transaction rolled back");
        Ok(())
    }

    /// Merges buffered writes into each touched table and rewrites it atomically.
    pub fn commit(mut self) -> Result<(), Error> {
        let mut names = self.created.clone();
        names.extend(self.writes.keys().cloned());
        for name in names {
            let path = self.session.table_path(&name);
            let mut records = if path.is_file() {
                TableFile::open(&path)?.read_all()?
            } else {
                BTreeMap::new()
            };
            if let Some(writes) = self.writes.remove(&name) {
                records.extend(writes);
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|err| {
                    Error::new(ErrorKind::Io).with_path(parent).with_source(err)
                })?;
            }
            table::write_table(&path, &records)?;
            debug!(table = %name, records = records.len(), "table committed");
        }
        self.finished = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(discarded = self.pending_writes(), "transaction dropped; rolled back");
        }
        self.session.in_transaction.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionOptions};
    use crate::core::error::ErrorKind;

    #[test]
    fn missing_directory_is_connection_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Session::open(dir.path().join("nope"), SessionOptions::new()).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn file_path_is_connection_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").expect("write");
        let err = Session::open(&file, SessionOptions::new()).expect_err("file");
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn create_option_makes_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().join("db");
        let session = Session::open(&home, SessionOptions::new().create(true)).expect("open");
        assert!(home.is_dir());
        session.close().expect("close");
    }

    #[test]
    fn rollback_discards_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::open(dir.path(), SessionOptions::new()).expect("open");
        let mut txn = session.begin_transaction().expect("txn");
        txn.create_table("table:scratch").expect("create");
        txn.insert("table:scratch", b"k", b"v").expect("insert");
        assert_eq!(txn.pending_writes(), 1);
        txn.rollback().expect("rollback");

        assert!(!dir.path().join("scratch.wt").exists());
        assert!(session.begin_transaction().is_ok());
    }

    #[test]
    fn dropped_transaction_is_rolled_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::open(dir.path(), SessionOptions::new()).expect("open");
        {
            let mut txn = session.begin_transaction().expect("txn");
            txn.create_table("table:scratch").expect("create");
            txn.insert("table:scratch", b"k", b"v").expect("insert");
        }
        assert!(!dir.path().join("scratch.wt").exists());
    }

    #[test]
    fn commit_merges_into_existing_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::open(dir.path(), SessionOptions::new()).expect("open");

        let mut txn = session.begin_transaction().expect("txn");
        txn.create_table("table:t").expect("create");
        txn.insert("table:t", b"a", b"1").expect("insert");
        txn.commit().expect("commit");

        let mut txn = session.begin_transaction().expect("txn");
        txn.insert("table:t", b"b", b"2").expect("insert");
        txn.insert("table:t", b"a", b"9").expect("overwrite");
        txn.commit().expect("commit");

        let records = session
            .open_cursor("table:t")
            .expect("cursor")
            .map(|record| record.expect("record"))
            .map(|record| (record.key, record.value))
            .collect::<Vec<_>>();
        assert_eq!(
            records,
            vec![(b"a".to_vec(), b"9".to_vec()), (b"b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn insert_into_unknown_table_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::open(dir.path(), SessionOptions::new()).expect("open");
        let mut txn = session.begin_transaction().expect("txn");
        let err = txn.insert("table:ghost", b"k", b"v").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn second_transaction_is_busy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::open(dir.path(), SessionOptions::new()).expect("open");
        let _txn = session.begin_transaction().expect("txn");
        match session.begin_transaction() {
            Ok(_) => panic!("expected busy"),
            Err(err) => assert_eq!(err.kind(), ErrorKind::Busy),
        }
    }
}
