// Scoped table cursors: ordered iteration and point lookup over one table file.
use std::path::Path;

use tracing::debug;

use crate::core::error::Error;
use crate::core::session::Session;
use crate::core::table::{self, TableFile};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Iterates a table in ascending key order. Dropping the cursor releases its
/// file lock and its slot in the owning session.
pub struct TableCursor<'s> {
    session: &'s Session,
    name: String,
    table: TableFile,
    next_off: usize,
    previous: Option<Vec<u8>>,
    failed: bool,
}

impl<'s> TableCursor<'s> {
    pub(crate) fn open(session: &'s Session, name: &str, path: &Path) -> Result<Self, Error> {
        let table = TableFile::open(path)?;
        session.cursor_opened();
        debug!(table = name, records = table.header().record_count, "cursor opened");
        Ok(Self {
            session,
            name: name.to_string(),
            table,
            next_off: 0,
            previous: None,
            failed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.table.path()
    }

    /// Exact-match lookup. Leaves the iteration position untouched.
    pub fn search(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let region = self.table.region();
        let mut offset = 0;
        while let Some((record, next_off)) =
            table::read_record_at(region, offset).map_err(|err| err.with_path(self.path()))?
        {
            if record.key == key {
                return Ok(Some(record.value.to_vec()));
            }
            if record.key > key {
                break;
            }
            offset = next_off;
        }
        Ok(None)
    }

    fn advance(&mut self) -> Result<Option<Record>, Error> {
        let Some((record, next_off)) = table::read_record_at(self.table.region(), self.next_off)?
        else {
            return Ok(None);
        };
        table::check_ascending(self.previous.as_deref(), record.key)?;
        let record = Record {
            key: record.key.to_vec(),
            value: record.value.to_vec(),
        };
        self.previous = Some(record.key.clone());
        self.next_off = next_off;
        Ok(Some(record))
    }
}

impl Iterator for TableCursor<'_> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err.with_path(self.table.path())))
            }
        }
    }
}

impl Drop for TableCursor<'_> {
    fn drop(&mut self) {
        self.session.cursor_closed();
        debug!(table = %self.name, "cursor closed");
    }
}

#[cfg(test)]
mod tests {
    use crate::core::error::ErrorKind;
    use crate::core::session::{Session, SessionOptions};
    use crate::core::table::write_table;
    use std::collections::BTreeMap;

    fn session_with_table(records: &[(&str, &str)]) -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().expect("tempdir");
        let map = records
            .iter()
            .map(|(key, value)| (key.as_bytes().to_vec(), value.as_bytes().to_vec()))
            .collect::<BTreeMap<_, _>>();
        write_table(&dir.path().join("t.wt"), &map).expect("write");
        let session = Session::open(dir.path(), SessionOptions::new()).expect("session");
        (dir, session)
    }

    #[test]
    fn cursor_iterates_in_key_order() {
        let (_dir, session) = session_with_table(&[("b", "2"), ("a", "1"), ("c", "3")]);
        let cursor = session.open_cursor("table:t").expect("cursor");
        let keys = cursor
            .map(|record| String::from_utf8(record.expect("record").key).expect("utf8"))
            .collect::<Vec<_>>();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn cursor_slot_is_released_on_drop() {
        let (_dir, session) = session_with_table(&[("a", "1")]);
        {
            let mut cursor = session.open_cursor("table:t").expect("cursor");
            assert_eq!(session.open_cursor_count(), 1);
            let _ = cursor.next();
        }
        assert_eq!(session.open_cursor_count(), 0);
    }

    #[test]
    fn cursor_slot_is_released_on_early_return() {
        let (_dir, session) = session_with_table(&[("a", "1"), ("b", "2")]);
        let first_key = || -> Result<Vec<u8>, crate::core::error::Error> {
            let mut cursor = session.open_cursor("table:t")?;
            let record = cursor.next().expect("record")?;
            Ok(record.key)
        };
        assert_eq!(first_key().expect("key"), b"a");
        assert_eq!(session.open_cursor_count(), 0);
    }

    #[test]
    fn search_finds_exact_keys_only() {
        let (_dir, session) = session_with_table(&[("table:a", "1"), ("table:b", "2")]);
        let cursor = session.open_cursor("table:t").expect("cursor");
        assert_eq!(cursor.search(b"table:b").expect("search"), Some(b"2".to_vec()));
        assert_eq!(cursor.search(b"table:").expect("search"), None);
        assert_eq!(cursor.search(b"table:c").expect("search"), None);
    }

    #[test]
    fn missing_table_is_not_found() {
        let (_dir, session) = session_with_table(&[]);
        match session.open_cursor("table:absent") {
            Ok(_) => panic!("expected not found"),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::NotFound);
                assert_eq!(session.open_cursor_count(), 0);
            }
        }
    }
}
