// Recorded data size and record count per table ident, read from the statistics table.
use tracing::debug;

use crate::core::cursor::TableCursor;
use crate::core::doc;
use crate::core::error::{Error, ErrorKind};
use crate::core::layout::table_uri;
use crate::core::session::Session;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeStat {
    pub table_ident: String,
    pub data_size: u64,
    pub num_records: u64,
}

/// Holds one cursor over the statistics table for repeated lookups.
pub struct SizeStore<'s> {
    cursor: Option<TableCursor<'s>>,
}

impl<'s> SizeStore<'s> {
    pub fn open(session: &'s Session) -> Result<Self, Error> {
        let uri = table_uri(&session.layout().size_table);
        let cursor = session.open_cursor_if_exists(&uri)?;
        if cursor.is_none() {
            debug!(table = %session.layout().size_table, "statistics table absent");
        }
        Ok(Self { cursor })
    }

    pub fn lookup(&self, ident: &str) -> Result<Option<SizeStat>, Error> {
        let Some(cursor) = &self.cursor else {
            return Ok(None);
        };
        let key = table_uri(ident);
        let Some(value) = cursor.search(key.as_bytes())? else {
            debug!(ident, "no statistics recorded");
            return Ok(None);
        };
        let stats = doc::decode(&value).map_err(|err| err.with_key(&key))?;
        let map = stats
            .as_map()
            .ok_or_else(|| malformed("statistics value is not a document", &key))?;
        Ok(Some(SizeStat {
            table_ident: ident.to_string(),
            data_size: non_negative(map.get_i64("dataSize"), "dataSize", &key)?,
            num_records: non_negative(map.get_i64("numRecords"), "numRecords", &key)?,
        }))
    }
}

fn non_negative(value: Option<i64>, field: &str, key: &str) -> Result<u64, Error> {
    let value = value.ok_or_else(|| malformed(&format!("statistics lack integer `{field}`"), key))?;
    u64::try_from(value)
        .map_err(|_| malformed(&format!("statistics `{field}` is negative ({value})"), key))
}

fn malformed(message: &str, key: &str) -> Error {
    Error::new(ErrorKind::Decode)
        .with_message(message.to_string())
        .with_key(key)
}

#[cfg(test)]
mod tests {
    use super::{SizeStat, SizeStore};
    use crate::core::doc::DocMap;
    use crate::core::error::ErrorKind;
    use crate::core::testutil::{Fixture, encode_map};

    #[test]
    fn lookup_reads_recorded_stats() {
        let fixture = Fixture::new();
        fixture.sizes(&[("collection-1", 1000, 5), ("collection-2", 0, 0)]);
        let session = fixture.session();
        let store = SizeStore::open(&session).expect("store");
        assert_eq!(
            store.lookup("collection-1").expect("lookup"),
            Some(SizeStat {
                table_ident: "collection-1".to_string(),
                data_size: 1000,
                num_records: 5,
            })
        );
        assert!(store.lookup("collection-9").expect("lookup").is_none());
        drop(store);
        assert_eq!(session.open_cursor_count(), 0);
    }

    #[test]
    fn missing_statistics_table_means_no_stats() {
        let fixture = Fixture::new();
        let session = fixture.session();
        let store = SizeStore::open(&session).expect("store");
        assert!(store.lookup("collection-1").expect("lookup").is_none());
    }

    #[test]
    fn int32_counters_are_accepted() {
        let fixture = Fixture::new();
        let value = DocMap::new().with("numRecords", 2i32).with("dataSize", 64i32);
        fixture.table(
            "sizeStorer",
            vec![(b"table:collection-1".to_vec(), encode_map(&value))],
        );
        let session = fixture.session();
        let stat = SizeStore::open(&session)
            .expect("store")
            .lookup("collection-1")
            .expect("lookup")
            .expect("stat");
        assert_eq!((stat.data_size, stat.num_records), (64, 2));
    }

    #[test]
    fn malformed_statistics_are_decode_errors() {
        let fixture = Fixture::new();
        let missing = DocMap::new().with("numRecords", 1i64);
        let negative = DocMap::new().with("numRecords", 1i64).with("dataSize", -4i64);
        fixture.table(
            "sizeStorer",
            vec![
                (b"table:a".to_vec(), encode_map(&missing)),
                (b"table:b".to_vec(), encode_map(&negative)),
                (b"table:c".to_vec(), b"garbage".to_vec()),
            ],
        );
        let session = fixture.session();
        let store = SizeStore::open(&session).expect("store");
        for ident in ["a", "b", "c"] {
            let err = store.lookup(ident).expect_err(ident);
            assert_eq!(err.kind(), ErrorKind::Decode, "{ident}");
            assert_eq!(err.key(), Some(format!("table:{ident}").as_str()));
        }
    }
}
