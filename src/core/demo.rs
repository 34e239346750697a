// Exercises the write path inside a transaction that is always rolled back.
use tracing::info;

use crate::core::doc::{self, DocMap, Document};
use crate::core::error::Error;
use crate::core::layout::table_uri;
use crate::core::session::Session;

const DEMO_RECORDS: usize = 5;

/// Inserts `key0..key4` into `table` and rolls back. Returns the number of inserts.
pub fn demo_insert(session: &Session, table: &str) -> Result<usize, Error> {
    let uri = table_uri(table);
    let mut txn = session.begin_transaction()?;
    txn.create_table(&uri)?;
    for idx in 0..DEMO_RECORDS {
        let value = Document::Map(DocMap::new().with("value", format!("value{idx}")));
        txn.insert(&uri, format!("key{idx}").as_bytes(), &doc::encode(&value)?)?;
    }
    let inserted = txn.pending_writes();
    txn.rollback()?;
    info!(table, inserted, "demo insert rolled back");
    Ok(inserted)
}
