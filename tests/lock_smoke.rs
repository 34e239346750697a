// Lock smoke tests: readers share a table, a commit never rewrites a table under an open cursor.
use wtscope::api::{ErrorKind, Session, SessionOptions};

fn seeded_session(dir: &std::path::Path) -> Session {
    let session = Session::open(dir, SessionOptions::new()).expect("session");
    let mut txn = session.begin_transaction().expect("txn");
    txn.create_table("table:t").expect("create");
    txn.insert("table:t", b"a", b"1").expect("insert");
    txn.commit().expect("commit");
    session
}

#[test]
fn readers_share_a_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let session = seeded_session(temp.path());
    let other = Session::open(temp.path(), SessionOptions::new()).expect("second session");

    let first = session.open_cursor("table:t").expect("first cursor");
    let second = other.open_cursor("table:t").expect("second cursor");
    assert_eq!(first.count() + second.count(), 2);
}

#[test]
fn commit_under_open_cursor_is_busy() {
    let temp = tempfile::tempdir().expect("tempdir");
    let reader = seeded_session(temp.path());
    let writer = Session::open(temp.path(), SessionOptions::new()).expect("writer");

    let cursor = reader.open_cursor("table:t").expect("cursor");
    let mut txn = writer.begin_transaction().expect("txn");
    txn.insert("table:t", b"b", b"2").expect("insert");
    let err = txn.commit().expect_err("locked");
    assert_eq!(err.kind(), ErrorKind::Busy);

    drop(cursor);
    let mut txn = writer.begin_transaction().expect("txn");
    txn.insert("table:t", b"b", b"2").expect("insert");
    txn.commit().expect("commit after release");
    assert_eq!(reader.open_cursor("table:t").expect("cursor").count(), 2);
}
