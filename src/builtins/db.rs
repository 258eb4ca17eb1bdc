//! The `db` module: sqlite-backed primitives. Failures are `E17xxx`.
//!
//! Connections live in a thread-local registry keyed by an integer handle;
//! `db.open` returns the handle and every other member takes it first.

use crate::builtins::support::{as_int, as_str, expect_args, try_arg};
use crate::value::{MapKey, Value};
use ez_macros::builtin;
use indexmap::IndexMap;
use num_traits::ToPrimitive;
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    static CONNECTIONS: RefCell<HashMap<u64, Connection>> = RefCell::new(HashMap::new());
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn handle_arg(name: &str, args: &[Value], index: usize) -> Result<u64, Value> {
    let iv = as_int(name, args, index)?;
    iv.value
        .to_u64()
        .ok_or_else(|| Value::error("E17003", format!("{}: invalid handle", name)))
}

fn with_connection<F>(name: &str, handle: u64, f: F) -> Value
where
    F: FnOnce(&Connection) -> Value,
{
    CONNECTIONS.with(|conns| {
        let conns = conns.borrow();
        match conns.get(&handle) {
            Some(conn) => f(conn),
            None => Value::error(
                "E17003",
                format!("{}: handle {} is not open", name, handle),
            ),
        }
    })
}

fn sql_value(raw: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match raw {
        ValueRef::Null => Value::Nil,
        ValueRef::Integer(i) => Value::int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Str(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => crate::builtins::support::bytes_to_value(b.to_vec()),
    }
}

#[builtin(name = "db.open")]
/// Open (or create) a sqlite database and return its handle.
pub fn db_open(args: &[Value]) -> Value {
    expect_args!("db.open", args, 1);
    let path = try_arg!(as_str("db.open", args, 0));
    let conn = if path == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    };
    match conn {
        Ok(conn) => {
            let handle = NEXT_HANDLE.fetch_add(1, Ordering::SeqCst);
            CONNECTIONS.with(|conns| {
                conns.borrow_mut().insert(handle, conn);
            });
            Value::int(handle as i64)
        }
        Err(e) => Value::error("E17001", format!("cannot open `{}`: {}", path, e)),
    }
}

#[builtin(name = "db.execute")]
/// Run a statement (INSERT, UPDATE, DELETE, CREATE); returns the number of
/// affected rows.
pub fn db_execute(args: &[Value]) -> Value {
    expect_args!("db.execute", args, 2);
    let handle = try_arg!(handle_arg("db.execute", args, 0));
    let sql = try_arg!(as_str("db.execute", args, 1)).to_string();
    with_connection("db.execute", handle, |conn| {
        match conn.execute(&sql, []) {
            Ok(n) => Value::int(n as i64),
            Err(e) => Value::error("E17002", format!("db.execute: {}", e)),
        }
    })
}

#[builtin(name = "db.query")]
/// Run a SELECT; returns an array of column-name to value maps.
pub fn db_query(args: &[Value]) -> Value {
    expect_args!("db.query", args, 2);
    let handle = try_arg!(handle_arg("db.query", args, 0));
    let sql = try_arg!(as_str("db.query", args, 1)).to_string();
    with_connection("db.query", handle, |conn| {
        let mut stmt = match conn.prepare(&sql) {
            Ok(stmt) => stmt,
            Err(e) => return Value::error("E17002", format!("db.query: {}", e)),
        };
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = match stmt.query([]) {
            Ok(rows) => rows,
            Err(e) => return Value::error("E17002", format!("db.query: {}", e)),
        };
        let mut out = Vec::new();
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let mut entries = IndexMap::new();
                    for (i, column) in columns.iter().enumerate() {
                        let value = match row.get_ref(i) {
                            Ok(raw) => sql_value(raw),
                            Err(e) => {
                                return Value::error("E17002", format!("db.query: {}", e));
                            }
                        };
                        entries.insert(MapKey::Str(column.clone()), value);
                    }
                    out.push(Value::map(entries));
                }
                Ok(None) => break,
                Err(e) => return Value::error("E17002", format!("db.query: {}", e)),
            }
        }
        Value::array(out)
    })
}

#[builtin(name = "db.close")]
/// Close a handle; later use of it is an error.
pub fn db_close(args: &[Value]) -> Value {
    expect_args!("db.close", args, 1);
    let handle = try_arg!(handle_arg("db.close", args, 0));
    let removed = CONNECTIONS.with(|conns| conns.borrow_mut().remove(&handle));
    match removed {
        Some(_) => Value::Nil,
        None => Value::error(
            "E17003",
            format!("db.close: handle {} is not open", handle),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn s(text: &str) -> Value {
        Value::Str(text.into())
    }

    #[test]
    #[serial]
    fn test_memory_db_round_trip() {
        let handle = db_open(&[s(":memory:")]);
        assert!(matches!(handle, Value::Integer(_)));

        db_execute(&[handle.clone(), s("CREATE TABLE t (id INTEGER, name TEXT)")]);
        let n = db_execute(&[handle.clone(), s("INSERT INTO t VALUES (1, 'ada'), (2, 'alan')")]);
        assert_eq!(n.try_eq(&Value::int(2)), Some(true));

        let rows = db_query(&[handle.clone(), s("SELECT name FROM t ORDER BY id")]);
        let Value::Array { elements, .. } = &rows else {
            panic!()
        };
        let rows_ref = elements.borrow();
        assert_eq!(rows_ref.len(), 2);
        let Value::Map { entries, .. } = &rows_ref[0] else {
            panic!()
        };
        assert_eq!(
            entries.borrow()[&MapKey::Str("name".into())].try_eq(&s("ada")),
            Some(true)
        );

        assert!(matches!(db_close(&[handle.clone()]), Value::Nil));
        let Value::Error(e) = db_query(&[handle, s("SELECT 1")]) else {
            panic!()
        };
        assert_eq!(e.code, "E17003");
    }

    #[test]
    #[serial]
    fn test_bad_sql_is_e17002() {
        let handle = db_open(&[s(":memory:")]);
        let Value::Error(e) = db_execute(&[handle.clone(), s("NOT SQL")]) else {
            panic!()
        };
        assert_eq!(e.code, "E17002");
        db_close(&[handle]);
    }
}
