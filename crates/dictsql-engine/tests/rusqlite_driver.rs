//! End-to-end tests against a real backend: a minimal `SqlDriver`
//! implementation over `rusqlite` (bundled SQLite), exercising lookup,
//! transaction staging, iteration, and the expiry reaper against an
//! actual database instead of hand-written stub cursors.
//!
//! SQLite understands `ON CONFLICT ... DO UPDATE` but not `ON DUPLICATE
//! KEY UPDATE`, so `Capabilities::on_conflict_do_update` is the flag this
//! driver advertises.

use std::cell::RefCell;
use std::rc::Rc;

use dictsql_core::{DictSqlError, Map, PatternField, Type};
use dictsql_driver::{
    Capabilities, CommitOutcome, ResultCursor, ResultRow, RowCountSlot, RowOutcome, SqlDriver,
    Statement, Transaction,
};
use dictsql_engine::{expire_scan, lookup, DictTransaction, FixedClock, IterateContext, IterateFlags, LookupResult, OpSettings};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

enum Cell {
    Text(String),
    Blob(Vec<u8>),
}

struct SqliteRow {
    cells: Vec<Option<Cell>>,
}

impl ResultRow for SqliteRow {
    fn field_count(&self) -> usize {
        self.cells.len()
    }

    fn get_text(&self, idx: usize) -> Option<&str> {
        match &self.cells[idx] {
            Some(Cell::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn get_binary(&self, idx: usize) -> Option<&[u8]> {
        match &self.cells[idx] {
            Some(Cell::Blob(b)) => Some(b.as_slice()),
            _ => None,
        }
    }
}

struct SqliteCursor {
    rows: Vec<SqliteRow>,
    pos: usize,
}

impl ResultCursor for SqliteCursor {
    fn next_row(&mut self) -> RowOutcome {
        if self.pos < self.rows.len() {
            self.pos += 1;
            RowOutcome::Row
        } else {
            RowOutcome::Done
        }
    }

    fn more(&mut self) -> RowOutcome {
        RowOutcome::Done
    }

    fn more_async(&mut self, callback: Box<dyn FnOnce(RowOutcome)>) {
        callback(RowOutcome::Done);
    }

    fn row(&self) -> &dyn ResultRow {
        &self.rows[self.pos - 1]
    }
}

fn to_sql_value(p: &dictsql_core::Parameter) -> SqlValue {
    use dictsql_core::Parameter;
    match p {
        Parameter::Str(s) => SqlValue::Text(s.to_string()),
        Parameter::Int64(n) => SqlValue::Integer(*n),
        Parameter::Double(d) => SqlValue::Real(*d),
        Parameter::Binary(b) => SqlValue::Blob(b.clone()),
        Parameter::Uuid(u) => SqlValue::Text(u.hyphenated().to_string()),
    }
}

fn run_query(conn: &Connection, stmt: &Statement) -> Result<Vec<SqliteRow>, DictSqlError> {
    let mut prepared = conn
        .prepare(&stmt.sql)
        .map_err(|e| DictSqlError::BackendError(e.to_string()))?;
    let col_count = prepared.column_count();
    let values: Vec<SqlValue> = stmt.params.iter().map(to_sql_value).collect();
    let mut rows = prepared
        .query(rusqlite::params_from_iter(values))
        .map_err(|e| DictSqlError::BackendError(e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| DictSqlError::BackendError(e.to_string()))?
    {
        let mut cells = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value_ref = row
                .get_ref(i)
                .map_err(|e| DictSqlError::BackendError(e.to_string()))?;
            cells.push(match value_ref {
                rusqlite::types::ValueRef::Null => None,
                rusqlite::types::ValueRef::Integer(n) => Some(Cell::Text(n.to_string())),
                rusqlite::types::ValueRef::Real(f) => Some(Cell::Text(f.to_string())),
                rusqlite::types::ValueRef::Text(t) => {
                    Some(Cell::Text(String::from_utf8_lossy(t).into_owned()))
                }
                rusqlite::types::ValueRef::Blob(b) => Some(Cell::Blob(b.to_vec())),
            });
        }
        out.push(SqliteRow { cells });
    }
    Ok(out)
}

struct SqliteDriver {
    conn: RefCell<Connection>,
}

impl SqliteDriver {
    fn open() -> Self {
        SqliteDriver {
            conn: RefCell::new(Connection::open_in_memory().expect("in-memory sqlite")),
        }
    }

    fn exec_batch(&self, sql: &str) {
        self.conn.borrow().execute_batch(sql).expect("schema setup");
    }

    fn row_count(&self, table: &str) -> i64 {
        self.conn
            .borrow()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), rusqlite::params![], |r| r.get(0))
            .unwrap()
    }
}

impl SqlDriver for SqliteDriver {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            on_duplicate_key_update: false,
            on_conflict_do_update: true,
            prepared_statements: false,
        }
    }

    fn table_prefix(&self) -> &str {
        ""
    }

    fn query(&self, stmt: &Statement) -> Result<Box<dyn ResultCursor>, DictSqlError> {
        let rows = run_query(&self.conn.borrow(), stmt)?;
        Ok(Box::new(SqliteCursor { rows, pos: 0 }))
    }

    fn query_async(
        &self,
        stmt: Statement,
        callback: Box<dyn FnOnce(Result<Box<dyn ResultCursor>, DictSqlError>)>,
    ) {
        callback(self.query(&stmt));
    }

    fn begin(&self) -> Box<dyn Transaction> {
        Box::new(SqliteTransaction {
            driver: self,
            queued: Vec::new(),
        })
    }

    fn wait(&self) {}
}

struct Queued {
    stmt: Statement,
    slot: Option<RowCountSlot>,
}

struct SqliteTransaction<'a> {
    driver: &'a SqliteDriver,
    queued: Vec<Queued>,
}

impl Transaction for SqliteTransaction<'_> {
    fn update(&mut self, stmt: Statement) {
        self.queued.push(Queued { stmt, slot: None });
    }

    fn update_get_rows(&mut self, stmt: Statement, slot: RowCountSlot) {
        self.queued.push(Queued {
            stmt,
            slot: Some(slot),
        });
    }

    fn commit(self: Box<Self>) -> CommitOutcome {
        let mut conn = self.driver.conn.borrow_mut();
        let tx = match conn.transaction() {
            Ok(t) => t,
            Err(e) => return CommitOutcome::Failed(e.to_string()),
        };
        for q in &self.queued {
            let values: Vec<SqlValue> = q.stmt.params.iter().map(to_sql_value).collect();
            match tx.execute(&q.stmt.sql, rusqlite::params_from_iter(values)) {
                Ok(changed) => {
                    if let Some(slot) = &q.slot {
                        slot.set(Some(changed as u32));
                    }
                }
                Err(e) => return CommitOutcome::Failed(e.to_string()),
            }
        }
        match tx.commit() {
            Ok(()) => CommitOutcome::Ok,
            Err(e) => CommitOutcome::Failed(e.to_string()),
        }
    }

    fn commit_async(self: Box<Self>, callback: Box<dyn FnOnce(CommitOutcome)>) {
        callback(self.commit());
    }

    fn rollback(self: Box<Self>) {}
}

fn quota_map() -> Map {
    Map {
        pattern: "shared/quota/$".into(),
        table: "quota".into(),
        pattern_fields: vec![PatternField::new("user", Type::String)],
        value_field: "bytes".into(),
        value_types: vec![Type::Int],
        username_field: None,
        expire_field: None,
    }
}

fn session_map() -> Map {
    Map {
        pattern: "shared/sess/$".into(),
        table: "sessions".into(),
        pattern_fields: vec![PatternField::new("id", Type::String)],
        value_field: "payload".into(),
        value_types: vec![Type::String],
        username_field: None,
        expire_field: Some("exp".into()),
    }
}

#[test]
fn set_then_lookup_round_trips_through_sqlite() {
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE quota (user TEXT PRIMARY KEY, bytes INTEGER)");
    let maps = vec![quota_map()];
    let clock = FixedClock { secs: 1_000 };
    let settings = OpSettings::default();

    let mut txn = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    txn.set("shared/quota/alice", "10").unwrap();
    Box::new(txn).commit().unwrap();

    assert_eq!(driver.row_count("quota"), 1);
    let result = lookup(&driver, &maps, &settings, "shared/quota/alice", clock.secs).unwrap();
    assert_eq!(result, LookupResult::Found(vec!["10".to_string()]));
}

#[test]
fn second_set_in_a_later_transaction_overwrites_the_row() {
    // Property #4 (set then lookup round-trips) across two separate
    // commits, each a single `set` so no same-column merge is exercised —
    // the merge path itself is covered at the SQL-text level in
    // `dictsql-compiler::query`'s own tests.
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE quota (user TEXT PRIMARY KEY, bytes INTEGER)");
    let maps = vec![quota_map()];
    let clock = FixedClock { secs: 1_000 };
    let settings = OpSettings::default();

    let mut first = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    first.set("shared/quota/alice", "10").unwrap();
    Box::new(first).commit().unwrap();

    let mut second = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    second.set("shared/quota/alice", "20").unwrap();
    Box::new(second).commit().unwrap();

    assert_eq!(driver.row_count("quota"), 1);
    let result = lookup(&driver, &maps, &settings, "shared/quota/alice", clock.secs).unwrap();
    assert_eq!(result, LookupResult::Found(vec!["20".to_string()]));
}

#[test]
fn s5_non_mergeable_sets_each_reach_the_backend() {
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE quota (user TEXT PRIMARY KEY, bytes INTEGER)");
    let maps = vec![quota_map()];
    let clock = FixedClock { secs: 1_000 };
    let settings = OpSettings::default();

    let mut txn = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    txn.set("shared/quota/alice", "10").unwrap();
    txn.set("shared/quota/bob", "20").unwrap();
    Box::new(txn).commit().unwrap();

    assert_eq!(driver.row_count("quota"), 2);
    assert_eq!(
        lookup(&driver, &maps, &settings, "shared/quota/alice", clock.secs).unwrap(),
        LookupResult::Found(vec!["10".to_string()])
    );
    assert_eq!(
        lookup(&driver, &maps, &settings, "shared/quota/bob", clock.secs).unwrap(),
        LookupResult::Found(vec!["20".to_string()])
    );
}

#[test]
fn atomic_inc_on_missing_row_reports_not_found() {
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE quota (user TEXT PRIMARY KEY, bytes INTEGER)");
    let maps = vec![quota_map()];
    let clock = FixedClock { secs: 1_000 };
    let settings = OpSettings::default();

    let mut txn = DictTransaction::new(&driver, &maps, "", settings, &clock);
    txn.atomic_inc("shared/quota/nobody", 5).unwrap();
    let err = Box::new(txn).commit().unwrap_err();
    assert!(matches!(err, DictSqlError::NotFound));
}

#[test]
fn atomic_inc_round_trips_on_existing_row() {
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE quota (user TEXT PRIMARY KEY, bytes INTEGER)");
    let maps = vec![quota_map()];
    let clock = FixedClock { secs: 1_000 };
    let settings = OpSettings::default();

    let mut txn = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    txn.set("shared/quota/alice", "10").unwrap();
    Box::new(txn).commit().unwrap();

    // Two separate transactions rather than two merged `atomic_inc` calls on
    // the same key within one transaction: the merge path's SQL shape is
    // exercised at the text level by `dictsql-compiler::query`'s own tests.
    let mut up = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    up.atomic_inc("shared/quota/alice", 7).unwrap();
    Box::new(up).commit().unwrap();

    let mut down = DictTransaction::new(&driver, &maps, "", settings.clone(), &clock);
    down.atomic_inc("shared/quota/alice", -7).unwrap();
    Box::new(down).commit().unwrap();

    assert_eq!(
        lookup(&driver, &maps, &settings, "shared/quota/alice", clock.secs).unwrap(),
        LookupResult::Found(vec!["10".to_string()])
    );
}

#[test]
fn s6_unset_flushes_staging_in_one_transaction() {
    let driver = SqliteDriver::open();
    driver.exec_batch(
        "CREATE TABLE quota (user TEXT PRIMARY KEY, bytes INTEGER);
         CREATE TABLE quota2 (user TEXT PRIMARY KEY, bytes INTEGER);
         INSERT INTO quota2 (user, bytes) VALUES ('carol', 99);",
    );
    let mut quota2_map = quota_map();
    quota2_map.table = "quota2".into();
    quota2_map.pattern = "shared/quota2/$".into();

    let maps = vec![quota_map(), quota2_map];
    let clock = FixedClock { secs: 1_000 };
    let settings = OpSettings::default();

    let mut txn = DictTransaction::new(&driver, &maps, "", settings, &clock);
    txn.set("shared/quota/alice", "1").unwrap();
    txn.atomic_inc("shared/quota/alice", 0).unwrap();
    txn.unset("shared/quota2/carol").unwrap();
    Box::new(txn).commit().unwrap();

    assert_eq!(driver.row_count("quota"), 1);
    assert_eq!(driver.row_count("quota2"), 0);
}

#[test]
fn s7_expired_row_is_skipped_by_lookup_and_iterate() {
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE sessions (id TEXT PRIMARY KEY, payload TEXT, exp INTEGER)");
    driver.exec_batch(
        "INSERT INTO sessions (id, payload, exp) VALUES ('old', 'stale', 1);
         INSERT INTO sessions (id, payload, exp) VALUES ('fresh', 'alive', 9999999999);",
    );
    let maps = vec![session_map()];
    let clock = FixedClock { secs: 2_000_000_000 };
    let settings = OpSettings::default();

    let missing = lookup(&driver, &maps, &settings, "shared/sess/old", clock.secs).unwrap();
    assert_eq!(missing, LookupResult::Missing);

    let found = lookup(&driver, &maps, &settings, "shared/sess/fresh", clock.secs).unwrap();
    assert_eq!(found, LookupResult::Found(vec!["alive".to_string()]));

    let mut ctx = IterateContext::new(
        Rc::new(maps),
        String::new(),
        driver.capabilities(),
        "shared/sess/",
        IterateFlags::empty(),
        None,
        None,
    );
    let mut keys = Vec::new();
    while let Some(step) = ctx.next_sync(&driver, clock.secs) {
        let (key, _) = step.unwrap();
        keys.push(key);
    }
    assert_eq!(keys, vec!["shared/sess/fresh".to_string()]);
}

#[test]
fn expire_reaper_deletes_rows_past_ttl() {
    // The reaper compares `exp` against microseconds (spec's intentionally
    // preserved unit mismatch vs. the seconds-based lookup/iterate filter
    // above), so the surviving row's `exp` must exceed `secs * 1_000_000`.
    let driver = SqliteDriver::open();
    driver.exec_batch("CREATE TABLE sessions (id TEXT PRIMARY KEY, payload TEXT, exp INTEGER)");
    driver.exec_batch(
        "INSERT INTO sessions (id, payload, exp) VALUES ('old', 'stale', 1000);
         INSERT INTO sessions (id, payload, exp) VALUES ('fresh', 'alive', 3000000000000000);",
    );
    let maps = vec![session_map()];
    let clock = FixedClock { secs: 2_000_000_000 };

    let expiring_maps = expire_scan(&driver, &maps, &clock).unwrap();
    assert_eq!(expiring_maps, 1);
    assert_eq!(driver.row_count("sessions"), 1);
}
