//! C5 — Iteration Engine: multi-map cursor with prefix reconstruction, sort
//! modes, row limits, and async continuation.

use std::rc::Rc;

use dictsql_compiler::codec::decode;
use dictsql_compiler::query::iterate_select;
use dictsql_compiler::{build_where, find_next_map_for_iter, Recurse};
use dictsql_core::{DictSqlError, Map, PathClass};
use dictsql_driver::{Capabilities, ResultCursor, RowOutcome, SqlDriver, Statement, StatementKind};
use smol_str::SmolStr;

use crate::row_advance::{next_surviving_row, RowAdvance};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IterateFlags: u32 {
        const RECURSE       = 1 << 0;
        const EXACT_KEY     = 1 << 1;
        const NO_VALUE      = 1 << 2;
        const SORT_BY_KEY   = 1 << 3;
        const SORT_BY_VALUE = 1 << 4;
        const ASYNC         = 1 << 5;
    }
}

/// One yielded item: the rebuilt full key and, unless `NO_VALUE` was set,
/// its decoded values.
pub type IterItem = (String, Option<Vec<String>>);

/// Result of one `IterateContext::next_async` step.
#[derive(Debug)]
pub enum IterStep {
    /// A row was produced.
    Row(IterItem),
    /// No row yet, but progress was made (a query was sent or a map
    /// boundary crossed) — call `next_async` again.
    Pending,
    /// Iteration is exhausted.
    Done,
}

pub struct IterateContext {
    path: String,
    flags: IterateFlags,
    maps: Rc<Vec<Map>>,
    table_prefix: String,
    capabilities: Capabilities,
    username: Option<SmolStr>,
    max_rows: Option<u64>,
    row_count: u64,

    key: String,
    cursor: Option<Box<dyn ResultCursor>>,
    current_map: Option<Map>,
    key_prefix_len: usize,
    pattern_prefix_len: usize,
    sql_fields_start_idx: usize,
    next_map_idx: usize,
    iter_query_sent: bool,
    allow_null_map: bool,
    destroyed: bool,
    error: Option<DictSqlError>,
}

impl IterateContext {
    pub fn new(
        maps: Rc<Vec<Map>>,
        table_prefix: String,
        capabilities: Capabilities,
        path: impl Into<String>,
        flags: IterateFlags,
        username: Option<SmolStr>,
        max_rows: Option<u64>,
    ) -> Self {
        IterateContext {
            path: path.into(),
            flags,
            maps,
            table_prefix,
            capabilities,
            username,
            max_rows,
            row_count: 0,
            key: String::new(),
            cursor: None,
            current_map: None,
            key_prefix_len: 0,
            pattern_prefix_len: 0,
            sql_fields_start_idx: 0,
            next_map_idx: 0,
            iter_query_sent: false,
            allow_null_map: false,
            destroyed: false,
            error: None,
        }
    }

    /// Marks the context destroyed: in-flight async callbacks must drop
    /// their result instead of delivering it (spec §5 cancellation).
    pub fn deinit(&mut self) -> Result<(), DictSqlError> {
        self.destroyed = true;
        self.cursor = None;
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn statement_kind(&self) -> StatementKind {
        if self.capabilities.prepared_statements {
            StatementKind::Prepared
        } else {
            StatementKind::OneShot
        }
    }

    /// §4.5 steps 1-5: find the next applicable map and build its SELECT.
    /// `Ok(None)` means "clean termination" (no more maps, but we already
    /// yielded something from an earlier map); `Err` means an unmapped
    /// path with nothing yielded yet.
    fn build_next_statement(&mut self) -> Result<Option<Statement>, DictSqlError> {
        let recurse = self.flags.contains(IterateFlags::RECURSE);
        let found = find_next_map_for_iter(&self.maps, self.next_map_idx, &self.path, recurse);
        let (idx, map, result) = match found {
            Some(t) => t,
            None => {
                if self.allow_null_map {
                    return Ok(None);
                }
                return Err(DictSqlError::InvalidPath {
                    path: self.path.clone(),
                });
            }
        };
        self.next_map_idx = idx + 1;
        self.key_prefix_len = result.path_len;
        self.pattern_prefix_len = result.pattern_len;
        self.current_map = Some(map.clone());
        self.key.clear();
        self.key.push_str(&self.path);

        let no_value = self.flags.contains(IterateFlags::NO_VALUE);
        let (mut sql, start_idx) =
            iterate_select(&self.table_prefix, map, no_value, result.values.len());
        self.sql_fields_start_idx = start_idx;

        let recurse_type = if self.flags.contains(IterateFlags::RECURSE) {
            Recurse::Full
        } else if self.flags.contains(IterateFlags::EXACT_KEY) {
            Recurse::None
        } else {
            Recurse::One
        };
        let add_username = PathClass::of(&self.path).add_username();

        let mut params = Vec::new();
        build_where(
            self.username.as_deref(),
            map,
            &result.values,
            add_username,
            recurse_type,
            &mut sql,
            &mut params,
        )?;

        if self.flags.contains(IterateFlags::SORT_BY_KEY) {
            sql.push_str(" ORDER BY ");
            let names = map
                .pattern_fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(",");
            sql.push_str(&names);
        } else if self.flags.contains(IterateFlags::SORT_BY_VALUE) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&map.value_field);
        }

        if let Some(max_rows) = self.max_rows {
            sql.push_str(&format!(" LIMIT {}", max_rows.saturating_sub(self.row_count)));
        }

        Ok(Some(Statement::new(sql, params, self.statement_kind())))
    }

    /// Rebuild the full key for the row currently at the cursor's position
    /// and, unless `NO_VALUE`, decode its values (spec §4.5 "Row
    /// emission"). The cursor is read via `self.cursor` directly (rather
    /// than taking it as a parameter) so the borrow of it stays disjoint
    /// from the `self.key` mutations below.
    fn emit_row(&mut self) -> IterItem {
        let map = self.current_map.clone().expect("set by build_next_statement");

        self.key.truncate(self.key_prefix_len);
        if self.key_prefix_len > 0 && !self.key.ends_with('/') {
            self.key.push('/');
        }

        let no_value = self.flags.contains(IterateFlags::NO_VALUE);
        let expire_offset = usize::from(map.expire_field.is_some());
        let mut result_idx = expire_offset + if no_value { 0 } else { map.values_count() };
        let mut sql_field_idx = self.sql_fields_start_idx;

        let cursor = self.cursor.as_ref().expect("set before emit_row is called");
        let row = cursor.row();
        for ch in map.pattern[self.pattern_prefix_len..].chars() {
            if ch != '$' {
                self.key.push(ch);
            } else {
                let value_type = map.pattern_fields[sql_field_idx].value_type;
                let decoded = decode(value_type, row, result_idx);
                self.key.push_str(&decoded);
                result_idx += 1;
                sql_field_idx += 1;
            }
        }

        let values = if no_value {
            None
        } else {
            Some(
                (0..map.values_count())
                    .map(|vi| decode(map.value_types[vi], row, expire_offset + vi))
                    .collect(),
            )
        };
        (self.key.clone(), values)
    }

    /// Synchronous step: returns `None` when iteration is exhausted,
    /// `Some(Err(_))` on the first error (latched for subsequent calls),
    /// `Some(Ok(item))` per row.
    pub fn next_sync(
        &mut self,
        driver: &dyn SqlDriver,
        now_epoch_secs: i64,
    ) -> Option<Result<IterItem, DictSqlError>> {
        if self.destroyed {
            return None;
        }
        if let Some(e) = self.error.clone() {
            return Some(Err(e));
        }
        loop {
            if let Some(max_rows) = self.max_rows {
                if self.row_count >= max_rows {
                    return None;
                }
            }
            if !self.iter_query_sent {
                self.iter_query_sent = true;
                match self.build_next_statement() {
                    Ok(None) => return None,
                    Ok(Some(stmt)) => match driver.query(&stmt) {
                        Ok(cursor) => self.cursor = Some(cursor),
                        Err(e) => {
                            self.error = Some(e.clone());
                            return Some(Err(e));
                        }
                    },
                    Err(e) => {
                        self.error = Some(e.clone());
                        return Some(Err(e));
                    }
                }
            }

            let map = self
                .current_map
                .clone()
                .expect("current_map is set once a query has been sent");
            let cursor = self.cursor.as_mut().expect("set above");
            match next_surviving_row(&map, cursor.as_mut(), now_epoch_secs) {
                RowAdvance::Row => {
                    self.row_count += 1;
                    let item = self.emit_row();
                    return Some(Ok(item));
                }
                RowAdvance::Done => {
                    if self.flags.contains(IterateFlags::EXACT_KEY) {
                        return None;
                    }
                    self.iter_query_sent = false;
                    self.allow_null_map = true;
                    self.cursor = None;
                    continue;
                }
                RowAdvance::Error(e) => {
                    let err = DictSqlError::BackendError(e);
                    self.error = Some(err.clone());
                    return Some(Err(err));
                }
            }
        }
    }

    /// One step of asynchronous iteration. Mirrors `next_sync` but never
    /// blocks: when the next row requires a fresh query, the step suspends
    /// by handing a callback to the driver rather than looping in place
    /// (spec §5 "suspension points"). `Pending` tells the caller there was
    /// no new query to send yet but a map boundary was crossed — call
    /// `next_async` again to keep driving; this keeps every suspension a
    /// single hop back out to the caller instead of `next_async` trying to
    /// re-enter the driver from inside its own completion callback, which
    /// would require `driver` to outlive `'static`. `destroyed` (set by
    /// `deinit`) suppresses delivery entirely.
    pub fn next_async(
        mut self: Box<Self>,
        driver: &dyn SqlDriver,
        now_epoch_secs: i64,
        callback: Box<dyn FnOnce(Box<Self>, Result<IterStep, DictSqlError>)>,
    ) {
        if self.destroyed {
            return;
        }
        if let Some(e) = self.error.clone() {
            callback(self, Err(e));
            return;
        }
        if let Some(max_rows) = self.max_rows {
            if self.row_count >= max_rows {
                callback(self, Ok(IterStep::Done));
                return;
            }
        }

        if !self.iter_query_sent {
            self.iter_query_sent = true;
            match self.build_next_statement() {
                Ok(None) => {
                    callback(self, Ok(IterStep::Done));
                }
                Ok(Some(stmt)) => {
                    driver.query_async(
                        stmt,
                        Box::new(move |result| match result {
                            Ok(cursor) => {
                                self.cursor = Some(cursor);
                                // Bounce back to the caller rather than
                                // drive rows here: driving may itself need
                                // to send the next map's query, and this
                                // closure cannot carry a non-'static
                                // `driver` reference into a further
                                // `query_async` call.
                                callback(self, Ok(IterStep::Pending));
                            }
                            Err(e) => {
                                self.error = Some(e.clone());
                                callback(self, Err(e));
                            }
                        }),
                    );
                }
                Err(e) => {
                    self.error = Some(e.clone());
                    callback(self, Err(e));
                }
            }
            return;
        }

        self.drive_async_row(now_epoch_secs, callback);
    }

    /// Pulls rows out of the already-open cursor. Fetching further result
    /// batches (`ResultCursor::more`) and expiry-skipping both happen
    /// synchronously here, same as `next_sync` — only crossing a map
    /// boundary needs the driver, which is why that case reports `Pending`
    /// instead of recursing into `next_async` itself.
    fn drive_async_row(
        mut self: Box<Self>,
        now_epoch_secs: i64,
        callback: Box<dyn FnOnce(Box<Self>, Result<IterStep, DictSqlError>)>,
    ) {
        let map = self
            .current_map
            .clone()
            .expect("current_map is set once a query has been sent");
        loop {
            let cursor = self.cursor.as_mut().expect("set before driving rows");
            let mut outcome = cursor.next_row();
            while let RowOutcome::More = outcome {
                // The driver must fetch another batch; this is a second
                // suspension point (spec §5 `sql_result_more`), but the
                // cursor itself owns the connection state needed to do it,
                // so no driver reference is required here.
                outcome = cursor.more();
            }
            match outcome {
                RowOutcome::Row => {
                    let expired = if map.expire_field.is_some() {
                        self.cursor
                            .as_ref()
                            .unwrap()
                            .row()
                            .get_text(0)
                            .and_then(|s| s.parse::<i64>().ok())
                            .map(|ts| ts <= now_epoch_secs)
                            .unwrap_or(false)
                    } else {
                        false
                    };
                    if expired {
                        continue;
                    }
                    self.row_count += 1;
                    let item = self.emit_row();
                    callback(self, Ok(IterStep::Row(item)));
                    return;
                }
                RowOutcome::Done => {
                    if self.flags.contains(IterateFlags::EXACT_KEY) {
                        callback(self, Ok(IterStep::Done));
                        return;
                    }
                    self.iter_query_sent = false;
                    self.allow_null_map = true;
                    self.cursor = None;
                    callback(self, Ok(IterStep::Pending));
                    return;
                }
                RowOutcome::More => unreachable!("drained above"),
                RowOutcome::Error(e) => {
                    let err = DictSqlError::BackendError(e);
                    self.error = Some(err.clone());
                    callback(self, Err(err));
                    return;
                }
            }
        }
    }
}
