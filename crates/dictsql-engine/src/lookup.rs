//! C4 — Lookup Engine: synchronous and asynchronous single-key read,
//! expiry-aware.

use dictsql_compiler::{build_where, find_map, Recurse};
use dictsql_compiler::codec::{decode, decode_primary_value_async};
use dictsql_compiler::query::select_prefix;
use dictsql_core::{DictSqlError, Map, PathClass};
use dictsql_driver::{SqlDriver, Statement, StatementKind};

use crate::row_advance::{next_surviving_row, RowAdvance};
use crate::settings::OpSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Missing,
    Found(Vec<String>),
}

fn statement_kind(driver: &dyn SqlDriver) -> StatementKind {
    if driver.capabilities().prepared_statements {
        StatementKind::Prepared
    } else {
        StatementKind::OneShot
    }
}

fn build_lookup_statement<'a>(
    driver: &dyn SqlDriver,
    maps: &'a [Map],
    settings: &OpSettings,
    key: &str,
) -> Result<(&'a Map, Statement), DictSqlError> {
    let (map, pattern_values) =
        find_map(maps, key).ok_or_else(|| DictSqlError::UnmappedKey { key: key.to_string() })?;

    let mut sql = select_prefix(driver.table_prefix(), map);
    let mut params = Vec::new();
    build_where(
        settings.username.as_deref(),
        map,
        &pattern_values,
        PathClass::of(key).add_username(),
        Recurse::None,
        &mut sql,
        &mut params,
    )?;

    log::trace!("dictsql lookup: key={key} map_table={}", map.table);
    let mut stmt = Statement::new(sql, params, statement_kind(driver));
    stmt.hide_log_values = settings.hide_log_values;
    Ok((map, stmt))
}

/// Synchronous lookup (spec §4.4, steps 1-4). NULL in the primary value
/// column is returned as an empty string here — only the async path
/// coerces NULL to `Missing` (spec §9 open question, intentionally
/// preserved).
pub fn lookup(
    driver: &dyn SqlDriver,
    maps: &[Map],
    settings: &OpSettings,
    key: &str,
    now_epoch_secs: i64,
) -> Result<LookupResult, DictSqlError> {
    let (map, stmt) = build_lookup_statement(driver, maps, settings, key)?;
    let mut cursor = driver.query(&stmt)?;
    match next_surviving_row(map, cursor.as_mut(), now_epoch_secs) {
        RowAdvance::Row => {
            let row = cursor.row();
            let mut first_sql_idx = 0;
            if map.expire_field.is_some() {
                first_sql_idx = 1;
            }
            let values = (0..map.values_count())
                .map(|i| decode(map.value_types[i], row, first_sql_idx + i))
                .collect();
            Ok(LookupResult::Found(values))
        }
        RowAdvance::Done => Ok(LookupResult::Missing),
        RowAdvance::Error(e) => Err(DictSqlError::BackendError(e)),
    }
}

/// Asynchronous lookup: the callback fires exactly once with the decoded
/// result. NULL in the primary value column is treated as "not found" —
/// the async contract's asymmetry with the sync path is intentional.
pub fn lookup_async(
    driver: &dyn SqlDriver,
    maps: &[Map],
    settings: &OpSettings,
    key: &str,
    now_epoch_secs: i64,
    callback: Box<dyn FnOnce(Result<LookupResult, DictSqlError>)>,
) {
    let built = build_lookup_statement(driver, maps, settings, key);
    let (map, stmt) = match built {
        Ok(pair) => pair,
        Err(e) => return callback(Err(e)),
    };
    let values_count = map.values_count();
    let expire_field_present = map.expire_field.is_some();
    let map_owned_types = map.value_types.clone();

    driver.query_async(
        stmt,
        Box::new(move |result| {
            let mut cursor = match result {
                Ok(cursor) => cursor,
                Err(e) => return callback(Err(e)),
            };
            // Re-derive expiry filtering without borrowing `map` across the
            // suspension point: only `expire_field_present` and the value
            // types are needed past this boundary.
            let outcome = loop {
                let mut row_outcome = cursor.next_row();
                while let dictsql_driver::RowOutcome::More = row_outcome {
                    row_outcome = cursor.more();
                }
                match row_outcome {
                    dictsql_driver::RowOutcome::Row => {
                        if expire_field_present {
                            let expired = cursor
                                .row()
                                .get_text(0)
                                .and_then(|s| s.parse::<i64>().ok())
                                .map(|ts| ts <= now_epoch_secs)
                                .unwrap_or(false);
                            if expired {
                                continue;
                            }
                        }
                        break RowAdvance::Row;
                    }
                    dictsql_driver::RowOutcome::Done => break RowAdvance::Done,
                    dictsql_driver::RowOutcome::More => unreachable!("drained above"),
                    dictsql_driver::RowOutcome::Error(e) => break RowAdvance::Error(e),
                }
            };

            match outcome {
                RowAdvance::Row => {
                    let row = cursor.row();
                    let first_sql_idx = if expire_field_present { 1 } else { 0 };
                    let primary =
                        decode_primary_value_async(map_owned_types[0], row, first_sql_idx);
                    if primary.is_none() {
                        // NULL primary value: treat as not-found.
                        return callback(Ok(LookupResult::Missing));
                    }
                    let values = (0..values_count)
                        .map(|i| decode(map_owned_types[i], row, first_sql_idx + i))
                        .collect();
                    callback(Ok(LookupResult::Found(values)))
                }
                RowAdvance::Done => callback(Ok(LookupResult::Missing)),
                RowAdvance::Error(e) => callback(Err(DictSqlError::BackendError(e))),
            }
        }),
    );
}
