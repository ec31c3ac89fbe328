//! Statement assembly: build the actual SELECT / INSERT…ON CONFLICT /
//! UPDATE / DELETE text around the WHERE clauses `where_builder` produces.
//! Every function here is pure: given a map, prefix, and values, it returns
//! SQL text and a parameter list. Transaction bookkeeping and execution
//! live in `dictsql-engine`.

use dictsql_core::{DictSqlError, Map, Parameter};
use dictsql_driver::Capabilities;
use smol_str::SmolStr;

use crate::codec::encode;
use crate::where_builder::{build_where, Recurse};

/// `SELECT [expire_field,] value_field FROM <prefix><table>` (no WHERE —
/// the caller appends that with `build_where`). Used by the lookup engine
/// (§4.4) and by the transaction staging buffer when re-resolving a map.
pub fn select_prefix(table_prefix: &str, map: &Map) -> String {
    let mut sql = String::from("SELECT ");
    if let Some(expire) = &map.expire_field {
        sql.push_str(expire);
        sql.push(',');
    }
    sql.push_str(&map.value_field);
    sql.push_str(" FROM ");
    sql.push_str(table_prefix);
    sql.push_str(&map.table);
    sql
}

/// SELECT for one page of iteration (§4.5 `sql_dict_iterate_build_next_query`
/// steps 2-3). `sql_fields_start_idx` is the first pattern-field index to
/// re-fetch; returns the SELECT text (no WHERE/ORDER BY/LIMIT yet) plus
/// that start index.
pub fn iterate_select(
    table_prefix: &str,
    map: &Map,
    no_value: bool,
    bound_count: usize,
) -> (String, usize) {
    let mut sql = String::from("SELECT ");
    if let Some(expire) = &map.expire_field {
        sql.push_str(expire);
        sql.push(',');
    }
    if !no_value {
        sql.push_str(&map.value_field);
        sql.push(',');
    }

    let count = map.pattern_fields.len();
    let mut start_idx = bound_count;
    if start_idx == count && count > 0 {
        // We always want to know the last field since we're iterating its
        // children.
        start_idx -= 1;
    }
    for field in &map.pattern_fields[start_idx..] {
        sql.push_str(&field.name);
        sql.push(',');
    }
    sql.pop(); // drop the trailing comma

    sql.push_str(" FROM ");
    sql.push_str(table_prefix);
    sql.push_str(&map.table);
    (sql, start_idx)
}

/// One field of a coalesced upsert/update: the map it belongs to (for
/// table/value-column names) and the string value to set (unused for
/// increments, where the delta travels via `params` instead).
pub struct SetField<'a> {
    pub map: &'a Map,
    pub value: &'a str,
}

/// C6 `prev_set` flush: `INSERT INTO … (cols…) VALUES (?, …), (?, …) …`
/// with an upsert clause chosen by `caps`. `fields` holds one entry per
/// coalesced `set` call — every entry shares the same map/pattern/scope
/// (the caller guarantees mergeability before calling this).
pub fn upsert_insert(
    table_prefix: &str,
    fields: &[SetField<'_>],
    pattern_values: &[SmolStr],
    add_username: bool,
    username: &str,
    expire_timestamp: Option<i64>,
    caps: Capabilities,
) -> Result<(String, Vec<Parameter>), DictSqlError> {
    assert!(!fields.is_empty());
    let map0 = fields[0].map;

    let mut params = Vec::new();
    let mut columns = String::new();
    let mut placeholders = String::new();

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            columns.push(',');
            placeholders.push(',');
        }
        columns.push_str(field.map.first_value_column());
        placeholders.push('?');
        params.push(encode(
            field.map.first_value_type(),
            field.value,
            "",
            "value",
            &field.map.pattern,
        )?);
    }

    if add_username {
        let username_field = map0
            .username_field
            .as_ref()
            .expect("private-scope maps always carry a username_field");
        columns.push(',');
        columns.push_str(username_field);
        placeholders.push_str(",?");
        params.push(Parameter::Str(SmolStr::new(username)));
    }
    if let Some(ts) = expire_timestamp {
        let expire_field = map0
            .expire_field
            .as_ref()
            .expect("expire_timestamp implies an expiring map");
        columns.push(',');
        columns.push_str(expire_field);
        placeholders.push_str(",?");
        params.push(Parameter::Int64(ts));
    }

    for (i, field) in map0.pattern_fields.iter().enumerate() {
        columns.push(',');
        columns.push_str(&field.name);
        placeholders.push_str(",?");
        params.push(encode(
            field.value_type,
            &pattern_values[i],
            "",
            &field.name,
            &map0.pattern,
        )?);
    }

    let mut sql = format!(
        "INSERT INTO {table_prefix}{} ({columns}) VALUES ({placeholders})",
        map0.table
    );

    if caps.on_duplicate_key_update {
        sql.push_str(" ON DUPLICATE KEY UPDATE ");
        push_upsert_assignments(&mut sql, &mut params, fields, map0, expire_timestamp)?;
    } else if caps.on_conflict_do_update {
        sql.push_str(" ON CONFLICT (");
        for (i, field) in map0.pattern_fields.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            sql.push_str(&field.name);
        }
        if add_username {
            if !map0.pattern_fields.is_empty() {
                sql.push(',');
            }
            sql.push_str(map0.username_field.as_ref().unwrap());
        }
        sql.push_str(") DO UPDATE SET ");
        push_upsert_assignments(&mut sql, &mut params, fields, map0, expire_timestamp)?;
    }

    Ok((sql, params))
}

fn push_upsert_assignments(
    sql: &mut String,
    params: &mut Vec<Parameter>,
    fields: &[SetField<'_>],
    map0: &Map,
    expire_timestamp: Option<i64>,
) -> Result<(), DictSqlError> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str(field.map.first_value_column());
        sql.push_str("=?");
        params.push(encode(
            field.map.first_value_type(),
            field.value,
            "",
            "value",
            &field.map.pattern,
        )?);
    }
    if let Some(ts) = expire_timestamp {
        sql.push(',');
        sql.push_str(map0.expire_field.as_ref().unwrap());
        sql.push_str("=?");
        params.push(Parameter::Int64(ts));
    }
    Ok(())
}

/// C6 `prev_inc` flush: `UPDATE … SET col = col + ?, … WHERE …`. `fields`
/// holds one map per coalesced `atomic_inc` call; `deltas` is the matching
/// per-call delta, in the same order.
pub fn inc_update(
    table_prefix: &str,
    fields: &[&Map],
    deltas: &[i64],
    username: Option<&str>,
    pattern_values: &[SmolStr],
    add_username: bool,
) -> Result<(String, Vec<Parameter>), DictSqlError> {
    assert_eq!(fields.len(), deltas.len());
    assert!(!fields.is_empty());
    let map0 = fields[0];

    let mut sql = format!("UPDATE {table_prefix}{} SET ", map0.table);
    let mut params = Vec::new();
    for (i, (map, delta)) in fields.iter().zip(deltas).enumerate() {
        if i > 0 {
            sql.push(',');
        }
        let col = map.first_value_column();
        sql.push_str(&format!("{col}={col}+?"));
        params.push(Parameter::Int64(*delta));
    }

    build_where(
        username,
        map0,
        pattern_values,
        add_username,
        Recurse::None,
        &mut sql,
        &mut params,
    )?;
    Ok((sql, params))
}

/// C6 `unset`: `DELETE FROM <prefix><table> WHERE …`.
pub fn delete_stmt(
    table_prefix: &str,
    map: &Map,
    username: Option<&str>,
    pattern_values: &[SmolStr],
    add_username: bool,
) -> Result<(String, Vec<Parameter>), DictSqlError> {
    let mut sql = format!("DELETE FROM {table_prefix}{}", map.table);
    let mut params = Vec::new();
    build_where(
        username,
        map,
        pattern_values,
        add_username,
        Recurse::None,
        &mut sql,
        &mut params,
    )?;
    Ok((sql, params))
}

/// C7 expiry reaper: `DELETE FROM <prefix><table> WHERE <expire_field> <= ?`.
pub fn expire_delete(table_prefix: &str, map: &Map, now_micros: i64) -> (String, Vec<Parameter>) {
    let expire_field = map
        .expire_field
        .as_ref()
        .expect("expire_delete is only called for expiring maps");
    let sql = format!(
        "DELETE FROM {table_prefix}{} WHERE {expire_field} <= ?",
        map.table
    );
    (sql, vec![Parameter::Int64(now_micros)])
}
