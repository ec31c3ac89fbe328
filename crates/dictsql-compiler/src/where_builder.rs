//! C3 — WHERE Builder: emit the WHERE clause for exact, one-level, or
//! full-recursion queries, with optional username filter.

use dictsql_core::{DictSqlError, Map, Parameter};
use smol_str::SmolStr;

use crate::codec::encode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurse {
    None,
    One,
    Full,
}

/// Append a `WHERE ...` clause (or nothing, if there's nothing to filter
/// on) to `query`, pushing bound parameters onto `params` in emission
/// order. See spec §4.3 for the exact rule set.
pub fn build_where(
    username: Option<&str>,
    map: &Map,
    pattern_values: &[SmolStr],
    add_username: bool,
    recurse: Recurse,
    query: &mut String,
    params: &mut Vec<Parameter>,
) -> Result<(), DictSqlError> {
    let count = map.pattern_fields.len();
    let count2 = pattern_values.len();
    debug_assert!(count2 <= count, "iteration may supply fewer values than fields");

    if count2 == 0 && !add_username {
        // We want everything.
        return Ok(());
    }

    query.push_str(" WHERE");

    let exact_count = if count == count2 && recurse != Recurse::None {
        count2 - 1
    } else {
        count2
    };
    if exact_count != pattern_values.len() {
        return Err(DictSqlError::KeyPastPattern {
            pattern: map.pattern.to_string(),
        });
    }

    let mut i = 0;
    while i < exact_count {
        if i > 0 {
            query.push_str(" AND");
        }
        let field = &map.pattern_fields[i];
        query.push_str(&format!(" {} = ?", field.name));
        params.push(encode(
            field.value_type,
            &pattern_values[i],
            "",
            &field.name,
            &map.pattern,
        )?);
        i += 1;
    }

    match recurse {
        Recurse::None => {}
        Recurse::One => {
            if i > 0 {
                query.push_str(" AND");
            }
            if i < count2 {
                let field = &map.pattern_fields[i];
                query.push_str(&format!(" {} LIKE ?", field.name));
                params.push(encode(
                    field.value_type,
                    &pattern_values[i],
                    "/%",
                    &field.name,
                    &map.pattern,
                )?);
                query.push_str(&format!(" AND {} NOT LIKE ?", field.name));
                params.push(encode(
                    field.value_type,
                    &pattern_values[i],
                    "/%/%",
                    &field.name,
                    &map.pattern,
                )?);
            } else {
                let field = &map.pattern_fields[i];
                query.push_str(&format!(
                    " {} LIKE '%' AND {} NOT LIKE '%/%'",
                    field.name, field.name
                ));
            }
        }
        Recurse::Full => {
            if i < count2 {
                if i > 0 {
                    query.push_str(" AND");
                }
                let field = &map.pattern_fields[i];
                query.push_str(&format!(" {} LIKE ?", field.name));
                params.push(encode(
                    field.value_type,
                    &pattern_values[i],
                    "/%",
                    &field.name,
                    &map.pattern,
                )?);
            }
        }
    }

    if add_username {
        let username_field = map
            .username_field
            .as_ref()
            .expect("private-scope maps always carry a username_field");
        if count2 > 0 {
            query.push_str(" AND");
        }
        query.push_str(&format!(" {username_field} = ?"));
        params.push(Parameter::Str(SmolStr::new(username.unwrap_or(""))));
    }

    Ok(())
}

/// Parameter list length must equal the number of `?` placeholders emitted
/// (testable property #3) — a small helper used by tests and by callers
/// that want a cheap sanity check before handing a statement to a driver.
pub fn placeholder_count(sql: &str) -> usize {
    sql.matches('?').count()
}
