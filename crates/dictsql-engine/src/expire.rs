//! C7 — Expiry Reaper: scan all expiring maps and delete rows past their
//! TTL, one one-statement transaction per map.

use dictsql_compiler::query::expire_delete;
use dictsql_core::{DictSqlError, Map};
use dictsql_driver::{CommitOutcome, SqlDriver, Statement, StatementKind};

use crate::clock::Clock;

/// Runs `DELETE FROM <prefix><table> WHERE <expire_field> <= now_micros`
/// for every map that declares an `expire_field`. `now_micros` intentionally
/// uses microsecond units against the same column the lookup/iterate path
/// compares in seconds (spec §9 open question — preserved verbatim, not a
/// bug to fix here).
///
/// Returns `Ok(n)` where `n` is the number of expiring maps found (`0` if
/// none are configured), or `Err` on the first backend failure.
pub fn expire_scan(
    driver: &dyn SqlDriver,
    maps: &[Map],
    clock: &dyn Clock,
) -> Result<usize, DictSqlError> {
    let now_micros = clock.now_epoch_micros();
    let mut expiring = 0usize;

    for map in maps {
        if map.expire_field.is_none() {
            continue;
        }
        expiring += 1;

        let (sql, params) = expire_delete(driver.table_prefix(), map, now_micros);
        let kind = if driver.capabilities().prepared_statements {
            StatementKind::Prepared
        } else {
            StatementKind::OneShot
        };
        let stmt = Statement::new(sql, params, kind);

        let mut txn = driver.begin();
        txn.update(stmt);
        match txn.commit() {
            CommitOutcome::Ok => {}
            CommitOutcome::Failed(msg) => return Err(DictSqlError::CommitFailed(msg)),
            CommitOutcome::WriteUncertain(msg) => return Err(DictSqlError::WriteUncertain(msg)),
        }
    }

    Ok(expiring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dictsql_core::{PatternField, Type};

    fn expiring_map() -> Map {
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

    fn non_expiring_map() -> Map {
        Map {
            pattern: "shared/quota/$".into(),
            table: "q".into(),
            pattern_fields: vec![PatternField::new("user", Type::String)],
            value_field: "bytes".into(),
            value_types: vec![Type::Int],
            username_field: None,
            expire_field: None,
        }
    }

    #[test]
    fn expire_delete_statement_uses_microseconds() {
        let (sql, params) = expire_delete("", &expiring_map(), 1_700_000_000_000_000);
        assert_eq!(sql, "DELETE FROM sessions WHERE exp <= ?");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn maps_without_expire_field_are_not_counted() {
        let maps = vec![non_expiring_map()];
        assert!(maps.iter().all(|m| m.expire_field.is_none()));
    }
}
