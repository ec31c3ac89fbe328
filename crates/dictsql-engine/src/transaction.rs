//! C6 — Transaction Staging: coalesce consecutive mergeable `set`/
//! `atomic_inc` calls into single multi-row statements while preserving
//! call order against `unset` and non-mergeable operations.

use dictsql_compiler::query::{delete_stmt, inc_update, upsert_insert, SetField};
use dictsql_compiler::find_map;
use dictsql_core::{DictSqlError, Map, PathClass};
use dictsql_driver::{
    Capabilities, CommitOutcome, RowCountSlot, SqlDriver, Statement, StatementKind, Transaction,
};
use smol_str::SmolStr;

use crate::clock::Clock;
use crate::settings::OpSettings;

struct StagedSet<'a> {
    map: &'a Map,
    pattern_values: Vec<SmolStr>,
    add_username: bool,
    value: String,
}

struct StagedInc<'a> {
    map: &'a Map,
    pattern_values: Vec<SmolStr>,
    add_username: bool,
    delta: i64,
}

/// Same table, same path class, same username field (if private), and the
/// same pattern values: two staged ops that can share one statement (spec
/// §4.6 `maps_are_mergeable`).
fn mergeable(
    map_a: &Map,
    values_a: &[SmolStr],
    username_a: bool,
    map_b: &Map,
    values_b: &[SmolStr],
    username_b: bool,
) -> bool {
    if map_a.table != map_b.table || username_a != username_b {
        return false;
    }
    if username_a && map_a.username_field != map_b.username_field {
        return false;
    }
    values_a == values_b
}

pub struct DictTransaction<'a> {
    maps: &'a [Map],
    table_prefix: &'a str,
    capabilities: Capabilities,
    settings: OpSettings,
    clock: &'a dyn Clock,
    driver_txn: Box<dyn Transaction>,
    prev_set: Vec<StagedSet<'a>>,
    prev_inc: Vec<StagedInc<'a>>,
    inc_slots: Vec<RowCountSlot>,
    changed: bool,
    error: Option<DictSqlError>,
}

impl<'a> DictTransaction<'a> {
    pub fn new(
        driver: &dyn SqlDriver,
        maps: &'a [Map],
        table_prefix: &'a str,
        settings: OpSettings,
        clock: &'a dyn Clock,
    ) -> Self {
        DictTransaction {
            maps,
            table_prefix,
            capabilities: driver.capabilities(),
            settings,
            clock,
            driver_txn: driver.begin(),
            prev_set: Vec::new(),
            prev_inc: Vec::new(),
            inc_slots: Vec::new(),
            changed: false,
            error: None,
        }
    }

    fn statement_kind(&self) -> StatementKind {
        if self.capabilities.prepared_statements {
            StatementKind::Prepared
        } else {
            StatementKind::OneShot
        }
    }

    fn latch<T>(&mut self, result: Result<T, DictSqlError>) -> Result<T, DictSqlError> {
        if let Err(e) = &result {
            self.error = Some(e.clone());
        }
        result
    }

    /// Queue an upsert. Flushes `prev_inc` unconditionally (the two buffers
    /// are never simultaneously non-empty) and flushes `prev_set` first if
    /// it holds ops that can't merge with this one.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), DictSqlError> {
        if self.error.is_some() {
            return Ok(());
        }
        let result = self.stage_set(key, value);
        self.latch(result)
    }

    fn stage_set(&mut self, key: &str, value: &str) -> Result<(), DictSqlError> {
        let (map, pattern_values) = find_map(self.maps, key)
            .ok_or_else(|| DictSqlError::UnmappedKey { key: key.to_string() })?;
        let add_username = PathClass::of(key).add_username();

        self.flush_inc()?;
        if let Some(last) = self.prev_set.last() {
            if !mergeable(
                last.map,
                &last.pattern_values,
                last.add_username,
                map,
                &pattern_values,
                add_username,
            ) {
                self.flush_set()?;
            }
        }
        self.prev_set.push(StagedSet {
            map,
            pattern_values,
            add_username,
            value: value.to_string(),
        });
        self.changed = true;
        Ok(())
    }

    pub fn atomic_inc(&mut self, key: &str, delta: i64) -> Result<(), DictSqlError> {
        if self.error.is_some() {
            return Ok(());
        }
        let result = self.stage_inc(key, delta);
        self.latch(result)
    }

    fn stage_inc(&mut self, key: &str, delta: i64) -> Result<(), DictSqlError> {
        let (map, pattern_values) = find_map(self.maps, key)
            .ok_or_else(|| DictSqlError::UnmappedKey { key: key.to_string() })?;
        let add_username = PathClass::of(key).add_username();

        self.flush_set()?;
        if let Some(last) = self.prev_inc.last() {
            if !mergeable(
                last.map,
                &last.pattern_values,
                last.add_username,
                map,
                &pattern_values,
                add_username,
            ) {
                self.flush_inc()?;
            }
        }
        self.prev_inc.push(StagedInc {
            map,
            pattern_values,
            add_username,
            delta,
        });
        self.changed = true;
        Ok(())
    }

    /// `DELETE FROM <prefix><table> WHERE ...`, flushing both staging
    /// buffers first so SQL reaches the backend in call order.
    pub fn unset(&mut self, key: &str) -> Result<(), DictSqlError> {
        if self.error.is_some() {
            return Ok(());
        }
        let result = self.stage_unset(key);
        self.latch(result)
    }

    fn stage_unset(&mut self, key: &str) -> Result<(), DictSqlError> {
        self.flush_set()?;
        self.flush_inc()?;

        let (map, pattern_values) = find_map(self.maps, key)
            .ok_or_else(|| DictSqlError::UnmappedKey { key: key.to_string() })?;
        let add_username = PathClass::of(key).add_username();
        let (sql, params) = delete_stmt(
            self.table_prefix,
            map,
            self.settings.username.as_deref(),
            &pattern_values,
            add_username,
        )?;
        self.driver_txn
            .update(Statement::new(sql, params, self.statement_kind()));
        self.changed = true;
        Ok(())
    }

    fn flush_set(&mut self) -> Result<(), DictSqlError> {
        if self.prev_set.is_empty() {
            return Ok(());
        }
        let staged = std::mem::take(&mut self.prev_set);
        if self.error.is_some() {
            return Ok(());
        }
        let map0 = staged[0].map;
        let pattern_values = staged[0].pattern_values.clone();
        let add_username = staged[0].add_username;
        let expire_timestamp = if self.settings.expire_secs > 0 && map0.expire_field.is_some() {
            Some(self.clock.now_epoch_secs() + self.settings.expire_secs as i64)
        } else {
            None
        };

        let fields: Vec<SetField<'_>> = staged
            .iter()
            .map(|s| SetField {
                map: s.map,
                value: &s.value,
            })
            .collect();
        let username = self.settings.username.as_deref().unwrap_or("");
        let (sql, params) = upsert_insert(
            self.table_prefix,
            &fields,
            &pattern_values,
            add_username,
            username,
            expire_timestamp,
            self.capabilities,
        )?;
        let mut stmt = Statement::new(sql, params, self.statement_kind());
        stmt.hide_log_values = self.settings.hide_log_values;
        self.driver_txn.update(stmt);
        Ok(())
    }

    fn flush_inc(&mut self) -> Result<(), DictSqlError> {
        if self.prev_inc.is_empty() {
            return Ok(());
        }
        let staged = std::mem::take(&mut self.prev_inc);
        if self.error.is_some() {
            return Ok(());
        }
        let fields: Vec<&Map> = staged.iter().map(|s| s.map).collect();
        let deltas: Vec<i64> = staged.iter().map(|s| s.delta).collect();
        let pattern_values = staged[0].pattern_values.clone();
        let add_username = staged[0].add_username;

        let (sql, params) = inc_update(
            self.table_prefix,
            &fields,
            &deltas,
            self.settings.username.as_deref(),
            &pattern_values,
            add_username,
        )?;
        let mut stmt = Statement::new(sql, params, self.statement_kind());
        stmt.hide_log_values = self.settings.hide_log_values;
        let slot: RowCountSlot = Default::default();
        self.inc_slots.push(slot.clone());
        self.driver_txn.update_get_rows(stmt, slot);
        Ok(())
    }

    fn map_commit_outcome(outcome: CommitOutcome, any_inc_not_found: bool) -> Result<(), DictSqlError> {
        match outcome {
            CommitOutcome::Ok if any_inc_not_found => Err(DictSqlError::NotFound),
            CommitOutcome::Ok => Ok(()),
            CommitOutcome::Failed(msg) => Err(DictSqlError::CommitFailed(msg)),
            CommitOutcome::WriteUncertain(msg) => Err(DictSqlError::WriteUncertain(msg)),
        }
    }

    pub fn commit(mut self: Box<Self>) -> Result<(), DictSqlError> {
        let set_result = self.flush_set();
        self.latch(set_result).ok();
        let inc_result = self.flush_inc();
        self.latch(inc_result).ok();

        if let Some(e) = self.error.clone() {
            self.driver_txn.rollback();
            return Err(DictSqlError::CommitFailed(e.to_string()));
        }
        if !self.changed {
            self.driver_txn.rollback();
            return Ok(());
        }

        let any_inc_not_found_slots = self.inc_slots;
        let driver_txn = self.driver_txn;
        let outcome = driver_txn.commit();
        Self::map_commit_outcome(
            outcome,
            any_inc_not_found_slots
                .iter()
                .any(|slot| slot.get() == Some(0)),
        )
    }

    pub fn commit_async(
        mut self: Box<Self>,
        callback: Box<dyn FnOnce(Result<(), DictSqlError>)>,
    ) {
        let set_result = self.flush_set();
        self.latch(set_result).ok();
        let inc_result = self.flush_inc();
        self.latch(inc_result).ok();

        if let Some(e) = self.error.clone() {
            self.driver_txn.rollback();
            return callback(Err(DictSqlError::CommitFailed(e.to_string())));
        }
        if !self.changed {
            self.driver_txn.rollback();
            return callback(Ok(()));
        }

        let inc_slots = self.inc_slots;
        let driver_txn = self.driver_txn;
        driver_txn.commit_async(Box::new(move |outcome| {
            let any_inc_not_found = inc_slots.iter().any(|slot| slot.get() == Some(0));
            callback(Self::map_commit_outcome(outcome, any_inc_not_found));
        }));
    }

    pub fn rollback(self: Box<Self>) {
        self.driver_txn.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dictsql_core::{PatternField, Type};

    fn map() -> Map {
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
    fn mergeable_requires_same_table_and_values() {
        let m = map();
        let alice = vec![SmolStr::new("alice")];
        let bob = vec![SmolStr::new("bob")];
        assert!(mergeable(&m, &alice, false, &m, &alice, false));
        assert!(!mergeable(&m, &alice, false, &m, &bob, false));
    }

    #[test]
    fn mergeable_requires_matching_username_field_when_private() {
        let mut m2 = map();
        m2.username_field = Some("u2".into());
        let values = vec![SmolStr::new("alice")];
        assert!(!mergeable(&map(), &values, true, &m2, &values, true));
    }
}
