//! C8 — Driver Surface: binds the compiler (`dictsql-compiler`) and engine
//! (`dictsql-engine`) to the dictionary ABI a host embeds against
//! (spec §4.8): `init/deinit/wait/lookup/iterate/transaction/expire_scan`.

use std::rc::Rc;

use dictsql_core::{DictSqlError, Map};
use dictsql_driver::SqlDriver;
use dictsql_engine::{
    expire_scan, lookup, lookup_async, Clock, DictTransaction, IterItem, IterStep,
    IterateContext, IterateFlags, LookupResult, OpSettings, SystemClock,
};
use smol_str::SmolStr;

/// One dictionary handle: an immutable map list bound to a borrowed SQL
/// driver and a time source. Mirrors the original backend's `struct
/// sql_dict` minus the connection-cache refcounting, which belongs to
/// whoever owns `driver` (spec §5 "shared resources").
pub struct Dict<'d> {
    driver: &'d dyn SqlDriver,
    maps: Rc<Vec<Map>>,
    clock: Box<dyn Clock>,
}

impl<'d> Dict<'d> {
    /// `init`: bind a map list (already validated by `config::DictSqlConfig`)
    /// to a driver, using the wall clock.
    pub fn init(driver: &'d dyn SqlDriver, maps: Vec<Map>) -> Self {
        Dict {
            driver,
            maps: Rc::new(maps),
            clock: Box::new(SystemClock),
        }
    }

    /// As `init`, but with an injectable clock — used by tests that need a
    /// pinned `now` for expiry behaviour.
    pub fn with_clock(driver: &'d dyn SqlDriver, maps: Vec<Map>, clock: Box<dyn Clock>) -> Self {
        Dict {
            driver,
            maps: Rc::new(maps),
            clock,
        }
    }

    /// `deinit`: release this handle. The driver itself is owned by the
    /// caller, not by us, so there is nothing to unref here beyond draining
    /// outstanding async work.
    pub fn deinit(self) {
        self.driver.wait();
    }

    /// `wait`: block until any outstanding async operation on the
    /// underlying connection completes.
    pub fn wait(&self) {
        self.driver.wait();
    }

    pub fn lookup(&self, key: &str, settings: &OpSettings) -> Result<LookupResult, DictSqlError> {
        lookup(self.driver, &self.maps, settings, key, self.clock.now_epoch_secs())
    }

    pub fn lookup_async(
        &self,
        key: &str,
        settings: &OpSettings,
        callback: Box<dyn FnOnce(Result<LookupResult, DictSqlError>)>,
    ) {
        lookup_async(
            self.driver,
            &self.maps,
            settings,
            key,
            self.clock.now_epoch_secs(),
            callback,
        );
    }

    pub fn iterate_init(
        &self,
        path: impl Into<String>,
        flags: IterateFlags,
        username: Option<SmolStr>,
        max_rows: Option<u64>,
    ) -> Box<IterateContext> {
        Box::new(IterateContext::new(
            Rc::clone(&self.maps),
            self.driver.table_prefix().to_string(),
            self.driver.capabilities(),
            path,
            flags,
            username,
            max_rows,
        ))
    }

    /// Synchronous `iterate`: pulls the next `(key, values)` pair, or
    /// `None` once the context is exhausted.
    pub fn iterate(&self, ctx: &mut IterateContext) -> Option<Result<IterItem, DictSqlError>> {
        ctx.next_sync(self.driver, self.clock.now_epoch_secs())
    }

    /// Asynchronous `iterate`: see `IterateContext::next_async` for the
    /// `Pending`/`Row`/`Done` step contract.
    pub fn iterate_async(
        &self,
        ctx: Box<IterateContext>,
        callback: Box<dyn FnOnce(Box<IterateContext>, Result<IterStep, DictSqlError>)>,
    ) {
        ctx.next_async(self.driver, self.clock.now_epoch_secs(), callback);
    }

    pub fn iterate_deinit(&self, mut ctx: Box<IterateContext>) -> Result<(), DictSqlError> {
        ctx.deinit()
    }

    pub fn transaction_init(&self, settings: OpSettings) -> Box<DictTransaction<'_>> {
        Box::new(DictTransaction::new(
            self.driver,
            &self.maps,
            self.driver.table_prefix(),
            settings,
            self.clock.as_ref(),
        ))
    }

    pub fn transaction_commit(&self, txn: Box<DictTransaction<'_>>) -> Result<(), DictSqlError> {
        txn.commit()
    }

    pub fn transaction_commit_async(
        &self,
        txn: Box<DictTransaction<'_>>,
        callback: Box<dyn FnOnce(Result<(), DictSqlError>)>,
    ) {
        txn.commit_async(callback);
    }

    pub fn transaction_rollback(&self, txn: Box<DictTransaction<'_>>) {
        txn.rollback();
    }

    pub fn set(&self, txn: &mut DictTransaction<'_>, key: &str, value: &str) -> Result<(), DictSqlError> {
        txn.set(key, value)
    }

    pub fn unset(&self, txn: &mut DictTransaction<'_>, key: &str) -> Result<(), DictSqlError> {
        txn.unset(key)
    }

    pub fn atomic_inc(
        &self,
        txn: &mut DictTransaction<'_>,
        key: &str,
        delta: i64,
    ) -> Result<(), DictSqlError> {
        txn.atomic_inc(key, delta)
    }

    /// `expire_scan`: see `dictsql_engine::expire_scan` for the per-map
    /// transaction semantics.
    pub fn expire_scan(&self) -> Result<usize, DictSqlError> {
        expire_scan(self.driver, &self.maps, self.clock.as_ref())
    }
}
