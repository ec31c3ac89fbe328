//! The top-level SQL driver contract (spec §6). Connection pooling,
//! prepared-statement caching, and dialect quirks beyond the three
//! capability flags below are the driver's business, not ours.

use dictsql_core::DictSqlError;

use crate::result::ResultCursor;
use crate::statement::Statement;
use crate::transaction::Transaction;

/// Backend capability flags (spec §1: "a small capability flag"). The
/// compiler picks an upsert strategy based on these (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub on_duplicate_key_update: bool,
    pub on_conflict_do_update: bool,
    pub prepared_statements: bool,
}

pub trait SqlDriver {
    fn capabilities(&self) -> Capabilities;

    /// Table-name prefix the driver was configured with; every emitted
    /// `FROM`/`INTO`/`UPDATE` target is `table_prefix() + map.table`.
    fn table_prefix(&self) -> &str;

    fn query(&self, stmt: &Statement) -> Result<Box<dyn ResultCursor>, DictSqlError>;
    fn query_async(
        &self,
        stmt: Statement,
        callback: Box<dyn FnOnce(Result<Box<dyn ResultCursor>, DictSqlError>)>,
    );

    fn begin(&self) -> Box<dyn Transaction>;

    /// Block until any outstanding async operation on this connection
    /// completes (spec §6: `wait`).
    fn wait(&self);
}
