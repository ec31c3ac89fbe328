//! The transaction surface: queue writes, then commit or roll back.

use std::cell::Cell;
use std::rc::Rc;

use crate::statement::Statement;

/// Outcome of a commit attempt (spec §7: `WRITE_UNCERTAIN` is distinct from
/// every other backend failure).
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Ok,
    Failed(String),
    WriteUncertain(String),
}

/// A row-count sink for an `UPDATE` queued via `update_get_rows`. The
/// driver fills this in when the statement actually executes (which may be
/// deferred until commit, depending on backend); `None` until then.
pub type RowCountSlot = Rc<Cell<Option<u32>>>;

pub trait Transaction {
    /// Queue a write whose affected-row count nobody cares about (INSERT,
    /// DELETE, or an UPDATE the caller isn't tracking).
    fn update(&mut self, stmt: Statement);

    /// Queue an UPDATE whose affected-row count must be reported back into
    /// `slot` once known, so the caller can later distinguish "row existed
    /// and was updated" from "row did not exist" (spec §3 inc-row chain).
    fn update_get_rows(&mut self, stmt: Statement, slot: RowCountSlot);

    fn commit(self: Box<Self>) -> CommitOutcome;
    fn commit_async(self: Box<Self>, callback: Box<dyn FnOnce(CommitOutcome)>);
    fn rollback(self: Box<Self>);
}
