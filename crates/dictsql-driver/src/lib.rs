//! External SQL driver contract (spec §6). This crate defines only traits
//! and plain data carriers — no backend implementation. Connection
//! pooling, prepared-statement caching, and retry policy belong to whoever
//! implements `SqlDriver`.

pub mod driver;
pub mod result;
pub mod statement;
pub mod transaction;

pub use driver::{Capabilities, SqlDriver};
pub use result::{ResultCursor, ResultRow, RowOutcome};
pub use statement::{Statement, StatementKind};
pub use transaction::{CommitOutcome, RowCountSlot, Transaction};
