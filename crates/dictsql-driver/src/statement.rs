//! The statement shape handed to a driver: SQL text plus the bound
//! parameters in `?`-placeholder order, plus the per-statement extras the
//! original backend attaches to every transactional write.

use std::time::SystemTime;

use dictsql_core::Parameter;

/// Whether the driver should reuse a prepared statement for this query
/// shape or treat it as one-off (spec §11.1 — `SQL_DB_FLAG_PREP_STATEMENTS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Prepared,
    OneShot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Parameter>,
    pub kind: StatementKind,
    /// Attached to transactional writes so the backend can timestamp the
    /// row the same way the transaction's operation settings intended.
    pub timestamp: Option<SystemTime>,
    /// When set, the driver must not log the expanded parameter values.
    pub hide_log_values: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Parameter>, kind: StatementKind) -> Self {
        Statement {
            sql: sql.into(),
            params,
            kind,
            timestamp: None,
            hide_log_values: false,
        }
    }
}
