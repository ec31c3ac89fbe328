//! The `dictsql` facade: a hierarchical, path-addressed key/value
//! dictionary whose storage is a relational database, compiled down to
//! parameterized SQL by `dictsql-compiler` and driven by `dictsql-engine`
//! against whatever backend implements `dictsql-driver::SqlDriver`.
//!
//! This crate is the one a host links against: `config` turns a YAML/JSON
//! document into a validated map list, and `driver_surface::Dict` is the
//! handle that list is bound to.

pub mod config;
pub mod driver_surface;

pub use config::{ConfigError, DictSqlConfig, MapConfig, PatternFieldConfig};
pub use driver_surface::Dict;

pub use dictsql_core::{DictSqlError, Map, PatternField, PathClass, Type};
pub use dictsql_driver::{
    Capabilities, CommitOutcome, ResultCursor, ResultRow, RowCountSlot, RowOutcome, SqlDriver,
    Statement, StatementKind, Transaction,
};
pub use dictsql_engine::{
    Clock, DictTransaction, FixedClock, IterItem, IterStep, IterateContext, IterateFlags,
    LookupResult, OpSettings, SystemClock,
};
