//! Data model and error taxonomy shared by every other `dictsql-*` crate.
//!
//! This crate owns no SQL-generation logic (see `dictsql-compiler`) and no
//! execution logic (see `dictsql-engine`); it is the vocabulary both of
//! those crates speak.

pub mod error;
pub mod model;
pub mod path;
pub mod value;

pub use error::{DictSqlError, Result};
pub use model::{Map, PatternField};
pub use path::PathClass;
pub use value::{Parameter, Type};
