//! The map schema: the immutable, config-derived rules that say which SQL
//! table and columns a path pattern maps to.

use smol_str::SmolStr;

use crate::value::Type;

/// One `$`-position in a map's pattern, in lexical (left-to-right) order.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternField {
    pub name: SmolStr,
    pub value_type: Type,
}

impl PatternField {
    pub fn new(name: impl Into<SmolStr>, value_type: Type) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// A schema entry: `pattern` selects this map for a path; `table` and the
/// various `*_field`s say where the row lives and which columns hold what.
///
/// `pattern_fields.len()` must equal the number of `$` markers in `pattern`
/// (testable property #2 in the design); nothing in this crate enforces
/// that at construction time, it is a precondition of whoever builds the
/// map list from configuration (`dictsql::config`).
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub pattern: SmolStr,
    pub table: SmolStr,
    pub pattern_fields: Vec<PatternField>,
    /// Comma-joined SQL column list, e.g. `"bytes"` or `"bytes,quota"`.
    pub value_field: SmolStr,
    pub value_types: Vec<Type>,
    pub username_field: Option<SmolStr>,
    pub expire_field: Option<SmolStr>,
}

impl Map {
    /// The individual column names making up `value_field`, in order.
    pub fn value_columns(&self) -> impl Iterator<Item = &str> {
        self.value_field.split(',')
    }

    /// The first value column, which governs encoding for `set`/`atomic_inc`
    /// (see spec §4.6: "Each map's first `value_type`...").
    pub fn first_value_column(&self) -> &str {
        self.value_field
            .split(',')
            .next()
            .expect("value_field is never empty")
    }

    pub fn first_value_type(&self) -> Type {
        self.value_types[0]
    }

    pub fn values_count(&self) -> usize {
        self.value_types.len()
    }
}
