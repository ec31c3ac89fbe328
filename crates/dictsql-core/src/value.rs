//! Typed value model shared by the map schema, the value codec, and the
//! parameter list handed to the SQL driver.

use smol_str::SmolStr;
use uuid::Uuid;

/// The SQL-side type a pattern field or value column is encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Type {
    String,
    Int,
    Uint,
    Double,
    Uuid,
    HexBlob,
}

/// A tagged value bound to a single `?` placeholder, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Str(SmolStr),
    Int64(i64),
    Double(f64),
    Binary(Vec<u8>),
    Uuid(Uuid),
}

impl Parameter {
    pub fn value_type(&self) -> Type {
        match self {
            Parameter::Str(_) => Type::String,
            Parameter::Int64(_) => Type::Int,
            Parameter::Double(_) => Type::Double,
            Parameter::Binary(_) => Type::HexBlob,
            Parameter::Uuid(_) => Type::Uuid,
        }
    }
}
