//! C2 — Value Codec: convert between textual path/result values and typed
//! SQL parameters.

use dictsql_core::{DictSqlError, Parameter, Type};
use dictsql_driver::ResultRow;
use smol_str::SmolStr;
use uuid::Uuid;

/// Encode a path-derived text value (plus an optional LIKE suffix such as
/// `"/%"` or `"/%/%"`) into a bound parameter.
///
/// `field_name` and `pattern` are only used to format the error message.
pub fn encode(
    value_type: Type,
    text: &str,
    suffix: &str,
    field_name: &str,
    pattern: &str,
) -> Result<Parameter, DictSqlError> {
    let invalid = |type_name: &'static str| DictSqlError::InvalidValue {
        field: field_name.to_string(),
        type_name,
        value: format!("{text}{suffix}"),
        pattern: pattern.to_string(),
    };

    match value_type {
        Type::String => {
            let combined = if suffix.is_empty() {
                SmolStr::new(text)
            } else {
                SmolStr::new(format!("{text}{suffix}"))
            };
            Ok(Parameter::Str(combined))
        }
        Type::Int => {
            if !suffix.is_empty() {
                return Err(invalid("64-bit signed integer"));
            }
            text.parse::<i64>()
                .map(Parameter::Int64)
                .map_err(|_| invalid("64-bit signed integer"))
        }
        Type::Uint => {
            if !suffix.is_empty() || text.starts_with('-') {
                return Err(invalid("64-bit unsigned integer"));
            }
            text.parse::<i64>()
                .map(Parameter::Int64)
                .map_err(|_| invalid("64-bit unsigned integer"))
        }
        Type::Double => {
            if !suffix.is_empty() {
                return Err(invalid("double"));
            }
            text.parse::<f64>()
                .map(Parameter::Double)
                .map_err(|_| invalid("double"))
        }
        Type::Uuid => {
            if !suffix.is_empty() {
                return Err(invalid("uuid"));
            }
            Uuid::parse_str(text)
                .map(Parameter::Uuid)
                .map_err(|_| invalid("uuid"))
        }
        Type::HexBlob => {
            let mut bytes = hex_decode(text).ok_or_else(|| invalid("hexblob"))?;
            bytes.extend_from_slice(suffix.as_bytes());
            Ok(Parameter::Binary(bytes))
        }
    }
}

/// Decode column `idx` of `row` (typed as `value_type`) back to path/result
/// text. NULL maps to the empty string; UUID canonicalises; HEXBLOB
/// hex-encodes raw bytes back to text.
pub fn decode(value_type: Type, row: &dyn ResultRow, idx: usize) -> String {
    match value_type {
        Type::String | Type::Int | Type::Uint | Type::Double => {
            row.get_text(idx).unwrap_or("").to_string()
        }
        Type::Uuid => match row.get_text(idx) {
            None => String::new(),
            Some(text) => Uuid::parse_str(text)
                .map(|u| u.hyphenated().to_string())
                .unwrap_or_default(),
        },
        Type::HexBlob => match row.get_binary(idx) {
            None => String::new(),
            Some(bytes) => hex_encode(bytes),
        },
    }
}

/// NULL coerces to `None` rather than empty string — used only by the
/// async lookup contract (spec §4.4 point 5 / §9 open question).
pub fn decode_primary_value_async(value_type: Type, row: &dyn ResultRow, idx: usize) -> Option<String> {
    match value_type {
        Type::String | Type::Int | Type::Uint | Type::Double => {
            row.get_text(idx).map(|s| s.to_string())
        }
        Type::Uuid => row.get_text(idx).map(|text| {
            Uuid::parse_str(text)
                .map(|u| u.hyphenated().to_string())
                .unwrap_or_default()
        }),
        Type::HexBlob => row.get_binary(idx).map(hex_encode),
    }
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    let bytes = text.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_rejects_non_numeric() {
        let err = encode(Type::Int, "not-a-number", "", "bytes", "pat").unwrap_err();
        assert!(matches!(err, DictSqlError::InvalidValue { .. }));
    }

    #[test]
    fn uint_rejects_leading_minus() {
        let err = encode(Type::Uint, "-5", "", "bytes", "pat").unwrap_err();
        assert!(matches!(err, DictSqlError::InvalidValue { .. }));
    }

    #[test]
    fn string_concatenates_suffix() {
        let p = encode(Type::String, "alice", "/%", "user", "pat").unwrap();
        assert_eq!(p, Parameter::Str(SmolStr::new("alice/%")));
    }

    #[test]
    fn hexblob_round_trips() {
        let p = encode(Type::HexBlob, "deadbeef", "", "blob", "pat").unwrap();
        assert_eq!(p, Parameter::Binary(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn non_string_type_rejects_nonempty_suffix() {
        assert!(encode(Type::Int, "5", "/%", "bytes", "pat").is_err());
        assert!(encode(Type::Double, "5.0", "/%", "bytes", "pat").is_err());
        assert!(encode(Type::Uuid, "not-a-uuid", "/%", "bytes", "pat").is_err());
    }
}
