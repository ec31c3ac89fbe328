//! Per-call settings threaded through every operation (`dict_op_settings`
//! in the original). Kept separate from the map list because the map list
//! is immutable config while these vary per caller/session.

use smol_str::SmolStr;

#[derive(Debug, Clone, Default)]
pub struct OpSettings {
    /// The active session's username; read by the WHERE builder whenever
    /// a private-scope path requires `username_field = ?`.
    pub username: Option<SmolStr>,
    /// TTL for `set`/`atomic_inc` writes. Zero means "no expiry".
    pub expire_secs: u64,
    /// Suppress logging of bound parameter values for this operation.
    pub hide_log_values: bool,
}
