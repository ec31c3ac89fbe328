//! §4.4a — the expiry-skipping row iterator shared by the lookup engine
//! (C4) and the iteration engine (C5).

use dictsql_core::Map;
use dictsql_driver::{ResultCursor, RowOutcome};

pub enum RowAdvance {
    Row,
    Done,
    Error(String),
}

/// Advance `cursor` to the next row that hasn't expired, silently skipping
/// rows whose `expire_field` (always result column 0, when present) is at
/// or before `now`. A NULL or unparsable expiry value is treated as *not*
/// expired, matching the original backend's behaviour exactly.
pub fn next_surviving_row(map: &Map, cursor: &mut dyn ResultCursor, now_epoch_secs: i64) -> RowAdvance {
    loop {
        let mut outcome = cursor.next_row();
        while let RowOutcome::More = outcome {
            outcome = cursor.more();
        }
        match outcome {
            RowOutcome::Row => {
                if map.expire_field.is_some() && row_is_expired(cursor, now_epoch_secs) {
                    continue;
                }
                return RowAdvance::Row;
            }
            RowOutcome::Done => return RowAdvance::Done,
            RowOutcome::More => unreachable!("drained above"),
            RowOutcome::Error(e) => return RowAdvance::Error(e),
        }
    }
}

fn row_is_expired(cursor: &dyn ResultCursor, now_epoch_secs: i64) -> bool {
    match cursor.row().get_text(0).and_then(|s| s.parse::<i64>().ok()) {
        Some(expire_timestamp) => expire_timestamp <= now_epoch_secs,
        None => false,
    }
}
