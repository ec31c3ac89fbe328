//! The execution layer built on top of `dictsql-compiler`: single-key
//! lookup (C4), multi-map iteration (C5), transaction staging (C6), and the
//! expiry reaper (C7). Every SQL statement is still produced by
//! `dictsql-compiler`; this crate owns sequencing, buffering, and driving
//! the `dictsql-driver` traits.

pub mod clock;
pub mod expire;
pub mod iterate;
pub mod lookup;
pub mod row_advance;
pub mod settings;
pub mod transaction;

pub use clock::{Clock, FixedClock, SystemClock};
pub use expire::expire_scan;
pub use iterate::{IterItem, IterStep, IterateContext, IterateFlags};
pub use lookup::{lookup, lookup_async, LookupResult};
pub use row_advance::{next_surviving_row, RowAdvance};
pub use settings::OpSettings;
pub use transaction::DictTransaction;
