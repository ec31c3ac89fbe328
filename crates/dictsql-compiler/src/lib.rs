//! The path→SQL compiler: map matching (C1), value codec (C2), WHERE
//! clause assembly (C3), and the surrounding statement text (SELECT /
//! INSERT…ON CONFLICT / UPDATE / DELETE). Pure functions only — no
//! execution, no buffering; see `dictsql-engine` for that.

pub mod codec;
pub mod matcher;
pub mod query;
pub mod where_builder;

pub use matcher::{find_map, find_next_map_for_iter, match_pattern, MatchOptions, MatchResult};
pub use where_builder::{build_where, Recurse};
