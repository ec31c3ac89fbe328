//! C1 — Map Matcher: match a path against a map's `$`-templated pattern and
//! extract the positional variable bindings.

use dictsql_core::Map;
use smol_str::SmolStr;

/// Controls how strictly `match_pattern` must consume `path`.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Allow `path` to be a strict prefix of what `pattern` describes (used
    /// by iteration, which walks down from a partial path).
    pub partial_ok: bool,
    /// When `partial_ok`, allow more than one unbound `$` to remain.
    pub recurse: bool,
}

impl MatchOptions {
    pub const EXACT: MatchOptions = MatchOptions {
        partial_ok: false,
        recurse: false,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub values: Vec<SmolStr>,
    /// Length of `path` consumed.
    pub path_len: usize,
    /// Length of `pattern` consumed.
    pub pattern_len: usize,
}

/// Walk `pattern` and `path` in lockstep. See spec §4.1 for the exact state
/// machine; this is a direct transliteration of `dict_sql_map_match`.
pub fn match_pattern(pattern: &str, path: &str, opts: MatchOptions) -> Option<MatchResult> {
    let pat = pattern.as_bytes();
    let p = path.as_bytes();
    let mut pi = 0usize;
    let mut xi = 0usize;
    let mut values: Vec<SmolStr> = Vec::new();

    while pi < pat.len() && xi < p.len() {
        if pat[pi] == b'$' {
            pi += 1;
            if pi == pat.len() {
                // Pattern ended with this variable: it consumes the rest of
                // the path.
                let len = p.len() - xi;
                if opts.partial_ok {
                    // Iterating: the last field never matches fully. If
                    // there's a trailing '/', drop it and leave the '$'
                    // unconsumed (rewind pattern by one).
                    pi -= 1;
                    if p[xi + len - 1] == b'/' {
                        values.push(SmolStr::new(&path[xi..xi + len - 1]));
                    } else {
                        values.push(SmolStr::new(&path[xi..]));
                    }
                } else {
                    values.push(SmolStr::new(&path[xi..]));
                    xi += len;
                }
                return Some(MatchResult {
                    values,
                    path_len: xi,
                    pattern_len: pi,
                });
            }
            // Pattern matches up to the next '/' in path.
            match path[xi..].find('/') {
                Some(rel) => {
                    values.push(SmolStr::new(&path[xi..xi + rel]));
                    xi += rel; // leave xi pointing at the '/'
                }
                None => {
                    // No more '/': matches the rest, partially.
                    values.push(SmolStr::new(&path[xi..]));
                    xi = p.len();
                    pi += 1;
                }
            }
        } else if pat[pi] == p[xi] {
            pi += 1;
            xi += 1;
        } else {
            return None;
        }
    }

    if pi == pat.len() {
        if xi == p.len() {
            Some(MatchResult {
                values,
                path_len: xi,
                pattern_len: pi,
            })
        } else {
            // A longer key under the pattern is not an exact match.
            None
        }
    } else if !opts.partial_ok {
        None
    } else {
        // Partial matches must end right after a '/' (or at pattern start).
        if pi != 0 && pat[pi - 1] != b'/' {
            return None;
        }
        if opts.recurse {
            return Some(MatchResult {
                values,
                path_len: xi,
                pattern_len: pi,
            });
        }
        // Not recursing: require exactly one trailing `$` and no further
        // `/` in the pattern tail.
        if pat[pi] == b'$' && !pattern[pi..].contains('/') {
            Some(MatchResult {
                values,
                path_len: xi,
                pattern_len: pi,
            })
        } else {
            None
        }
    }
}

/// First-fit scan for an exact-match map (§4.1 `find_map`). Order is
/// significant: this is first-fit, not longest-match.
pub fn find_map<'a>(maps: &'a [Map], path: &str) -> Option<(&'a Map, Vec<SmolStr>)> {
    maps.iter().find_map(|map| {
        match_pattern(&map.pattern, path, MatchOptions::EXACT)
            .map(|result| (map, result.values))
    })
}

/// Scan from `start_idx` for a map that partially matches `path`, for
/// iteration (§4.1 `find_next_map_for_iter`). Returns the map, its index in
/// `maps`, the extracted values, and how much of `path`/`pattern` was
/// consumed.
pub fn find_next_map_for_iter<'a>(
    maps: &'a [Map],
    start_idx: usize,
    path: &str,
    recurse: bool,
) -> Option<(usize, &'a Map, MatchResult)> {
    for (offset, map) in maps[start_idx..].iter().enumerate() {
        let idx = start_idx + offset;
        let opts = MatchOptions {
            partial_ok: true,
            recurse,
        };
        if let Some(result) = match_pattern(&map.pattern, path, opts) {
            if recurse || result.values.len() + 1 >= map.pattern_fields.len() {
                return Some((idx, map, result));
            }
        }
    }
    None
}
