//! Path sentinels: the single-byte prefixes that pick shared vs. private scope.

/// First segment of a shared-scope path, e.g. `shared/quota/alice`.
pub const PATH_PREFIX_SHARED: &str = "shared";
/// First segment of a private-scope path, e.g. `priv/quota/alice`.
pub const PATH_PREFIX_PRIVATE: &str = "priv";

/// Which scope a path belongs to, derived from its leading byte.
///
/// Shared paths never bind a username into the query; private paths always
/// do (see `add_username` throughout the WHERE builder and staging buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Shared,
    Private,
}

impl PathClass {
    /// Classify `path` by its first byte. Unrecognized paths are treated as
    /// shared; callers that require a mapped path will fail later at the
    /// map-matching stage instead.
    pub fn of(path: &str) -> PathClass {
        match path.as_bytes().first() {
            Some(b) if *b == PATH_PREFIX_PRIVATE.as_bytes()[0] => PathClass::Private,
            _ => PathClass::Shared,
        }
    }

    pub fn add_username(self) -> bool {
        matches!(self, PathClass::Private)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_leading_byte() {
        assert_eq!(PathClass::of("shared/quota/alice"), PathClass::Shared);
        assert_eq!(PathClass::of("priv/quota/alice"), PathClass::Private);
    }

    #[test]
    fn add_username_follows_class() {
        assert!(!PathClass::of("shared/x").add_username());
        assert!(PathClass::of("priv/x").add_username());
    }
}
