use crate::{strinc, Key};
use serde::{Deserialize, Serialize};


/// A symbolic reference to a key position in the store.
///
/// The backend resolves it to a concrete key: take the first key ordered
/// after the reference (at or after it when `or_equal` is set), then step
/// `offset - 1` records forward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySelector {
    pub key: Key,
    pub or_equal: bool,
    pub offset: i32
}


impl KeySelector {
    pub fn new(key: impl Into<Key>, or_equal: bool, offset: i32) -> Self {
        Self {
            key: key.into(),
            or_equal,
            offset
        }
    }

    /// The first key `>=` the reference.
    pub fn first_greater_or_equal(key: impl Into<Key>) -> Self {
        Self::new(key, true, 1)
    }

    /// The first key `>` the reference.
    pub fn first_greater_than(key: impl Into<Key>) -> Self {
        Self::new(key, false, 1)
    }

    /// The last key `<=` the reference.
    pub fn last_less_or_equal(key: impl Into<Key>) -> Self {
        Self::new(key, false, 0)
    }

    /// The last key `<` the reference.
    pub fn last_less_than(key: impl Into<Key>) -> Self {
        Self::new(key, true, 0)
    }
}


/// A half-open key range `[begin, end)` under the effective direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub begin: KeySelector,
    pub end: KeySelector
}


impl KeyRange {
    pub fn new(begin: KeySelector, end: KeySelector) -> Self {
        Self {
            begin,
            end
        }
    }

    /// All records with `begin_key <= key < end_key`.
    pub fn between(begin_key: impl Into<Key>, end_key: impl Into<Key>) -> Self {
        Self::new(
            KeySelector::first_greater_or_equal(begin_key),
            KeySelector::first_greater_or_equal(end_key)
        )
    }

    /// The whole user keyspace.
    pub fn all() -> Self {
        Self::between(Key::new(), Key::from_static(b"\xff"))
    }

    /// All records whose key starts with `prefix`.
    ///
    /// Fails when the prefix has no upper bound (all bytes 0xff).
    pub fn starts_with(prefix: impl Into<Key>) -> anyhow::Result<Self> {
        let prefix = prefix.into();
        let end = strinc(&prefix)?;
        Ok(Self::between(prefix, end))
    }
}


/// Hint to the backend shaping page-size adaptation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingMode {
    /// Start with small pages and grow them as the scan goes on.
    #[default]
    Iterator,
    Small,
    Medium,
    Large,
    /// One server round per page.
    Serial,
    /// Ask the backend for the whole range in one page.
    WantAll,
    /// No adaptive sizing; requires a record limit.
    Exact
}


/// Configuration recognized by the paged range reader.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RangeOptions {
    /// Maximum records to deliver from the range, 0 means unbounded.
    pub limit: u32,
    /// Soft cap on bytes per page, 0 means the backend default.
    pub target_bytes: u32,
    pub mode: StreamingMode,
    /// Deliver records in descending key order.
    pub reverse: bool
}


impl RangeOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_target_bytes(mut self, target_bytes: u32) -> Self {
        self.target_bytes = target_bytes;
        self
    }

    pub fn with_mode(mut self, mode: StreamingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_constructors_follow_the_wire_encoding() {
        let fge = KeySelector::first_greater_or_equal(b"k".as_slice());
        assert!(fge.or_equal);
        assert_eq!(fge.offset, 1);

        let fgt = KeySelector::first_greater_than(b"k".as_slice());
        assert!(!fgt.or_equal);
        assert_eq!(fgt.offset, 1);

        let lle = KeySelector::last_less_or_equal(b"k".as_slice());
        assert!(!lle.or_equal);
        assert_eq!(lle.offset, 0);

        let llt = KeySelector::last_less_than(b"k".as_slice());
        assert!(llt.or_equal);
        assert_eq!(llt.offset, 0);
    }

    #[test]
    fn starts_with_covers_exactly_the_prefix() {
        let range = KeyRange::starts_with(b"a/".as_slice()).unwrap();
        assert_eq!(range.begin.key.as_ref(), b"a/");
        assert_eq!(range.end.key.as_ref(), b"a0");
        assert!(KeyRange::starts_with(b"\xff".as_slice()).is_err());
    }
}
