use bytes::Bytes;
use serde::{Deserialize, Serialize};


mod key;
mod selector;


pub use key::{key_after, strinc, UnboundedPrefix};
pub use selector::{KeyRange, KeySelector, RangeOptions, StreamingMode};


pub type Key = Bytes;

pub type Value = Bytes;

pub type ReadVersion = u64;


/// A single record of the store. Only the key participates in ordering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Key,
    pub value: Value
}


impl KeyValue {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into()
        }
    }

    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}
