use crate::Key;
use anyhow::{bail, Result};
use bytes::{BufMut, BytesMut};
use std::fmt::{Display, Formatter};


/// A prefix of 0xff bytes has no key ordered after all its extensions.
#[derive(Clone, Copy, Debug)]
pub struct UnboundedPrefix;


impl Display for UnboundedPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "prefix of 0xff bytes has no upper bound")
    }
}


impl std::error::Error for UnboundedPrefix {}


/// The immediate successor of `key`: the smallest key ordered after it.
pub fn key_after(key: &[u8]) -> Key {
    let mut out = BytesMut::with_capacity(key.len() + 1);
    out.put_slice(key);
    out.put_u8(0);
    out.freeze()
}


/// The first key that is not prefixed by `prefix`.
///
/// Increments the last byte that is not 0xff and truncates the rest.
/// Fails with [`UnboundedPrefix`] when every byte is 0xff (no such key
/// exists).
pub fn strinc(prefix: &[u8]) -> Result<Key> {
    let Some(end) = prefix.iter().rposition(|b| *b != 0xff) else {
        bail!(UnboundedPrefix)
    };
    let mut out = BytesMut::with_capacity(end + 1);
    out.put_slice(&prefix[..end]);
    out.put_u8(prefix[end] + 1);
    Ok(out.freeze())
}
