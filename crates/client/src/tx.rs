use crate::range_read::RangeReader;
use anyhow::{ensure, Result};
use okv_primitives::{KeyRange, RangeOptions, ReadVersion};
use okv_transport::error::{code, BackendError, Cancelled};
use okv_transport::TransportRef;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;


pub const MAX_KEY_SIZE: usize = 10_000;

pub const MAX_VALUE_SIZE: usize = 100_000;

pub const DEFAULT_MAX_TRANSACTION_SIZE: usize = 10_000_000;


/// Atomic read-modify-write operations recognized by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationType {
    Add,
    Max,
    Min,
    BitAnd,
    BitOr,
    BitXor
}


/// A read snapshot over the store plus the ambient cancellation signal.
///
/// The transaction is shared read-only by the cursors it spawns. Write
/// operations never reach the backend from here; they only accumulate the
/// payload estimate the store will account against the transaction at
/// commit time, and enforce the input limits early. Reads stay legal
/// while the write load grows.
#[derive(Debug)]
pub struct Transaction {
    transport: TransportRef,
    read_version: ReadVersion,
    token: CancellationToken,
    write_load: Mutex<WriteLoad>
}


#[derive(Debug)]
struct WriteLoad {
    estimate: usize,
    max_size: usize
}


impl Transaction {
    pub fn new(transport: TransportRef, read_version: ReadVersion) -> Self {
        Self {
            transport,
            read_version,
            token: CancellationToken::new(),
            write_load: Mutex::new(WriteLoad {
                estimate: 0,
                max_size: DEFAULT_MAX_TRANSACTION_SIZE
            })
        }
    }

    pub fn with_max_size(self, max_size: usize) -> Self {
        self.write_load.lock().max_size = max_size;
        self
    }

    pub fn read_version(&self) -> ReadVersion {
        self.read_version
    }

    pub fn transport(&self) -> &TransportRef {
        &self.transport
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fire the ambient cancellation signal. Every cursor spawned from
    /// this transaction resolves promptly with a `Cancelled` fault.
    pub fn cancel(&self) {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Precondition of every read entry point.
    pub fn ensure_readable(&self) -> Result<()> {
        ensure!(!self.token.is_cancelled(), Cancelled);
        Ok(())
    }

    /// Open a cursor over `range`.
    pub fn read_range(&self, range: KeyRange, options: RangeOptions) -> Result<RangeReader> {
        RangeReader::new(self, range, options, false)
    }

    /// Open a cursor over `range` without adding a read-conflict range.
    pub fn snapshot_read_range(&self, range: KeyRange, options: RangeOptions) -> Result<RangeReader> {
        RangeReader::new(self, range, options, true)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        check_value(value)?;
        self.grow(key.len() + value.len() + 28)
    }

    pub fn clear(&self, key: &[u8]) -> Result<()> {
        check_key(key)?;
        self.grow(2 * key.len() + 29)
    }

    pub fn clear_range(&self, begin: &[u8], end: &[u8]) -> Result<()> {
        check_key(begin)?;
        check_key(end)?;
        self.grow(begin.len() + end.len() + 28)
    }

    pub fn atomic_op(&self, key: &[u8], param: &[u8], _mutation: MutationType) -> Result<()> {
        check_key(key)?;
        self.grow(key.len() + param.len())
    }

    /// Estimated payload the store will account for this transaction.
    pub fn size_estimate(&self) -> usize {
        self.write_load.lock().estimate
    }

    fn grow(&self, bytes: usize) -> Result<()> {
        let mut load = self.write_load.lock();
        load.estimate += bytes;
        ensure!(
            load.estimate <= load.max_size,
            BackendError::new(
                code::TRANSACTION_TOO_LARGE,
                format!(
                    "transaction payload estimate {} exceeds the {} byte limit",
                    load.estimate, load.max_size
                )
            )
        );
        Ok(())
    }
}


fn check_key(key: &[u8]) -> Result<()> {
    ensure!(
        key.len() <= MAX_KEY_SIZE,
        BackendError::new(
            code::KEY_TOO_LARGE,
            format!("key of {} bytes exceeds the {} byte limit", key.len(), MAX_KEY_SIZE)
        )
    );
    Ok(())
}


fn check_value(value: &[u8]) -> Result<()> {
    ensure!(
        value.len() <= MAX_VALUE_SIZE,
        BackendError::new(
            code::VALUE_TOO_LARGE,
            format!(
                "value of {} bytes exceeds the {} byte limit",
                value.len(),
                MAX_VALUE_SIZE
            )
        )
    );
    Ok(())
}
