#[cfg(test)]
use crate::error::code;
use crate::error::BackendError;
use crate::{Page, RangeRequest, RangeTransport};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use okv_primitives::{KeySelector, KeyValue, StreamingMode};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};


const DEFAULT_TARGET_BYTES: usize = 65536;


/// In-memory reference implementation of the transport contract.
///
/// Resolves key selectors against an ordered map and serves paged range
/// reads with the same shape a remote store would: per-mode page sizing,
/// `has_more` continuation and selector arithmetic. Read counters make
/// scan traffic and in-flight requests observable to tests.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>
}


#[derive(Default)]
struct Inner {
    data: Mutex<BTreeMap<Bytes, Bytes>>,
    range_reads: AtomicUsize,
    pending_reads: AtomicUsize,
    fail_after: Mutex<Option<FailAfter>>
}


#[derive(Clone, Copy)]
struct FailAfter {
    reads: usize,
    code: u32
}


impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Bytes>,
        V: Into<Bytes>
    {
        let transport = Self::new();
        for (key, value) in records {
            transport.insert(key, value);
        }
        transport
    }

    pub fn insert(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.inner.data.lock().insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.inner.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of range reads issued so far.
    pub fn range_reads(&self) -> usize {
        self.inner.range_reads.load(Ordering::SeqCst)
    }

    /// Number of reads currently in flight (issued, not yet resolved).
    pub fn pending_reads(&self) -> usize {
        self.inner.pending_reads.load(Ordering::SeqCst)
    }

    /// Make every read after the first `reads` fail with `code`.
    pub fn fail_after_reads(&self, reads: usize, code: u32) {
        *self.inner.fail_after.lock() = Some(FailAfter {
            reads,
            code
        });
    }
}


impl Debug for MemoryTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("records", &self.len())
            .field("range_reads", &self.range_reads())
            .finish()
    }
}


impl RangeTransport for MemoryTransport {
    fn get_range(&self, req: RangeRequest) -> BoxFuture<'static, anyhow::Result<Page>> {
        let inner = self.inner.clone();
        async move {
            let _pending = PendingRead::start(&inner);
            YieldOnce::new().await;

            let reads = inner.range_reads.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(fail) = *inner.fail_after.lock() {
                if reads > fail.reads {
                    return Err(BackendError::new(fail.code, "injected backend failure").into());
                }
            }

            Ok(read_page(&inner.data.lock(), &req))
        }
        .boxed()
    }
}


fn read_page(data: &BTreeMap<Bytes, Bytes>, req: &RangeRequest) -> Page {
    let keys: Vec<&Bytes> = data.keys().collect();
    let len = keys.len() as isize;
    let begin = resolve(&keys, &req.begin).clamp(0, len) as usize;
    let end = resolve(&keys, &req.end).clamp(0, len) as usize;

    let mut records = Vec::new();
    let mut more_in_range = false;

    if begin < end {
        let record_cap = record_cap(req);
        let byte_cap = byte_cap(req);
        let mut bytes = 0;

        let mut push = |key: &Bytes| {
            let value = &data[key];
            bytes += key.len() + value.len();
            records.push(KeyValue::new(key.clone(), value.clone()));
            records.len() < record_cap && bytes < byte_cap
        };

        if req.reverse {
            for i in (begin..end).rev() {
                if !push(keys[i]) {
                    more_in_range = i > begin;
                    break;
                }
            }
        } else {
            for i in begin..end {
                if !push(keys[i]) {
                    more_in_range = i + 1 < end;
                    break;
                }
            }
        }
    }

    Page {
        records,
        has_more: more_in_range,
        iteration: req.iteration,
        reversed: req.reverse
    }
}


/// Resolve a selector to a record index; may land before the first
/// record (negative) or past the last one.
fn resolve(keys: &[&Bytes], sel: &KeySelector) -> isize {
    let base = keys.partition_point(|k| {
        if sel.or_equal {
            k.as_ref() < sel.key.as_ref()
        } else {
            k.as_ref() <= sel.key.as_ref()
        }
    });
    base as isize + sel.offset as isize - 1
}


fn record_cap(req: &RangeRequest) -> usize {
    let cap = match req.mode {
        StreamingMode::Iterator => 256usize << (req.iteration.clamp(1, 6) - 1),
        StreamingMode::Small => 256,
        StreamingMode::Medium => 1024,
        StreamingMode::Large => 4096,
        StreamingMode::Serial => 8192,
        StreamingMode::WantAll | StreamingMode::Exact => usize::MAX
    };
    if req.limit > 0 {
        cap.min(req.limit as usize)
    } else {
        cap
    }
}


fn byte_cap(req: &RangeRequest) -> usize {
    if req.target_bytes > 0 {
        req.target_bytes as usize
    } else if req.mode == StreamingMode::WantAll {
        usize::MAX
    } else {
        DEFAULT_TARGET_BYTES
    }
}


struct PendingRead<'a> {
    inner: &'a Inner
}


impl<'a> PendingRead<'a> {
    fn start(inner: &'a Inner) -> Self {
        inner.pending_reads.fetch_add(1, Ordering::SeqCst);
        Self {
            inner
        }
    }
}


impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        self.inner.pending_reads.fetch_sub(1, Ordering::SeqCst);
    }
}


/// Suspends exactly once, so that page futures go through a genuine
/// pending state even though the store is local.
struct YieldOnce {
    yielded: bool
}


impl YieldOnce {
    fn new() -> Self {
        Self {
            yielded: false
        }
    }
}


impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
