use futures::future::BoxFuture;
use okv_primitives::{KeySelector, KeyValue, ReadVersion, StreamingMode};
use std::fmt::Debug;
use std::sync::Arc;


/// One backend range read.
///
/// `iteration` numbers the successive reads of a single range scan, starting
/// at 1; the backend uses it to shape adaptive page sizing and echoes it back
/// in the returned [`Page`].
#[derive(Clone, Debug)]
pub struct RangeRequest {
    pub begin: KeySelector,
    pub end: KeySelector,
    pub limit: u32,
    pub target_bytes: u32,
    pub mode: StreamingMode,
    pub iteration: u32,
    pub snapshot: bool,
    pub reverse: bool,
    pub read_version: ReadVersion
}


/// One batch of records returned by a single backend range read.
///
/// Records are strictly ordered in the effective direction. An empty batch
/// with `has_more = false` is the only legal terminal shape.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub records: Vec<KeyValue>,
    pub has_more: bool,
    pub iteration: u32,
    pub reversed: bool
}


/// The transport layer that actually issues range reads.
pub trait RangeTransport: Send + Sync + Debug {
    fn get_range(&self, req: RangeRequest) -> BoxFuture<'static, anyhow::Result<Page>>;
}


pub type TransportRef = Arc<dyn RangeTransport>;
