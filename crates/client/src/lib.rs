use anyhow::{ensure, Result};
use okv_transport::error::ContractViolation;
use std::cmp::Ordering;


mod cursor;
mod merge;
mod pipeline;
mod range_read;
mod set_algebra;
mod tx;


pub use cursor::{Advance, AsyncCursor, BoxCursor, Step};
pub use pipeline::{Collect, CursorExt, DistinctBy, Filter, Map, Skip, Take};
pub use range_read::RangeReader;
pub use set_algebra::{SetAlgebraCursor, SetOp};
pub use tx::{
    MutationType, Transaction, DEFAULT_MAX_TRANSACTION_SIZE, MAX_KEY_SIZE, MAX_VALUE_SIZE
};

pub use okv_primitives::{
    key_after, strinc, Key, KeyRange, KeySelector, KeyValue, RangeOptions, ReadVersion,
    StreamingMode, UnboundedPrefix, Value
};
pub use okv_transport::{error, MemoryTransport, Page, RangeRequest, RangeTransport, TransportRef};


/// The set-algebra cursor produced by the range-based operators:
/// ordered by raw key bytes, emitting whole records.
pub type RecordSetCursor = SetAlgebraCursor<
    RangeReader,
    Key,
    KeyValue,
    fn(&KeyValue) -> Key,
    fn(&KeyValue) -> KeyValue,
    fn(&Key, &Key) -> Ordering
>;


/// Stable ordered merge of several ranges; duplicate keys all surface.
pub fn merge_sort(
    tx: &Transaction,
    ranges: Vec<KeyRange>,
    options: RangeOptions
) -> Result<RecordSetCursor>
{
    over_ranges(SetOp::MergeSort, tx, ranges, options)
}


/// Ordered union of several ranges; duplicate keys collapse to the
/// record of the earliest input.
pub fn union(
    tx: &Transaction,
    ranges: Vec<KeyRange>,
    options: RangeOptions
) -> Result<RecordSetCursor>
{
    over_ranges(SetOp::Union, tx, ranges, options)
}


/// Keys present in every range, in order; records come from the first.
pub fn intersect(
    tx: &Transaction,
    ranges: Vec<KeyRange>,
    options: RangeOptions
) -> Result<RecordSetCursor>
{
    over_ranges(SetOp::Intersect, tx, ranges, options)
}


/// Records of the first range whose key appears in none of the others.
pub fn except(
    tx: &Transaction,
    ranges: Vec<KeyRange>,
    options: RangeOptions
) -> Result<RecordSetCursor>
{
    over_ranges(SetOp::Except, tx, ranges, options)
}


fn over_ranges(
    op: SetOp,
    tx: &Transaction,
    ranges: Vec<KeyRange>,
    options: RangeOptions
) -> Result<RecordSetCursor>
{
    ensure!(
        !ranges.is_empty(),
        ContractViolation::new("set operation requires at least one input range")
    );
    let inputs = ranges
        .into_iter()
        .map(|range| tx.read_range(range, options.clone()))
        .collect::<Result<Vec<_>>>()?;
    SetAlgebraCursor::new(
        op,
        inputs,
        record_key as fn(&KeyValue) -> Key,
        clone_record as fn(&KeyValue) -> KeyValue,
        compare_keys as fn(&Key, &Key) -> Ordering
    )
}


/// [`merge_sort`] over arbitrary cursors with a caller-supplied key
/// projection and comparator. For a projected output, build a
/// [`SetAlgebraCursor`] directly and pass a `result_fn`.
pub fn merge_sort_cursors<C, K, KF, CMP>(
    inputs: Vec<C>,
    key_fn: KF,
    cmp: CMP
) -> Result<SetAlgebraCursor<C, K, C::Item, KF, fn(&C::Item) -> C::Item, CMP>>
where
    C: AsyncCursor,
    C::Item: Clone,
    K: Clone,
    KF: Fn(&C::Item) -> K,
    CMP: Fn(&K, &K) -> Ordering
{
    SetAlgebraCursor::new(SetOp::MergeSort, inputs, key_fn, clone_item as fn(&C::Item) -> C::Item, cmp)
}


/// [`union`] over arbitrary cursors.
pub fn union_cursors<C, K, KF, CMP>(
    inputs: Vec<C>,
    key_fn: KF,
    cmp: CMP
) -> Result<SetAlgebraCursor<C, K, C::Item, KF, fn(&C::Item) -> C::Item, CMP>>
where
    C: AsyncCursor,
    C::Item: Clone,
    K: Clone,
    KF: Fn(&C::Item) -> K,
    CMP: Fn(&K, &K) -> Ordering
{
    SetAlgebraCursor::new(SetOp::Union, inputs, key_fn, clone_item as fn(&C::Item) -> C::Item, cmp)
}


/// [`intersect`] over arbitrary cursors.
pub fn intersect_cursors<C, K, KF, CMP>(
    inputs: Vec<C>,
    key_fn: KF,
    cmp: CMP
) -> Result<SetAlgebraCursor<C, K, C::Item, KF, fn(&C::Item) -> C::Item, CMP>>
where
    C: AsyncCursor,
    C::Item: Clone,
    K: Clone,
    KF: Fn(&C::Item) -> K,
    CMP: Fn(&K, &K) -> Ordering
{
    SetAlgebraCursor::new(SetOp::Intersect, inputs, key_fn, clone_item as fn(&C::Item) -> C::Item, cmp)
}


/// [`except`] over arbitrary cursors; input 0 is the positive side.
pub fn except_cursors<C, K, KF, CMP>(
    inputs: Vec<C>,
    key_fn: KF,
    cmp: CMP
) -> Result<SetAlgebraCursor<C, K, C::Item, KF, fn(&C::Item) -> C::Item, CMP>>
where
    C: AsyncCursor,
    C::Item: Clone,
    K: Clone,
    KF: Fn(&C::Item) -> K,
    CMP: Fn(&K, &K) -> Ordering
{
    SetAlgebraCursor::new(SetOp::Except, inputs, key_fn, clone_item as fn(&C::Item) -> C::Item, cmp)
}


fn record_key(record: &KeyValue) -> Key {
    record.key.clone()
}


fn clone_record(record: &KeyValue) -> KeyValue {
    record.clone()
}


fn compare_keys(a: &Key, b: &Key) -> Ordering {
    a.cmp(b)
}


fn clone_item<T: Clone>(item: &T) -> T {
    item.clone()
}
