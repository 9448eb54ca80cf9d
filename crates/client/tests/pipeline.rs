use anyhow::Result;
use okv_client::{
    union, CursorExt, KeyRange, KeyValue, MemoryTransport, RangeOptions, Transaction
};
use std::sync::Arc;


fn store(records: &[(&'static str, &'static str)]) -> (MemoryTransport, Transaction) {
    let transport = MemoryTransport::with_records(records.iter().copied());
    let tx = Transaction::new(Arc::new(transport.clone()), 1);
    (transport, tx)
}


fn utf8(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap()
}


#[tokio::test]
async fn take_yields_at_most_the_requested_records() -> Result<()> {
    let (_, tx) = store(&[("a", "1"), ("b", "2"), ("c", "3")]);

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    assert_eq!(scan.take(2).collect().await?.len(), 2);

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    assert_eq!(scan.take(10).collect().await?.len(), 3);
    Ok(())
}


#[tokio::test]
async fn skip_and_take_cut_a_window() -> Result<()> {
    let (_, tx) = store(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")]);

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    let window = scan.skip(1).take(2).collect().await?;
    let keys: Vec<&str> = window.iter().map(|kv| utf8(&kv.key)).collect();
    assert_eq!(keys, vec!["b", "c"]);
    Ok(())
}


#[tokio::test]
async fn map_and_filter_compose_without_materializing() -> Result<()> {
    let (_, tx) = store(&[("a", "10"), ("b", "20"), ("c", "30"), ("d", "40")]);

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    let values = scan
        .filter(|kv: &KeyValue| kv.key.as_ref() != b"b")
        .map(|kv| utf8(&kv.value).to_string())
        .collect()
        .await?;

    assert_eq!(values, vec!["10", "30", "40"]);
    Ok(())
}


#[tokio::test]
async fn distinct_by_collapses_runs_of_equal_projections() -> Result<()> {
    let (_, tx) = store(&[("a", "x"), ("b", "x"), ("c", "y"), ("d", "y"), ("e", "z")]);

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    let records = scan.distinct_by(|kv: &KeyValue| kv.value.clone()).collect().await?;
    let keys: Vec<&str> = records.iter().map(|kv| utf8(&kv.key)).collect();
    assert_eq!(keys, vec!["a", "c", "e"]);
    Ok(())
}


#[tokio::test]
async fn union_of_one_stream_equals_its_key_distinct_scan() -> Result<()> {
    let (_, tx) = store(&[("a", "1"), ("b", "2"), ("c", "3")]);

    let merged = union(&tx, vec![KeyRange::all()], RangeOptions::default())?
        .collect()
        .await?;

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    let distinct = scan.distinct_by(|kv: &KeyValue| kv.key.clone()).collect().await?;

    assert_eq!(merged, distinct);
    Ok(())
}


#[tokio::test]
async fn take_releases_the_scan_early() -> Result<()> {
    let records: Vec<(String, String)> = (0..50)
        .map(|i| (format!("k{:02}", i), format!("v{}", i)))
        .collect();
    let transport = MemoryTransport::with_records(records);
    let tx = Transaction::new(Arc::new(transport.clone()), 1);

    let scan = tx.read_range(KeyRange::all(), RangeOptions::default())?;
    let taken = scan.take(3).collect().await?;

    assert_eq!(taken.len(), 3);
    assert_eq!(transport.range_reads(), 1);
    assert_eq!(transport.pending_reads(), 0);
    Ok(())
}
