use anyhow::Result;
use okv_client::error::{error_kind, ErrorKind};
use okv_client::{
    AsyncCursor, CursorExt, KeyRange, KeySelector, MemoryTransport, RangeOptions, Step,
    StreamingMode, Transaction
};
use std::sync::Arc;


fn store(records: &[(&'static str, &'static str)]) -> (MemoryTransport, Transaction) {
    let transport = MemoryTransport::with_records(records.iter().copied());
    let tx = Transaction::new(Arc::new(transport.clone()), 1);
    (transport, tx)
}


fn alphabet() -> [(&'static str, &'static str); 5] {
    [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")]
}


fn keys(records: &[okv_client::KeyValue]) -> Vec<&str> {
    records
        .iter()
        .map(|kv| std::str::from_utf8(&kv.key).unwrap())
        .collect()
}


#[tokio::test]
async fn pages_stream_in_order_across_refetches() -> Result<()> {
    let (transport, tx) = store(&alphabet());
    let options = RangeOptions::default().with_target_bytes(1);

    let records = tx.read_range(KeyRange::all(), options)?.collect().await?;

    assert_eq!(keys(&records), vec!["a", "b", "c", "d", "e"]);
    // one record per page at this byte target
    assert_eq!(transport.range_reads(), 5);
    Ok(())
}


#[tokio::test]
async fn limit_caps_the_stream_without_overshooting() -> Result<()> {
    let (transport, tx) = store(&alphabet());
    let options = RangeOptions::default().with_limit(3);

    let records = tx.read_range(KeyRange::all(), options)?.collect().await?;

    assert_eq!(keys(&records), vec!["a", "b", "c"]);
    assert_eq!(transport.range_reads(), 1);
    Ok(())
}


#[tokio::test]
async fn reverse_steps_backwards_through_the_range() -> Result<()> {
    let (_, tx) = store(&alphabet());
    let options = RangeOptions::default().reversed().with_target_bytes(1);

    let records = tx.read_range(KeyRange::all(), options)?.collect().await?;
    assert_eq!(keys(&records), vec!["e", "d", "c", "b", "a"]);

    let options = RangeOptions::default().reversed().with_limit(2);
    let records = tx.read_range(KeyRange::all(), options)?.collect().await?;
    assert_eq!(keys(&records), vec!["e", "d"]);
    Ok(())
}


#[tokio::test]
async fn selectors_shape_the_scanned_window() -> Result<()> {
    let (_, tx) = store(&alphabet());
    let range = KeyRange::new(
        KeySelector::first_greater_than("b"),
        KeySelector::first_greater_or_equal("e")
    );

    let records = tx.read_range(range, RangeOptions::default())?.collect().await?;
    assert_eq!(keys(&records), vec!["c", "d"]);
    Ok(())
}


#[tokio::test]
async fn want_all_asks_for_a_single_page() -> Result<()> {
    let records: Vec<(String, String)> = (0..300)
        .map(|i| (format!("k{:03}", i), format!("v{}", i)))
        .collect();

    let transport = MemoryTransport::with_records(records.clone());
    let tx = Transaction::new(Arc::new(transport.clone()), 1);
    let options = RangeOptions::default().with_mode(StreamingMode::WantAll);
    let fetched = tx.read_range(KeyRange::all(), options)?.collect().await?;
    assert_eq!(fetched.len(), 300);
    assert_eq!(transport.range_reads(), 1);

    // iterator mode grows pages instead
    let transport = MemoryTransport::with_records(records);
    let tx = Transaction::new(Arc::new(transport.clone()), 1);
    let fetched = tx
        .read_range(KeyRange::all(), RangeOptions::default())?
        .collect()
        .await?;
    assert_eq!(fetched.len(), 300);
    assert_eq!(transport.range_reads(), 2);
    Ok(())
}


#[tokio::test]
async fn empty_range_is_terminal() -> Result<()> {
    let (transport, tx) = store(&alphabet());

    let mut reader = tx.read_range(KeyRange::between("x", "z"), RangeOptions::default())?;
    assert_eq!(reader.advance().await?, Step::End);
    assert_eq!(reader.advance().await?, Step::End);
    assert_eq!(transport.range_reads(), 1);
    Ok(())
}


#[tokio::test]
async fn exact_mode_requires_a_limit() -> Result<()> {
    let (transport, tx) = store(&alphabet());

    let options = RangeOptions::default().with_mode(StreamingMode::Exact);
    let err = tx.read_range(KeyRange::all(), options).unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Contract);

    let options = RangeOptions::default().with_mode(StreamingMode::Exact).with_limit(4);
    let records = tx.read_range(KeyRange::all(), options)?.collect().await?;
    assert_eq!(keys(&records), vec!["a", "b", "c", "d"]);
    assert_eq!(transport.range_reads(), 1);
    Ok(())
}


#[tokio::test]
async fn snapshot_reads_serve_the_same_records() -> Result<()> {
    let (_, tx) = store(&alphabet());

    let plain = tx
        .read_range(KeyRange::all(), RangeOptions::default())?
        .collect()
        .await?;
    let snapshot = tx
        .snapshot_read_range(KeyRange::all(), RangeOptions::default())?
        .collect()
        .await?;
    assert_eq!(plain, snapshot);
    Ok(())
}


#[tokio::test]
async fn backend_faults_are_sticky() -> Result<()> {
    let (transport, tx) = store(&alphabet());
    transport.fail_after_reads(1, okv_client::error::code::BROKEN_PROMISE);

    let options = RangeOptions::default().with_target_bytes(1);
    let mut reader = tx.read_range(KeyRange::all(), options)?;

    assert_eq!(reader.advance().await?, Step::Advanced);
    let err = reader.advance().await.unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Transport);

    let err = reader.advance().await.unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Transport);
    assert_eq!(transport.range_reads(), 2);
    Ok(())
}


#[tokio::test]
async fn advancing_a_disposed_reader_is_a_contract_error() -> Result<()> {
    let (_, tx) = store(&alphabet());
    let mut reader = tx.read_range(KeyRange::all(), RangeOptions::default())?;

    assert_eq!(reader.advance().await?, Step::Advanced);
    reader.dispose();
    reader.dispose();

    let err = reader.advance().await.unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Contract);
    Ok(())
}


#[tokio::test]
async fn cancelled_transaction_refuses_new_readers() -> Result<()> {
    let (_, tx) = store(&alphabet());
    tx.cancel();

    let err = tx.read_range(KeyRange::all(), RangeOptions::default()).unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Cancelled);
    Ok(())
}
