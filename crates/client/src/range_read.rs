use crate::cursor::{AsyncCursor, Step};
use crate::tx::Transaction;
use anyhow::{ensure, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use okv_primitives::{KeyRange, KeySelector, KeyValue, RangeOptions, ReadVersion, StreamingMode};
use okv_transport::error::{error_kind, Cancelled, ContractViolation, CursorFaulted, ErrorKind};
use okv_transport::{Page, RangeRequest, TransportRef};
use std::collections::VecDeque;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::debug;


/// Drives the paged range-read protocol against one key range and serves
/// the fetched records one by one, in order.
///
/// Pages are pulled on demand: a fetch is issued only when the buffer is
/// empty and the previous page announced a continuation. The ambient
/// cancellation token is observed before each fetch and races every
/// in-flight one.
pub struct RangeReader {
    transport: TransportRef,
    token: CancellationToken,
    read_version: ReadVersion,
    snapshot: bool,
    begin: KeySelector,
    end: KeySelector,
    options: RangeOptions,
    remaining: Option<u32>,
    iteration: u32,
    current: Option<KeyValue>,
    state: ReaderState
}


impl std::fmt::Debug for RangeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeReader").finish_non_exhaustive()
    }
}


enum ReaderState {
    Start,
    Fetching(BoxFuture<'static, Result<Page>>),
    Buffered {
        records: VecDeque<KeyValue>,
        has_more: bool
    },
    Exhausted,
    Faulted(ErrorKind),
    Disposed
}


impl RangeReader {
    pub fn new(
        tx: &Transaction,
        range: KeyRange,
        options: RangeOptions,
        snapshot: bool
    ) -> Result<Self>
    {
        tx.ensure_readable()?;
        ensure!(
            options.mode != StreamingMode::Exact || options.limit > 0,
            ContractViolation::new("exact streaming mode requires a record limit")
        );
        Ok(Self {
            transport: tx.transport().clone(),
            token: tx.cancellation_token().clone(),
            read_version: tx.read_version(),
            snapshot,
            begin: range.begin,
            end: range.end,
            remaining: (options.limit > 0).then_some(options.limit),
            options,
            iteration: 0,
            current: None,
            state: ReaderState::Start
        })
    }

    fn next_request(&self) -> RangeRequest {
        RangeRequest {
            begin: self.begin.clone(),
            end: self.end.clone(),
            limit: self.remaining.unwrap_or(0),
            target_bytes: self.options.target_bytes,
            mode: self.options.mode,
            iteration: self.iteration,
            snapshot: self.snapshot,
            reverse: self.options.reverse,
            read_version: self.read_version
        }
    }
}


impl AsyncCursor for RangeReader {
    type Item = KeyValue;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        loop {
            match &mut self.state {
                ReaderState::Start => {
                    if self.token.is_cancelled() {
                        self.current = None;
                        self.state = ReaderState::Faulted(ErrorKind::Cancelled);
                        return Poll::Ready(Err(Cancelled.into()));
                    }
                    self.iteration += 1;
                    let req = self.next_request();
                    let transport = self.transport.clone();
                    let token = self.token.clone();
                    let future = async move {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => Err(Cancelled.into()),
                            page = transport.get_range(req) => page,
                        }
                    }
                    .boxed();
                    self.state = ReaderState::Fetching(future);
                }
                ReaderState::Fetching(future) => match future.poll_unpin(cx) {
                    Poll::Ready(Ok(page)) => {
                        debug_assert_eq!(page.iteration, self.iteration);
                        debug!(
                            iteration = page.iteration,
                            records = page.records.len(),
                            has_more = page.has_more,
                            "fetched range page"
                        );
                        if page.records.is_empty() && !page.has_more {
                            self.state = ReaderState::Exhausted;
                        } else {
                            let mut records: VecDeque<_> = page.records.into();
                            if let Some(remaining) = self.remaining {
                                records.truncate(remaining as usize);
                            }
                            self.state = ReaderState::Buffered {
                                records,
                                has_more: page.has_more
                            };
                        }
                    }
                    Poll::Ready(Err(err)) => {
                        self.current = None;
                        self.state = ReaderState::Faulted(error_kind(&err));
                        return Poll::Ready(Err(err.context("range read failed")));
                    }
                    Poll::Pending => return Poll::Pending
                },
                ReaderState::Buffered { records, has_more } => {
                    if let Some(record) = records.pop_front() {
                        if self.options.reverse {
                            self.end = KeySelector::first_greater_or_equal(record.key.clone());
                        } else {
                            self.begin = KeySelector::first_greater_than(record.key.clone());
                        }
                        if let Some(remaining) = self.remaining.as_mut() {
                            *remaining -= 1;
                        }
                        self.current = Some(record);
                        return Poll::Ready(Ok(Step::Advanced));
                    }
                    if *has_more && self.remaining != Some(0) {
                        self.state = ReaderState::Start;
                    } else {
                        self.current = None;
                        self.state = ReaderState::Exhausted;
                        return Poll::Ready(Ok(Step::End));
                    }
                }
                ReaderState::Exhausted => return Poll::Ready(Ok(Step::End)),
                ReaderState::Faulted(kind) => {
                    let fault = CursorFaulted {
                        kind: *kind
                    };
                    return Poll::Ready(Err(fault.into()));
                }
                ReaderState::Disposed => {
                    let violation = ContractViolation::new("advance on a disposed cursor");
                    return Poll::Ready(Err(violation.into()));
                }
            }
        }
    }

    fn current(&self) -> &KeyValue {
        self.current.as_ref().expect("range cursor has no current record")
    }

    fn dispose(&mut self) {
        self.current = None;
        self.state = ReaderState::Disposed;
    }
}
