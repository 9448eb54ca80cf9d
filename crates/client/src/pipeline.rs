use crate::cursor::{AsyncCursor, Step};
use anyhow::Result;
use okv_transport::error::{error_kind, CursorFaulted, ErrorKind};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};


/// Lazy operators over any cursor. Each adapter is itself a cursor, so
/// operators compose without materializing intermediate collections, and
/// each one releases its upstream as soon as the stream terminates.
pub trait CursorExt: AsyncCursor + Sized {
    fn map<F, T>(self, map: F) -> Map<Self, F, T>
    where
        F: FnMut(&Self::Item) -> T
    {
        Map {
            inner: Fused::new(self),
            map,
            current: None
        }
    }

    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: FnMut(&Self::Item) -> bool
    {
        Filter {
            inner: Fused::new(self),
            predicate
        }
    }

    fn take(self, count: usize) -> Take<Self> {
        Take {
            inner: Fused::new(self),
            remaining: count
        }
    }

    fn skip(self, count: usize) -> Skip<Self> {
        Skip {
            inner: Fused::new(self),
            remaining: count
        }
    }

    /// Collapse runs of records with an equal projected key. On an
    /// ordered stream this removes all duplicates.
    fn distinct_by<F, K>(self, key_fn: F) -> DistinctBy<Self, F, K>
    where
        F: FnMut(&Self::Item) -> K,
        K: PartialEq
    {
        DistinctBy {
            inner: Fused::new(self),
            key_fn,
            last: None
        }
    }

    /// Drain the cursor into a vector. The only materializing sink; the
    /// cursor is released when the drain ends, successfully or not.
    fn collect(self) -> Collect<Self>
    where
        Self::Item: Clone
    {
        Collect {
            cursor: self,
            records: Vec::new()
        }
    }
}


impl<C: AsyncCursor> CursorExt for C {}


/// Future returned by [`CursorExt::collect`].
pub struct Collect<C: AsyncCursor> {
    cursor: C,
    records: Vec<C::Item>
}


impl<C> Future for Collect<C>
where
    C: AsyncCursor + Unpin,
    C::Item: Clone + Unpin
{
    type Output = Result<Vec<C::Item>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match this.cursor.poll_advance(cx) {
                Poll::Ready(Ok(Step::Advanced)) => {
                    this.records.push(this.cursor.current().clone());
                }
                Poll::Ready(Ok(Step::End)) => {
                    this.cursor.dispose();
                    return Poll::Ready(Ok(std::mem::take(&mut this.records)));
                }
                Poll::Ready(Err(err)) => {
                    this.cursor.dispose();
                    return Poll::Ready(Err(err));
                }
                Poll::Pending => return Poll::Pending
            }
        }
    }
}


/// Upstream wrapper shared by the adapters: disposes the upstream on
/// termination and keeps the terminal status sticky afterwards.
struct Fused<C> {
    inner: C,
    state: FuseState
}


enum FuseState {
    Active,
    Done,
    Faulted(ErrorKind)
}


impl<C: AsyncCursor> Fused<C> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            state: FuseState::Active
        }
    }

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        match self.state {
            FuseState::Active => {}
            FuseState::Done => return Poll::Ready(Ok(Step::End)),
            FuseState::Faulted(kind) => {
                let fault = CursorFaulted {
                    kind
                };
                return Poll::Ready(Err(fault.into()));
            }
        }
        match self.inner.poll_advance(cx) {
            Poll::Ready(Ok(Step::End)) => {
                self.state = FuseState::Done;
                self.inner.dispose();
                Poll::Ready(Ok(Step::End))
            }
            Poll::Ready(Err(err)) => {
                self.state = FuseState::Faulted(error_kind(&err));
                self.inner.dispose();
                Poll::Ready(Err(err))
            }
            other => other
        }
    }

    fn current(&self) -> &C::Item {
        self.inner.current()
    }

    fn dispose(&mut self) {
        self.state = FuseState::Done;
        self.inner.dispose();
    }
}


pub struct Map<C, F, T> {
    inner: Fused<C>,
    map: F,
    current: Option<T>
}


impl<C, F, T> AsyncCursor for Map<C, F, T>
where
    C: AsyncCursor,
    F: FnMut(&C::Item) -> T
{
    type Item = T;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        match self.inner.poll_advance(cx) {
            Poll::Ready(Ok(Step::Advanced)) => {
                self.current = Some((self.map)(self.inner.current()));
                Poll::Ready(Ok(Step::Advanced))
            }
            Poll::Ready(Ok(Step::End)) => {
                self.current = None;
                Poll::Ready(Ok(Step::End))
            }
            Poll::Ready(Err(err)) => {
                self.current = None;
                Poll::Ready(Err(err))
            }
            Poll::Pending => Poll::Pending
        }
    }

    fn current(&self) -> &T {
        self.current.as_ref().expect("cursor has no current record")
    }

    fn dispose(&mut self) {
        self.current = None;
        self.inner.dispose();
    }
}


pub struct Filter<C, P> {
    inner: Fused<C>,
    predicate: P
}


impl<C, P> AsyncCursor for Filter<C, P>
where
    C: AsyncCursor,
    P: FnMut(&C::Item) -> bool
{
    type Item = C::Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        loop {
            match self.inner.poll_advance(cx) {
                Poll::Ready(Ok(Step::Advanced)) => {
                    if (self.predicate)(self.inner.current()) {
                        return Poll::Ready(Ok(Step::Advanced));
                    }
                }
                other => return other
            }
        }
    }

    fn current(&self) -> &C::Item {
        self.inner.current()
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}


pub struct Take<C> {
    inner: Fused<C>,
    remaining: usize
}


impl<C: AsyncCursor> AsyncCursor for Take<C> {
    type Item = C::Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        if self.remaining == 0 {
            self.inner.dispose();
            return Poll::Ready(Ok(Step::End));
        }
        match self.inner.poll_advance(cx) {
            Poll::Ready(Ok(Step::Advanced)) => {
                self.remaining -= 1;
                Poll::Ready(Ok(Step::Advanced))
            }
            other => other
        }
    }

    fn current(&self) -> &C::Item {
        self.inner.current()
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}


pub struct Skip<C> {
    inner: Fused<C>,
    remaining: usize
}


impl<C: AsyncCursor> AsyncCursor for Skip<C> {
    type Item = C::Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        loop {
            match self.inner.poll_advance(cx) {
                Poll::Ready(Ok(Step::Advanced)) => {
                    if self.remaining > 0 {
                        self.remaining -= 1;
                    } else {
                        return Poll::Ready(Ok(Step::Advanced));
                    }
                }
                other => return other
            }
        }
    }

    fn current(&self) -> &C::Item {
        self.inner.current()
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}


pub struct DistinctBy<C, F, K> {
    inner: Fused<C>,
    key_fn: F,
    last: Option<K>
}


impl<C, F, K> AsyncCursor for DistinctBy<C, F, K>
where
    C: AsyncCursor,
    F: FnMut(&C::Item) -> K,
    K: PartialEq
{
    type Item = C::Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        loop {
            match self.inner.poll_advance(cx) {
                Poll::Ready(Ok(Step::Advanced)) => {
                    let key = (self.key_fn)(self.inner.current());
                    if self.last.as_ref() != Some(&key) {
                        self.last = Some(key);
                        return Poll::Ready(Ok(Step::Advanced));
                    }
                }
                other => return other
            }
        }
    }

    fn current(&self) -> &C::Item {
        self.inner.current()
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    struct VecCursor {
        items: Vec<u32>,
        pos: usize,
        current: Option<u32>,
        disposed: bool
    }

    impl VecCursor {
        fn new(items: Vec<u32>) -> Self {
            Self {
                items,
                pos: 0,
                current: None,
                disposed: false
            }
        }
    }

    impl AsyncCursor for VecCursor {
        type Item = u32;

        fn poll_advance(&mut self, _cx: &mut Context<'_>) -> Poll<Result<Step>> {
            if self.disposed || self.pos >= self.items.len() {
                self.current = None;
                return Poll::Ready(Ok(Step::End));
            }
            self.current = Some(self.items[self.pos]);
            self.pos += 1;
            Poll::Ready(Ok(Step::Advanced))
        }

        fn current(&self) -> &u32 {
            self.current.as_ref().expect("cursor has no current record")
        }

        fn dispose(&mut self) {
            self.disposed = true;
            self.current = None;
        }
    }

    #[test]
    fn operators_compose_lazily() {
        let cursor = VecCursor::new((1..=10).collect())
            .filter(|n| n % 2 == 0)
            .map(|n| n * 10)
            .skip(1);
        let records = block_on(cursor.collect()).unwrap();
        assert_eq!(records, vec![40, 60, 80, 100]);
    }

    #[test]
    fn take_yields_at_most_count_records() {
        let records = block_on(VecCursor::new(vec![1, 2, 3]).take(5).collect()).unwrap();
        assert_eq!(records, vec![1, 2, 3]);

        let records = block_on(VecCursor::new(vec![1, 2, 3]).take(2).collect()).unwrap();
        assert_eq!(records, vec![1, 2]);

        let records = block_on(VecCursor::new(vec![1, 2, 3]).take(0).collect()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn distinct_by_collapses_equal_keys() {
        let records = block_on(
            VecCursor::new(vec![1, 1, 2, 3, 3, 3, 4]).distinct_by(|n| *n).collect()
        )
        .unwrap();
        assert_eq!(records, vec![1, 2, 3, 4]);
    }
}
