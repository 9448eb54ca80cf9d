use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};


/// Outcome of one cursor advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The cursor moved to the next record; `current()` is defined.
    Advanced,
    /// The cursor is exhausted. Terminal and sticky.
    End
}


/// A stateful pull-based producer of ordered records.
///
/// At most one advance may be outstanding at a time; the engine is
/// single-consumer, so this needs no synchronization. `End` and faults
/// are sticky: once a cursor reports either, further advances keep
/// reporting the same terminal status.
pub trait AsyncCursor {
    type Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>>;

    /// The record the cursor is positioned on.
    ///
    /// Panics unless the preceding advance returned [`Step::Advanced`].
    fn current(&self) -> &Self::Item;

    /// Release the cursor and everything it holds, cancelling any
    /// in-flight fetch. Idempotent.
    fn dispose(&mut self);

    fn advance(&mut self) -> Advance<'_, Self>
    where
        Self: Sized
    {
        Advance {
            cursor: self
        }
    }
}


impl<C: AsyncCursor + ?Sized> AsyncCursor for Box<C> {
    type Item = C::Item;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        (**self).poll_advance(cx)
    }

    fn current(&self) -> &Self::Item {
        (**self).current()
    }

    fn dispose(&mut self) {
        (**self).dispose()
    }
}


pub type BoxCursor<T> = Box<dyn AsyncCursor<Item = T> + Send>;


/// Future returned by [`AsyncCursor::advance`].
pub struct Advance<'a, C> {
    cursor: &'a mut C
}


impl<C: AsyncCursor> Future for Advance<'_, C> {
    type Output = Result<Step>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().cursor.poll_advance(cx)
    }
}
