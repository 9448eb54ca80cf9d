use crate::cursor::{AsyncCursor, Step};
use crate::merge::{HeapEntry, MergeHeap};
use anyhow::{ensure, Result};
use okv_transport::error::{error_kind, ContractViolation, CursorFaulted, ErrorKind};
use std::cmp::Ordering;
use std::task::{Context, Poll};
use tracing::warn;


/// The set operation a [`SetAlgebraCursor`] computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    /// Stable k-way merge; duplicate keys across inputs all surface,
    /// in input order.
    MergeSort,
    /// Merge with duplicate keys collapsed; the earliest input wins.
    Union,
    /// Keys present in every input; the record comes from input 0.
    Intersect,
    /// Input 0 is the positive side, the remaining inputs subtract
    /// from it.
    Except
}


/// Merges `N >= 1` ordered input cursors into one ordered stream
/// according to a [`SetOp`].
///
/// Keys are projected out of records with `key_fn` and ordered by `cmp`;
/// emitted records are projected with `result_fn`. Equal keys across
/// inputs resolve by input position, so the merge is stable. The cursor
/// caches at most one record per input and pulls more only when the
/// consumer asks; inputs that need advancing are all polled in the same
/// round, so their fetches overlap.
///
/// The first fault from any input disposes every input before it is
/// reported. Natural exhaustion and `dispose()` release the inputs too.
pub struct SetAlgebraCursor<C, K, R, KF, RF, CMP> {
    op: SetOp,
    inputs: Vec<Input<C, K>>,
    heap: MergeHeap<K>,
    key_fn: KF,
    result_fn: RF,
    cmp: CMP,
    current: Option<R>,
    status: Status
}


impl<C, K, R, KF, RF, CMP> std::fmt::Debug for SetAlgebraCursor<C, K, R, KF, RF, CMP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetAlgebraCursor").field("op", &self.op).finish_non_exhaustive()
    }
}


struct Input<C, K> {
    cursor: C,
    key: Option<K>,
    pending: bool,
    exhausted: bool,
    in_heap: bool
}


enum Status {
    Running,
    Done,
    Faulted(ErrorKind),
    Disposed
}


enum Outcome<R> {
    Emit(R),
    Continue,
    Finished
}


impl<C, K, R, KF, RF, CMP> SetAlgebraCursor<C, K, R, KF, RF, CMP>
where
    C: AsyncCursor,
    K: Clone,
    KF: Fn(&C::Item) -> K,
    RF: Fn(&C::Item) -> R,
    CMP: Fn(&K, &K) -> Ordering
{
    pub fn new(op: SetOp, cursors: Vec<C>, key_fn: KF, result_fn: RF, cmp: CMP) -> Result<Self> {
        ensure!(
            !cursors.is_empty(),
            ContractViolation::new("set-algebra cursor requires at least one input")
        );
        let heap = MergeHeap::with_capacity(cursors.len());
        let inputs = cursors
            .into_iter()
            .map(|cursor| Input {
                cursor,
                key: None,
                pending: true,
                exhausted: false,
                in_heap: false
            })
            .collect();
        Ok(Self {
            op,
            inputs,
            heap,
            key_fn,
            result_fn,
            cmp,
            current: None,
            status: Status::Running
        })
    }

    /// Drive every input that has an advance outstanding. Returns true
    /// while at least one of them is still waiting on I/O.
    fn drive_inputs(&mut self, cx: &mut Context<'_>) -> Result<bool> {
        let mut waiting = false;
        for id in 0..self.inputs.len() {
            if !self.inputs[id].pending {
                continue;
            }
            match self.inputs[id].cursor.poll_advance(cx) {
                Poll::Ready(Ok(Step::Advanced)) => {
                    let input = &mut self.inputs[id];
                    input.pending = false;
                    input.key = Some((self.key_fn)(input.cursor.current()));
                }
                Poll::Ready(Ok(Step::End)) => {
                    let input = &mut self.inputs[id];
                    input.pending = false;
                    input.exhausted = true;
                    input.key = None;
                }
                Poll::Ready(Err(err)) => {
                    warn!(error =? err, input = id, "merge input failed, releasing the others");
                    let kind = error_kind(&err);
                    self.release_inputs();
                    self.current = None;
                    self.status = Status::Faulted(kind);
                    return Err(err);
                }
                Poll::Pending => {
                    waiting = true;
                }
            }
        }
        Ok(waiting)
    }

    /// One stable merge round: emit the smallest current record and
    /// re-advance its input; with `dedup`, also swallow every other
    /// input positioned on the same key.
    fn step_merge(&mut self, dedup: bool) -> Outcome<R> {
        self.refill_heap();
        let cmp = &self.cmp;
        let Some(top) = self.heap.pop(cmp) else {
            return Outcome::Finished;
        };
        let input = &mut self.inputs[top.cursor_id];
        input.in_heap = false;
        input.pending = true;
        let result = (self.result_fn)(input.cursor.current());
        if dedup {
            while self
                .heap
                .peek()
                .map_or(false, |e| (self.cmp)(&e.key, &top.key) == Ordering::Equal)
            {
                let dup = self.heap.pop(cmp).expect("peeked entry is poppable");
                let input = &mut self.inputs[dup.cursor_id];
                input.in_heap = false;
                input.pending = true;
            }
        }
        Outcome::Emit(result)
    }

    fn step_intersect(&mut self) -> Outcome<R> {
        if self.inputs.iter().any(|input| input.exhausted) {
            return Outcome::Finished;
        }
        let cmp = &self.cmp;
        let k_max = self
            .inputs
            .iter()
            .map(|input| input.key.as_ref().expect("input has a current key"))
            .max_by(|a, b| cmp(a, b))
            .expect("at least one input")
            .clone();
        let mut behind = false;
        for input in self.inputs.iter_mut() {
            let key = input.key.as_ref().expect("input has a current key");
            if cmp(key, &k_max) == Ordering::Less {
                input.pending = true;
                behind = true;
            }
        }
        if behind {
            return Outcome::Continue;
        }
        let result = (self.result_fn)(self.inputs[0].cursor.current());
        for input in self.inputs.iter_mut() {
            input.pending = true;
        }
        Outcome::Emit(result)
    }

    fn step_except(&mut self) -> Outcome<R> {
        if self.inputs[0].exhausted {
            return Outcome::Finished;
        }
        let cmp = &self.cmp;
        let kp = self.inputs[0].key.clone().expect("positive input has a current key");
        let mut behind = false;
        let mut suppressed = false;
        for input in self.inputs.iter_mut().skip(1) {
            if input.exhausted {
                continue;
            }
            let key = input.key.as_ref().expect("negative input has a current key");
            match cmp(key, &kp) {
                Ordering::Less => {
                    input.pending = true;
                    behind = true;
                }
                Ordering::Equal => {
                    suppressed = true;
                }
                Ordering::Greater => {}
            }
        }
        if behind {
            return Outcome::Continue;
        }
        self.inputs[0].pending = true;
        if suppressed {
            return Outcome::Continue;
        }
        Outcome::Emit((self.result_fn)(self.inputs[0].cursor.current()))
    }

    /// Put every refreshed input back into the heap.
    fn refill_heap(&mut self) {
        let cmp = &self.cmp;
        for (id, input) in self.inputs.iter_mut().enumerate() {
            if input.exhausted || input.pending || input.in_heap {
                continue;
            }
            let Some(key) = input.key.clone() else {
                continue;
            };
            self.heap.insert(
                HeapEntry {
                    cursor_id: id,
                    key
                },
                cmp
            );
            input.in_heap = true;
        }
    }

    fn release_inputs(&mut self) {
        self.heap.clear();
        for input in self.inputs.iter_mut() {
            input.pending = false;
            input.in_heap = false;
            input.key = None;
            input.cursor.dispose();
        }
    }
}


impl<C, K, R, KF, RF, CMP> AsyncCursor for SetAlgebraCursor<C, K, R, KF, RF, CMP>
where
    C: AsyncCursor,
    K: Clone,
    KF: Fn(&C::Item) -> K,
    RF: Fn(&C::Item) -> R,
    CMP: Fn(&K, &K) -> Ordering
{
    type Item = R;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Step>> {
        match self.status {
            Status::Running => {}
            Status::Done => return Poll::Ready(Ok(Step::End)),
            Status::Faulted(kind) => {
                let fault = CursorFaulted {
                    kind
                };
                return Poll::Ready(Err(fault.into()));
            }
            Status::Disposed => {
                let violation = ContractViolation::new("advance on a disposed cursor");
                return Poll::Ready(Err(violation.into()));
            }
        }
        loop {
            match self.drive_inputs(cx) {
                Ok(false) => {}
                Ok(true) => return Poll::Pending,
                Err(err) => return Poll::Ready(Err(err))
            }
            let outcome = match self.op {
                SetOp::MergeSort => self.step_merge(false),
                SetOp::Union => self.step_merge(true),
                SetOp::Intersect => self.step_intersect(),
                SetOp::Except => self.step_except()
            };
            match outcome {
                Outcome::Emit(result) => {
                    self.current = Some(result);
                    return Poll::Ready(Ok(Step::Advanced));
                }
                Outcome::Continue => {}
                Outcome::Finished => {
                    self.release_inputs();
                    self.current = None;
                    self.status = Status::Done;
                    return Poll::Ready(Ok(Step::End));
                }
            }
        }
    }

    fn current(&self) -> &R {
        self.current.as_ref().expect("set-algebra cursor has no current record")
    }

    fn dispose(&mut self) {
        if matches!(self.status, Status::Disposed) {
            return;
        }
        self.release_inputs();
        self.current = None;
        self.status = Status::Disposed;
    }
}
