//! Lazy, single-result computations.
//!
//! A [`Task`] wraps a future that produces `Result<T>`. Nothing runs until the
//! task is driven, either step by step with [`Task::resume`], to completion on
//! the calling thread with [`Task::get`], or by awaiting it from another
//! future.
//!
//! The task owns its waker. Operations that suspend (a read that would block,
//! say) register that waker in a [`WaiterSlot`](crate::WaiterSlot); when the
//! readiness source fires a notification the task is marked as notified and
//! the party awaiting the task, if any, is woken.
//!
//! ```rust
//! use resock::{Status, Task};
//!
//! let mut task = Task::new(async { Ok(21 * 2) });
//! assert_eq!(task.status(), Status::NotStarted);
//!
//! assert!(task.resume().is_ready());
//! assert_eq!(task.output(), Some(&Ok(42)));
//! assert_eq!(task.get(), Ok(42));
//! ```

use std::{
  fmt,
  pin::Pin,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  task::{Context, Poll, Wake, Waker},
};

use crate::{
  error::{Error, Result},
  sync::Mutex,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a>>;

/// Where a [`Task`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  NotStarted,
  /// Inside [`Task::resume`]. Seen from outside only if a poll panicked.
  Running,
  /// Parked at a suspension point.
  Suspended,
  Completed,
}

/// The waker handed to the wrapped future.
struct Signal {
  notified: AtomicBool,
  continuation: Mutex<Option<Waker>>,
}

impl Signal {
  fn wake_continuation(&self) {
    let continuation = self.continuation.lock().take();
    if let Some(waker) = continuation {
      waker.wake();
    }
  }
}

impl Wake for Signal {
  fn wake(self: Arc<Self>) {
    self.wake_by_ref();
  }

  fn wake_by_ref(self: &Arc<Self>) {
    self.notified.store(true, Ordering::Release);
    self.wake_continuation();
  }
}

pub struct Task<'a, T> {
  future: Option<BoxFuture<'a, T>>,
  outcome: Option<Result<T>>,
  status: Status,
  signal: Arc<Signal>,
}

// The wrapped future is boxed and the outcome is never pinned.
impl<T> Unpin for Task<'_, T> {}

impl<'a, T> Task<'a, T> {
  pub fn new<F>(future: F) -> Task<'a, T>
  where
    F: Future<Output = Result<T>> + 'a,
  {
    Task {
      future: Some(Box::pin(future)),
      outcome: None,
      status: Status::NotStarted,
      signal: Arc::new(Signal {
        notified: AtomicBool::new(false),
        continuation: Mutex::new(None),
      }),
    }
  }

  pub fn status(&self) -> Status {
    self.status
  }

  pub fn is_done(&self) -> bool {
    self.status == Status::Completed
  }

  /// Whether a waiter registered by this task has been woken since the task
  /// was last resumed.
  pub fn is_notified(&self) -> bool {
    self.signal.notified.load(Ordering::Acquire)
  }

  /// The stored outcome once completed. Failures stay here until retrieved.
  pub fn output(&self) -> Option<&Result<T>> {
    self.outcome.as_ref()
  }

  /// Runs the task up to its next suspension point or to completion.
  ///
  /// Resuming a completed task does nothing.
  pub fn resume(&mut self) -> Poll<()> {
    match self.status {
      Status::Completed => return Poll::Ready(()),
      Status::Running => {
        self.finish(Err(Error::Usage("task resumed after its poll panicked")));
        return Poll::Ready(());
      }
      Status::NotStarted | Status::Suspended => {}
    }

    let Some(future) = self.future.as_mut() else {
      self.finish(Err(Error::Usage("task has no computation")));
      return Poll::Ready(());
    };

    self.status = Status::Running;
    self.signal.notified.store(false, Ordering::Release);

    let waker = Waker::from(Arc::clone(&self.signal));
    let mut cx = Context::from_waker(&waker);

    match future.as_mut().poll(&mut cx) {
      Poll::Ready(outcome) => {
        self.finish(outcome);
        Poll::Ready(())
      }
      Poll::Pending => {
        self.status = Status::Suspended;
        log::trace!("resock: task suspended");
        Poll::Pending
      }
    }
  }

  fn finish(&mut self, outcome: Result<T>) {
    self.future = None;
    self.outcome = Some(outcome);
    self.status = Status::Completed;
    self.signal.wake_continuation();
  }

  /// Drives the task to completion on the calling thread and returns its
  /// value, or the failure it stored.
  ///
  /// Between steps the thread yields; the wrapped operations retry their
  /// system call on every step, so no notification is needed.
  pub fn get(mut self) -> Result<T> {
    while self.resume().is_pending() {
      std::thread::yield_now();
    }

    self.outcome.take().unwrap_or(Err(Error::Usage("task outcome already taken")))
  }
}

impl<T> Future for Task<'_, T> {
  type Output = Result<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
    let this = self.get_mut();

    if this.status == Status::Completed && this.outcome.is_none() {
      return Poll::Ready(Err(Error::Usage("task polled after completion")));
    }

    // The awaiting party is running right now and needs no wake from this
    // step.
    this.signal.continuation.lock().take();

    match this.resume() {
      Poll::Ready(()) => Poll::Ready(
        this
          .outcome
          .take()
          .unwrap_or(Err(Error::Usage("task outcome already taken"))),
      ),
      Poll::Pending => {
        *this.signal.continuation.lock() = Some(cx.waker().clone());
        // A notification that raced the store above would otherwise be lost.
        if this.is_notified() {
          cx.waker().wake_by_ref();
        }
        Poll::Pending
      }
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for Task<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("status", &self.status)
      .field("notified", &self.is_notified())
      .field("outcome", &self.outcome)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::waiter::WaiterSlot;
  use std::{cell::Cell, future::poll_fn, rc::Rc};

  /// A future that stays pending until `open` is set.
  fn gate(slot: Rc<WaiterSlot>, open: Rc<Cell<bool>>) -> impl Future<Output = ()> {
    poll_fn(move |cx| {
      if open.get() {
        slot.release(cx.waker());
        Poll::Ready(())
      } else {
        slot.register(cx.waker()).expect("single waiter");
        Poll::Pending
      }
    })
  }

  #[test]
  fn nothing_runs_until_driven() {
    let ran = Rc::new(Cell::new(false));
    let task = Task::new({
      let ran = ran.clone();
      async move {
        ran.set(true);
        Ok(7)
      }
    });

    assert!(!ran.get());
    assert_eq!(task.status(), Status::NotStarted);
    assert_eq!(task.get(), Ok(7));
    assert!(ran.get());
  }

  #[test]
  fn suspends_and_resumes_after_notification() {
    let slot = Rc::new(WaiterSlot::new());
    let open = Rc::new(Cell::new(false));
    let mut task = Task::new({
      let gate = gate(slot.clone(), open.clone());
      async move {
        gate.await;
        Ok(5)
      }
    });

    assert!(task.resume().is_pending());
    assert_eq!(task.status(), Status::Suspended);
    assert!(!task.is_notified());
    assert!(slot.is_pending());

    open.set(true);
    assert!(slot.wake());
    assert!(task.is_notified());
    assert!(!slot.wake());

    assert!(task.resume().is_ready());
    assert!(task.is_done());
    assert!(!task.is_notified());
    assert_eq!(task.output(), Some(&Ok(5)));

    // Completed tasks are not recomputed.
    assert!(task.resume().is_ready());
    assert_eq!(task.output(), Some(&Ok(5)));
  }

  #[test]
  fn failures_surface_at_retrieval() {
    let mut task =
      Task::new(async { Err::<(), _>(Error::system("recv", 104)) });

    assert!(task.resume().is_ready());
    assert_eq!(task.output(), Some(&Err(Error::system("recv", 104))));
    assert_eq!(task.output(), Some(&Err(Error::system("recv", 104))));
    assert_eq!(task.get(), Err(Error::system("recv", 104)));
  }

  #[test]
  fn awaiting_task_is_woken_by_inner_progress() {
    let slot = Rc::new(WaiterSlot::new());
    let open = Rc::new(Cell::new(false));
    let inner = Task::new({
      let gate = gate(slot.clone(), open.clone());
      async move {
        gate.await;
        Ok(10)
      }
    });
    let mut outer = Task::new(async move { Ok(inner.await? * 2) });

    assert!(outer.resume().is_pending());
    assert!(!outer.is_notified());

    open.set(true);
    slot.wake();
    assert!(outer.is_notified());

    assert!(outer.resume().is_ready());
    assert_eq!(outer.output(), Some(&Ok(20)));
  }

  #[test]
  fn polling_after_completion_is_a_usage_error() {
    let mut task = Task::new(async { Ok("done") });
    let mut cx = Context::from_waker(Waker::noop());

    assert_eq!(Pin::new(&mut task).poll(&mut cx), Poll::Ready(Ok("done")));
    let again = Pin::new(&mut task).poll(&mut cx);
    assert!(matches!(again, Poll::Ready(Err(Error::Usage(_)))));
  }
}
