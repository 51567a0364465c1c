use std::{
  marker::PhantomData,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

use crate::{
  error::BroadcastError,
  handler::{
    BroadcastHandler, HandlerError, HandlerFn, HandlerIdentity, LocalHandler, SharedHandler,
    TryHandlerFn,
  },
  rc::{MutArc, MutRc, RcDerefMut},
  registry::{DeferredOp, Registry},
  report::{FailureReporter, LogReporter},
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Single-threaded broadcaster over the argument tuple `Args`.
pub type LocalBroadcaster<Args> = Broadcaster<MutRc<Registry<LocalHandler<Args>>>>;

/// Thread-safe broadcaster over the argument tuple `Args`; clones may be
/// moved to other threads and used concurrently.
pub type SharedBroadcaster<Args> = Broadcaster<MutArc<Registry<SharedHandler<Args>>>>;

/// Broadcaster: an ordered collection of handlers invoked in bulk.
///
/// Handlers may add or remove handlers (including themselves) while a
/// broadcast is running, and a handler may re-enter `emit` on the same
/// instance before the outer call completes.
///
/// # Architecture
///
/// The engine is parameterized by a single smart pointer type `P` pointing
/// at the lock-protected [`Registry`]:
/// - [`LocalBroadcaster`] uses `Rc<RefCell<Registry<_>>>`
/// - [`SharedBroadcaster`] uses `Arc<Mutex<Registry<_>>>`
///
/// `R` is the injected [`FailureReporter`], consulted only when failure
/// isolation is on.
///
/// # Mutation semantics during a broadcast
///
/// `add`/`remove`/`clear` apply synchronously while the instance is idle.
/// While any `emit` is in flight (on any thread, at any nesting depth) they
/// are recorded instead, and replayed in issue order when the outermost
/// frame exits. Concretely:
///
/// - a handler added from inside a callback does **not** see the
///   in-progress broadcast; it becomes active once the outermost `emit`
///   returns.
/// - a handler removed from inside a callback **does** still receive the
///   in-progress broadcast (it is already in the walked sequence).
/// - a re-entrant `emit` from inside a callback walks exactly the sequence
///   the outer call walks.
///
/// The registry lock is never held while a handler body runs; only the
/// enter/exit accounting and the structural check-and-mutate of each
/// operation are under the lock.
///
/// # Example
///
/// ```rust
/// use sigcast::prelude::*;
///
/// let hits = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
/// let sink = hits.clone();
///
/// let bus = Broadcaster::local();
/// bus.subscribe(move |v: i32| sink.borrow_mut().push(v));
///
/// bus.emit(1).unwrap();
/// bus.emit(2).unwrap();
/// assert_eq!(*hits.borrow(), vec![1, 2]);
/// ```
pub struct Broadcaster<P, R = LogReporter> {
  registry: P,
  // Mirror of the handler-list length, maintained under the registry lock.
  // Lets `emit` skip the lock entirely when nobody is subscribed.
  live: Arc<AtomicUsize>,
  isolate_failures: bool,
  clear_after_emit: bool,
  reporter: R,
}

impl<P: Clone, R: Clone> Clone for Broadcaster<P, R> {
  fn clone(&self) -> Self {
    Self {
      registry: self.registry.clone(),
      live: self.live.clone(),
      isolate_failures: self.isolate_failures,
      clear_after_emit: self.clear_after_emit,
      reporter: self.reporter.clone(),
    }
  }
}

// ============================================================================
// Construction & Configuration
// ============================================================================

impl<P, H, R> Broadcaster<P, R>
where
  P: RcDerefMut<Target = Registry<H>> + From<Registry<H>>,
{
  /// Create an empty broadcaster with the given failure reporter and both
  /// configuration flags off.
  pub fn with_reporter(reporter: R) -> Self {
    Self {
      registry: P::from(Registry::default()),
      live: Arc::new(AtomicUsize::new(0)),
      isolate_failures: false,
      clear_after_emit: false,
      reporter,
    }
  }
}

impl<P, H, R> Default for Broadcaster<P, R>
where
  P: RcDerefMut<Target = Registry<H>> + From<Registry<H>>,
  R: Default,
{
  fn default() -> Self { Self::with_reporter(R::default()) }
}

impl<P, R> Broadcaster<P, R> {
  /// Report a failing handler instead of aborting the broadcast: remaining
  /// handlers still run and `emit` returns `Ok`.
  ///
  /// Configuration is fixed at construction; call this before the instance
  /// is cloned or shared.
  pub fn isolate_failures(mut self) -> Self {
    self.isolate_failures = true;
    self
  }

  /// Drop every handler once the outermost `emit` completes. Handlers added
  /// *during* that emit are applied afterwards and survive into the next
  /// one.
  ///
  /// Configuration is fixed at construction; call this before the instance
  /// is cloned or shared.
  pub fn clear_after_emit(mut self) -> Self {
    self.clear_after_emit = true;
    self
  }

  /// Number of subscribed handlers. O(1) and lock-free; valid regardless of
  /// whether a broadcast is in flight.
  #[inline]
  pub fn handler_count(&self) -> usize { self.live.load(Ordering::Relaxed) }

  /// Whether no handler is subscribed.
  #[inline]
  pub fn is_empty(&self) -> bool { self.handler_count() == 0 }

  /// Whether at least one handler is subscribed. Owners use this to skip
  /// building broadcast arguments entirely.
  #[inline]
  pub fn has_handlers(&self) -> bool { !self.is_empty() }
}

impl<Args: 'static> Broadcaster<MutRc<Registry<LocalHandler<Args>>>> {
  /// Create a new single-threaded broadcaster with the default log-based
  /// reporter.
  pub fn local() -> Self { Self::with_reporter(LogReporter) }
}

impl<Args: 'static> Broadcaster<MutArc<Registry<SharedHandler<Args>>>> {
  /// Create a new thread-safe broadcaster with the default log-based
  /// reporter.
  pub fn shared() -> Self { Self::with_reporter(LogReporter) }
}

// ============================================================================
// Engine
// ============================================================================

impl<P, H, R> Broadcaster<P, R>
where
  P: RcDerefMut<Target = Registry<H>>,
  H: BroadcastHandler,
  R: FailureReporter,
{
  /// Subscribe a handler. Applies immediately when idle, otherwise once the
  /// outermost in-flight `emit` exits.
  pub fn add(&self, handler: H) {
    let mut reg = self.registry.rc_deref_mut();
    if reg.depth > 0 {
      reg.deferred.push(DeferredOp::Add(handler));
    } else {
      reg.handlers.push(handler);
      self.live.store(reg.len(), Ordering::Relaxed);
    }
  }

  /// Unsubscribe the first occurrence of an identity-equal handler.
  /// Removing a handler that is not subscribed is a silent no-op.
  pub fn remove(&self, handler: &H) {
    let mut reg = self.registry.rc_deref_mut();
    if reg.depth > 0 {
      reg.deferred.push(DeferredOp::Remove(handler.clone()));
    } else {
      reg.remove_first(handler);
      self.live.store(reg.len(), Ordering::Relaxed);
    }
  }

  /// Unsubscribe every handler. When deferred, earlier deferred records are
  /// replayed first, so adds issued after the `clear` still apply.
  pub fn clear(&self) {
    let mut reg = self.registry.rc_deref_mut();
    if reg.depth > 0 {
      reg.deferred.push(DeferredOp::Clear);
    } else {
      reg.handlers.clear();
      self.live.store(0, Ordering::Relaxed);
    }
  }

  /// Broadcast `args` to every handler subscribed at the start of this
  /// call. Prefer the arity-shaped `emit(...)` adapters; this is the
  /// tuple-typed engine entry they forward to.
  ///
  /// The handler count is snapshotted on entry and the *live* sequence is
  /// walked by position; since structural mutation is deferred while any
  /// frame is in flight, the walked sequence is stable even under
  /// re-entrant emits. Arguments are cloned for every handler but the last,
  /// which receives the moved value.
  pub fn emit_args(&self, args: H::Args) -> Result<(), BroadcastError>
  where
    H::Args: Clone,
  {
    if self.live.load(Ordering::Relaxed) == 0 {
      return Ok(());
    }

    let count = {
      let mut reg = self.registry.rc_deref_mut();
      // The lock-free read above may be stale; never enter the invoking
      // state on an empty list.
      if reg.is_empty() {
        return Ok(());
      }
      reg.depth += 1;
      reg.len()
    };

    // Exit bookkeeping lives in a drop guard: it must run even if a handler
    // panics, or the instance would be stuck in the invoking state with its
    // deferred queue never drained.
    let _scope = EmitScope {
      registry: &self.registry,
      live: &self.live,
      clear_after_emit: self.clear_after_emit,
      _handler: PhantomData,
    };

    let mut failure = None;
    for slot in 0..count {
      let handler = self.registry.rc_deref().handlers[slot].clone();
      if slot + 1 < count {
        if !self.deliver(&handler, args.clone(), &mut failure) {
          break;
        }
      } else {
        self.deliver(&handler, args, &mut failure);
        break;
      }
    }

    match failure {
      None => Ok(()),
      Some(err) => Err(BroadcastError::from(err)),
    }
  }

  /// Run one handler body (no lock held). Returns whether the broadcast
  /// should continue.
  fn deliver(&self, handler: &H, args: H::Args, failure: &mut Option<HandlerError>) -> bool {
    match handler.call(args) {
      Ok(()) => true,
      Err(err) => {
        if self.isolate_failures {
          self.reporter.report(&err);
          true
        } else {
          *failure = Some(err);
          false
        }
      }
    }
  }
}

/// One `emit` frame. On drop: if this is the outermost frame, apply
/// auto-clear, replay the deferred queue in issue order and refresh the
/// lock-free length mirror, all under a single lock acquisition; then leave
/// the invoking state.
struct EmitScope<'a, P, H>
where
  P: RcDerefMut<Target = Registry<H>>,
  H: HandlerIdentity,
{
  registry: &'a P,
  live: &'a AtomicUsize,
  clear_after_emit: bool,
  _handler: PhantomData<H>,
}

impl<P, H> Drop for EmitScope<'_, P, H>
where
  P: RcDerefMut<Target = Registry<H>>,
  H: HandlerIdentity,
{
  fn drop(&mut self) {
    let mut reg = self.registry.rc_deref_mut();
    if reg.depth == 1 {
      if self.clear_after_emit {
        reg.handlers.clear();
      }
      reg.drain_deferred();
      self.live.store(reg.len(), Ordering::Relaxed);
    }
    reg.depth -= 1;
  }
}

// ============================================================================
// Subscribe sugar
// ============================================================================

impl<Args: 'static, R> Broadcaster<MutRc<Registry<LocalHandler<Args>>>, R>
where
  R: FailureReporter,
{
  /// Create a new single-threaded broadcaster with a custom failure
  /// reporter.
  pub fn local_with_reporter(reporter: R) -> Self { Self::with_reporter(reporter) }

  /// Wrap `f` in a [`LocalHandler`], subscribe it, and return the handle
  /// for a later [`remove`](Broadcaster::remove).
  pub fn subscribe<F>(&self, f: F) -> LocalHandler<Args>
  where
    F: HandlerFn<Args> + 'static,
  {
    let handler = LocalHandler::new(f);
    self.add(handler.clone());
    handler
  }

  /// Like [`subscribe`](Self::subscribe), for a fallible handler body.
  pub fn subscribe_fallible<F>(&self, f: F) -> LocalHandler<Args>
  where
    F: TryHandlerFn<Args> + 'static,
  {
    let handler = LocalHandler::fallible(f);
    self.add(handler.clone());
    handler
  }
}

impl<Args: 'static, R> Broadcaster<MutArc<Registry<SharedHandler<Args>>>, R>
where
  R: FailureReporter,
{
  /// Create a new thread-safe broadcaster with a custom failure reporter.
  pub fn shared_with_reporter(reporter: R) -> Self { Self::with_reporter(reporter) }

  /// Wrap `f` in a [`SharedHandler`], subscribe it, and return the handle
  /// for a later [`remove`](Broadcaster::remove).
  pub fn subscribe<F>(&self, f: F) -> SharedHandler<Args>
  where
    F: HandlerFn<Args> + Send + Sync + 'static,
  {
    let handler = SharedHandler::new(f);
    self.add(handler.clone());
    handler
  }

  /// Like [`subscribe`](Self::subscribe), for a fallible handler body.
  pub fn subscribe_fallible<F>(&self, f: F) -> SharedHandler<Args>
  where
    F: TryHandlerFn<Args> + Send + Sync + 'static,
  {
    let handler = SharedHandler::fallible(f);
    self.add(handler.clone());
    handler
  }
}

// ============================================================================
// Arity adapters
// ============================================================================

/// Stamps the `emit(a, b, ...)` shape adapters over the tuple-typed engine,
/// one pair of impls (local/shared) per arity.
macro_rules! impl_emit {
  ($(($T:ident, $v:ident)),*) => {
    impl<R $(, $T: 'static)*> Broadcaster<MutRc<Registry<LocalHandler<($($T,)*)>>>, R>
    where
      ($($T,)*): Clone,
      R: FailureReporter,
    {
      /// Broadcast to every handler subscribed at the start of this call.
      pub fn emit(&self $(, $v: $T)*) -> Result<(), BroadcastError> {
        self.emit_args(($($v,)*))
      }
    }

    impl<R $(, $T: 'static)*> Broadcaster<MutArc<Registry<SharedHandler<($($T,)*)>>>, R>
    where
      ($($T,)*): Clone,
      R: FailureReporter,
    {
      /// Broadcast to every handler subscribed at the start of this call.
      pub fn emit(&self $(, $v: $T)*) -> Result<(), BroadcastError> {
        self.emit_args(($($v,)*))
      }
    }
  };
}

impl_emit!();
impl_emit!((A1, a1));
impl_emit!((A1, a1), (A2, a2));
impl_emit!((A1, a1), (A2, a2), (A3, a3));
impl_emit!((A1, a1), (A2, a2), (A3, a3), (A4, a4));
impl_emit!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5));
impl_emit!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5), (A6, a6));

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use std::{
    cell::{Cell, RefCell},
    rc::Rc,
  };

  use super::*;
  use crate::{handler::HandlerResult, report::FnReporter};

  #[test]
  fn broadcasts_in_subscription_order() {
    let bus = Broadcaster::local();
    let hits = Rc::new(RefCell::new(Vec::new()));

    let a_hits = hits.clone();
    bus.subscribe(move |v: i32| a_hits.borrow_mut().push(("a", v)));
    let b_hits = hits.clone();
    bus.subscribe(move |v: i32| b_hits.borrow_mut().push(("b", v)));

    bus.emit(7).unwrap();
    assert_eq!(*hits.borrow(), vec![("a", 7), ("b", 7)]);
  }

  #[test]
  fn removed_handler_is_silent() {
    let bus = Broadcaster::local();
    let hits = Rc::new(RefCell::new(Vec::new()));

    let a_hits = hits.clone();
    let a = bus.subscribe(move |v: i32| a_hits.borrow_mut().push(("a", v)));
    let b_hits = hits.clone();
    bus.subscribe(move |v: i32| b_hits.borrow_mut().push(("b", v)));

    bus.remove(&a);
    bus.emit(3).unwrap();
    assert_eq!(*hits.borrow(), vec![("b", 3)]);
  }

  #[test]
  fn cleared_broadcaster_emits_nothing() {
    let bus = Broadcaster::local();
    let hits = Rc::new(RefCell::new(Vec::new()));

    let a_hits = hits.clone();
    bus.subscribe(move |v: i32| a_hits.borrow_mut().push(v));
    let b_hits = hits.clone();
    bus.subscribe(move |v: i32| b_hits.borrow_mut().push(v));

    bus.clear();
    bus.emit(1).unwrap();
    assert!(hits.borrow().is_empty());
    assert_eq!(bus.handler_count(), 0);
  }

  #[test]
  fn emitting_with_no_handlers_is_a_no_op() {
    let bus = LocalBroadcaster::<(i32,)>::default();
    assert!(bus.emit(1).is_ok());
    assert!(bus.is_empty());
  }

  #[test]
  fn count_tracks_subscriptions() {
    let bus = Broadcaster::local();
    assert!(!bus.has_handlers());
    assert_eq!(bus.handler_count(), 0);

    let h = bus.subscribe(|_: u8| {});
    assert!(bus.has_handlers());
    assert_eq!(bus.handler_count(), 1);

    bus.remove(&h);
    assert!(bus.is_empty());
  }

  #[test]
  fn duplicates_are_removed_one_occurrence_at_a_time() {
    let bus = Broadcaster::local();
    let hits = Rc::new(RefCell::new(0));

    let sink = hits.clone();
    let h = LocalHandler::new(move || *sink.borrow_mut() += 1);
    bus.add(h.clone());
    bus.add(h.clone());

    bus.remove(&h);
    assert_eq!(bus.handler_count(), 1);
    bus.emit().unwrap();
    assert_eq!(*hits.borrow(), 1);

    bus.remove(&h);
    bus.remove(&h); // double remove: silent no-op
    assert_eq!(bus.handler_count(), 0);
  }

  #[test]
  fn reentrant_emit_walks_the_same_sequence() {
    let bus = Broadcaster::local();
    let trace = Rc::new(RefCell::new(Vec::new()));
    let reentered = Rc::new(Cell::new(false));

    let h1 = {
      let bus = bus.clone();
      let trace = trace.clone();
      let reentered = reentered.clone();
      LocalHandler::new(move || {
        trace.borrow_mut().push("h1");
        if !reentered.get() {
          reentered.set(true);
          let x_trace = trace.clone();
          bus.add(LocalHandler::new(move || x_trace.borrow_mut().push("x")));
          // The nested emit must observe the pre-mutation sequence.
          bus.emit().unwrap();
        }
      })
    };
    let h2 = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("h2"))
    };
    bus.add(h1);
    bus.add(h2);

    bus.emit().unwrap();
    assert_eq!(*trace.borrow(), vec!["h1", "h1", "h2", "h2"]);
    // the deferred add landed once the outermost frame exited
    assert_eq!(bus.handler_count(), 3);

    trace.borrow_mut().clear();
    bus.emit().unwrap();
    assert_eq!(*trace.borrow(), vec!["h1", "h2", "x"]);
  }

  #[test]
  fn deferred_ops_replay_in_issue_order() {
    let bus = Broadcaster::local();
    let trace = Rc::new(RefCell::new(Vec::new()));

    let x = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("x"))
    };
    let y = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("y"))
    };
    let h1 = {
      let bus = bus.clone();
      LocalHandler::new(move || {
        bus.add(x.clone());
        bus.clear();
        bus.add(y.clone());
      })
    };
    bus.add(h1);

    bus.emit().unwrap();
    // replay: add x -> [h1, x]; clear -> []; add y -> [y]
    assert_eq!(bus.handler_count(), 1);

    bus.emit().unwrap();
    assert_eq!(*trace.borrow(), vec!["y"]);
  }

  #[test]
  fn mutations_during_emit_defer_until_exit() {
    let bus = Broadcaster::local();
    let trace = Rc::new(RefCell::new(Vec::new()));
    let count_inside = Rc::new(Cell::new(0));

    let h2 = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("h2"))
    };
    let extra = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("extra"))
    };
    let h1 = {
      let bus = bus.clone();
      let trace = trace.clone();
      let count_inside = count_inside.clone();
      let h2 = h2.clone();
      let extra = extra.clone();
      LocalHandler::new(move || {
        trace.borrow_mut().push("h1");
        bus.remove(&h2);
        bus.add(extra.clone());
        count_inside.set(bus.handler_count());
      })
    };
    bus.add(h1);
    bus.add(h2);

    bus.emit().unwrap();
    // h2 was removed mid-broadcast but still receives this one
    assert_eq!(*trace.borrow(), vec!["h1", "h2"]);
    // the count reflects the live sequence, untouched by deferred ops
    assert_eq!(count_inside.get(), 2);
    assert_eq!(bus.handler_count(), 2); // [h1, extra]
  }

  #[test]
  fn clear_after_emit_drops_handlers_but_keeps_deferred_adds() {
    let bus = Broadcaster::local().clear_after_emit();
    let trace = Rc::new(RefCell::new(Vec::new()));

    let h2 = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("h2"))
    };
    let h1 = {
      let bus = bus.clone();
      let trace = trace.clone();
      let h2 = h2.clone();
      LocalHandler::new(move || {
        trace.borrow_mut().push("h1");
        bus.add(h2.clone());
      })
    };
    bus.add(h1);

    bus.emit().unwrap();
    // auto-clear wiped h1, then the deferred add of h2 applied
    assert_eq!(*trace.borrow(), vec!["h1"]);
    assert_eq!(bus.handler_count(), 1);

    bus.emit().unwrap();
    assert_eq!(*trace.borrow(), vec!["h1", "h2"]);
    assert_eq!(bus.handler_count(), 0);

    bus.emit().unwrap(); // nothing left: no-op
    assert_eq!(*trace.borrow(), vec!["h1", "h2"]);
  }

  #[test]
  fn isolated_failures_are_reported_and_do_not_stop_delivery() {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    let bus = Broadcaster::local_with_reporter(FnReporter(move |err: &HandlerError| {
      sink.borrow_mut().push(err.to_string())
    }))
    .isolate_failures();

    let trace = Rc::new(RefCell::new(Vec::new()));
    let a_trace = trace.clone();
    bus.subscribe(move || a_trace.borrow_mut().push("a"));
    bus.subscribe_fallible(|| -> HandlerResult { Err("boom".into()) });
    let b_trace = trace.clone();
    bus.subscribe(move || b_trace.borrow_mut().push("b"));

    assert!(bus.emit().is_ok());
    assert_eq!(*trace.borrow(), vec!["a", "b"]);
    assert_eq!(*reports.borrow(), vec!["boom"]);
  }

  #[test]
  fn first_failure_aborts_and_propagates_without_isolation() {
    let bus = Broadcaster::local();
    let trace = Rc::new(RefCell::new(Vec::new()));

    let late = {
      let trace = trace.clone();
      LocalHandler::new(move || trace.borrow_mut().push("late"))
    };
    let a_trace = trace.clone();
    let a_bus = bus.clone();
    let a_late = late.clone();
    bus.subscribe(move || {
      a_trace.borrow_mut().push("a");
      a_bus.add(a_late.clone());
    });
    bus.subscribe_fallible(|| -> HandlerResult { Err("boom".into()) });
    let b_trace = trace.clone();
    bus.subscribe(move || b_trace.borrow_mut().push("b"));

    let err = bus.emit().unwrap_err();
    assert_eq!(err.handler_error().to_string(), "boom");
    // b never ran
    assert_eq!(*trace.borrow(), vec!["a"]);
    // the deferred add still drained on the failed outermost exit
    assert_eq!(bus.handler_count(), 4);
  }

  #[test]
  fn multi_arity_emit_delivers_to_every_handler() {
    let bus = Broadcaster::local();
    let hits = Rc::new(RefCell::new(Vec::new()));

    let a_hits = hits.clone();
    bus.subscribe(move |name: String, n: i32| a_hits.borrow_mut().push(("a", name, n)));
    let b_hits = hits.clone();
    bus.subscribe(move |name: String, n: i32| b_hits.borrow_mut().push(("b", name, n)));

    bus.emit("hi".to_string(), 3).unwrap();
    assert_eq!(
      *hits.borrow(),
      vec![("a", "hi".to_string(), 3), ("b", "hi".to_string(), 3)]
    );
  }
}
