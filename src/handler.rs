//! Handler handles and the closure adapters that feed them.
//!
//! A handler is a cheap, cloneable handle around a shared callable. The
//! handle is also the removal key: clones of one handle identify the same
//! subscription, while separately created handlers never compare equal, even
//! if their closures are structurally identical.

use std::{error::Error, rc::Rc, sync::Arc};

/// The failure a handler may return from one delivery.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Shorthand for the result of a fallible handler body.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Closure adaptation
// ============================================================================

/// An infallible callable over an argument tuple.
///
/// Implemented for plain `Fn` closures of arity 0 through 6; the tuple shape
/// selects the arity, so `|a: u32, b: &str| ...` adapts to
/// `HandlerFn<(u32, &str)>`.
pub trait HandlerFn<Args> {
  fn call_handler(&self, args: Args);
}

/// A fallible callable over an argument tuple.
///
/// Implemented for `Fn` closures of arity 0 through 6 returning
/// [`HandlerResult`].
pub trait TryHandlerFn<Args> {
  fn call_handler(&self, args: Args) -> HandlerResult;
}

macro_rules! impl_handler_fn {
  ($(($T:ident, $v:ident)),*) => {
    impl<F $(, $T)*> HandlerFn<($($T,)*)> for F
    where
      F: Fn($($T),*),
    {
      #[inline]
      fn call_handler(&self, ($($v,)*): ($($T,)*)) { self($($v),*) }
    }

    impl<F $(, $T)*> TryHandlerFn<($($T,)*)> for F
    where
      F: Fn($($T),*) -> HandlerResult,
    {
      #[inline]
      fn call_handler(&self, ($($v,)*): ($($T,)*)) -> HandlerResult { self($($v),*) }
    }
  };
}

impl_handler_fn!();
impl_handler_fn!((A1, a1));
impl_handler_fn!((A1, a1), (A2, a2));
impl_handler_fn!((A1, a1), (A2, a2), (A3, a3));
impl_handler_fn!((A1, a1), (A2, a2), (A3, a3), (A4, a4));
impl_handler_fn!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5));
impl_handler_fn!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5), (A6, a6));

// ============================================================================
// Engine-facing seam
// ============================================================================

/// Identity comparison between handler handles.
///
/// Identity, not structural equality: two handles are the same handler only
/// when they share one underlying allocation.
pub trait HandlerIdentity {
  fn same_handler(&self, other: &Self) -> bool;
}

/// A subscribed callable as the broadcast engine sees it.
pub trait BroadcastHandler: HandlerIdentity + Clone {
  type Args;

  fn call(&self, args: Self::Args) -> HandlerResult;
}

// ============================================================================
// Handle types
// ============================================================================

/// Single-threaded handler handle, `Rc`-shared.
pub struct LocalHandler<Args> {
  f: Rc<dyn Fn(Args) -> HandlerResult>,
}

/// Thread-safe handler handle, `Arc`-shared; usable from any thread.
pub struct SharedHandler<Args> {
  f: Arc<dyn Fn(Args) -> HandlerResult + Send + Sync>,
}

impl<Args: 'static> LocalHandler<Args> {
  /// Wrap an infallible closure.
  pub fn new<F>(f: F) -> Self
  where
    F: HandlerFn<Args> + 'static,
  {
    Self {
      f: Rc::new(move |args: Args| -> HandlerResult {
        f.call_handler(args);
        Ok(())
      }),
    }
  }

  /// Wrap a closure that may fail; the failure feeds the broadcaster's
  /// failure policy.
  pub fn fallible<F>(f: F) -> Self
  where
    F: TryHandlerFn<Args> + 'static,
  {
    Self { f: Rc::new(move |args: Args| f.call_handler(args)) }
  }
}

impl<Args: 'static> SharedHandler<Args> {
  /// Wrap an infallible closure.
  pub fn new<F>(f: F) -> Self
  where
    F: HandlerFn<Args> + Send + Sync + 'static,
  {
    Self {
      f: Arc::new(move |args: Args| -> HandlerResult {
        f.call_handler(args);
        Ok(())
      }),
    }
  }

  /// Wrap a closure that may fail; the failure feeds the broadcaster's
  /// failure policy.
  pub fn fallible<F>(f: F) -> Self
  where
    F: TryHandlerFn<Args> + Send + Sync + 'static,
  {
    Self { f: Arc::new(move |args: Args| f.call_handler(args)) }
  }
}

impl<Args> Clone for LocalHandler<Args> {
  #[inline]
  fn clone(&self) -> Self { Self { f: Rc::clone(&self.f) } }
}

impl<Args> Clone for SharedHandler<Args> {
  #[inline]
  fn clone(&self) -> Self { Self { f: Arc::clone(&self.f) } }
}

impl<Args> HandlerIdentity for LocalHandler<Args> {
  #[inline]
  fn same_handler(&self, other: &Self) -> bool { Rc::ptr_eq(&self.f, &other.f) }
}

impl<Args> HandlerIdentity for SharedHandler<Args> {
  #[inline]
  fn same_handler(&self, other: &Self) -> bool { Arc::ptr_eq(&self.f, &other.f) }
}

impl<Args> BroadcastHandler for LocalHandler<Args> {
  type Args = Args;

  #[inline]
  fn call(&self, args: Args) -> HandlerResult { (self.f)(args) }
}

impl<Args> BroadcastHandler for SharedHandler<Args> {
  type Args = Args;

  #[inline]
  fn call(&self, args: Args) -> HandlerResult { (self.f)(args) }
}

impl<Args> PartialEq for LocalHandler<Args> {
  fn eq(&self, other: &Self) -> bool { self.same_handler(other) }
}

impl<Args> PartialEq for SharedHandler<Args> {
  fn eq(&self, other: &Self) -> bool { self.same_handler(other) }
}

impl<Args> std::fmt::Debug for LocalHandler<Args> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalHandler")
      .field("f", &Rc::as_ptr(&self.f))
      .finish()
  }
}

impl<Args> std::fmt::Debug for SharedHandler<Args> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SharedHandler")
      .field("f", &Arc::as_ptr(&self.f))
      .finish()
  }
}
