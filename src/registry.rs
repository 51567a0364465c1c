use smallvec::SmallVec;

use crate::handler::HandlerIdentity;

/// A structural mutation recorded instead of applied because an emit is in
/// flight.
pub enum DeferredOp<H> {
  Add(H),
  Remove(H),
  Clear,
}

/// The lock-protected state of one broadcaster: the ordered handler list,
/// the deferred-mutation queue, and the emit nesting depth.
///
/// Uses `SmallVec<[H; 2]>` so the common zero-to-two-handler case stays off
/// the heap.
pub struct Registry<H> {
  pub(crate) handlers: SmallVec<[H; 2]>,
  pub(crate) deferred: Vec<DeferredOp<H>>,
  pub(crate) depth: usize,
}

impl<H> Default for Registry<H> {
  fn default() -> Self { Self { handlers: SmallVec::new(), deferred: Vec::new(), depth: 0 } }
}

impl<H> Registry<H> {
  #[inline]
  pub(crate) fn len(&self) -> usize { self.handlers.len() }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool { self.handlers.is_empty() }
}

impl<H: HandlerIdentity> Registry<H> {
  /// Remove the first identity-equal occurrence, if any.
  pub(crate) fn remove_first(&mut self, handler: &H) {
    if let Some(pos) = self
      .handlers
      .iter()
      .position(|h| h.same_handler(handler))
    {
      self.handlers.remove(pos);
    }
  }

  pub(crate) fn apply(&mut self, op: DeferredOp<H>) {
    match op {
      DeferredOp::Add(h) => self.handlers.push(h),
      DeferredOp::Remove(h) => self.remove_first(&h),
      DeferredOp::Clear => self.handlers.clear(),
    }
  }

  /// Replay the deferred queue in arrival order and leave it empty.
  pub(crate) fn drain_deferred(&mut self) {
    for op in std::mem::take(&mut self.deferred) {
      self.apply(op);
    }
  }
}
