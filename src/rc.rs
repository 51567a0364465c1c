use std::{
  cell::RefCell,
  ops::{Deref, DerefMut},
  rc::Rc,
  sync::{Arc, Mutex},
};

/// Read access through a shared-mutable smart pointer.
pub trait RcDeref {
  type Target;
  fn rc_deref(&self) -> impl Deref<Target = Self::Target> + '_;
}

/// Write access through a shared-mutable smart pointer.
pub trait RcDerefMut: RcDeref {
  fn rc_deref_mut(&self) -> impl DerefMut<Target = Self::Target> + '_;
}

/// `Rc<RefCell<T>>`: shared mutability for single-threaded use.
pub struct MutRc<T>(Rc<RefCell<T>>);

/// `Arc<Mutex<T>>`: shared mutability across threads.
pub struct MutArc<T>(Arc<Mutex<T>>);

impl<T> MutRc<T> {
  pub fn own(t: T) -> Self { Self(Rc::new(RefCell::new(t))) }
}

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }
}

impl<T> RcDeref for MutRc<T> {
  type Target = T;

  #[inline]
  fn rc_deref(&self) -> impl Deref<Target = T> + '_ { self.0.borrow() }
}

impl<T> RcDeref for MutArc<T> {
  type Target = T;

  #[inline]
  fn rc_deref(&self) -> impl Deref<Target = T> + '_ { self.0.lock().unwrap() }
}

impl<T> RcDerefMut for MutRc<T> {
  #[inline]
  fn rc_deref_mut(&self) -> impl DerefMut<Target = T> + '_ { self.0.borrow_mut() }
}

impl<T> RcDerefMut for MutArc<T> {
  #[inline]
  fn rc_deref_mut(&self) -> impl DerefMut<Target = T> + '_ { self.0.lock().unwrap() }
}

impl<T> From<T> for MutRc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T> From<T> for MutArc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T: Default> Default for MutRc<T> {
  fn default() -> Self { Self::own(T::default()) }
}

impl<T: Default> Default for MutArc<T> {
  fn default() -> Self { Self::own(T::default()) }
}

impl<T> Clone for MutRc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}
