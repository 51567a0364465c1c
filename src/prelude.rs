//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

pub use crate::{
  broadcaster::{Broadcaster, LocalBroadcaster, SharedBroadcaster},
  error::BroadcastError,
  handler::{
    BroadcastHandler, HandlerError, HandlerFn, HandlerIdentity, HandlerResult, LocalHandler,
    SharedHandler, TryHandlerFn,
  },
  rc::{MutArc, MutRc, RcDeref, RcDerefMut},
  registry::Registry,
  report::{FailureReporter, FnReporter, LogReporter},
};
