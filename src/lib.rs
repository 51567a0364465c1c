//! # sigcast: a reentrancy-safe broadcast dispatcher
//!
//! An ordered, mutable collection of callback handlers that can be invoked
//! in bulk. Handlers may subscribe or unsubscribe other handlers (including
//! themselves) *while* a broadcast is running, and may re-enter the same
//! broadcaster before the outer call completes; structural mutations are
//! deferred and replayed in issue order once the outermost call exits.
//!
//! ## Quick Start
//!
//! ```rust
//! use sigcast::prelude::*;
//!
//! let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
//! let sink = seen.clone();
//!
//! let bus = Broadcaster::local();
//! let handle = bus.subscribe(move |v: i32| sink.borrow_mut().push(v));
//!
//! bus.emit(1).unwrap();
//! bus.remove(&handle);
//! bus.emit(2).unwrap();
//! assert_eq!(*seen.borrow(), vec![1]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`LocalBroadcaster`] / [`SharedBroadcaster`] | Single-threaded vs thread-safe instantiations of the engine |
//! | [`LocalHandler`] / [`SharedHandler`] | Cheap cloneable handler handles; a clone is the removal key |
//! | [`FailureReporter`] | Injectable sink for handler failures when isolation is on |
//! | [`BroadcastError`] | The propagated failure when isolation is off |
//!
//! Broadcasters over 0 to 6 positional arguments share one tuple-typed
//! engine; `emit(a, b, ...)` adapters select the shape.
//!
//! [`LocalBroadcaster`]: prelude::LocalBroadcaster
//! [`SharedBroadcaster`]: prelude::SharedBroadcaster
//! [`LocalHandler`]: prelude::LocalHandler
//! [`SharedHandler`]: prelude::SharedHandler
//! [`FailureReporter`]: prelude::FailureReporter
//! [`BroadcastError`]: prelude::BroadcastError

pub mod broadcaster;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod rc;
pub mod registry;
pub mod report;

pub use prelude::*;
