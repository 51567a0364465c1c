//! The failure-reporting collaborator used when failure isolation is on.
//!
//! The reporter is injected at construction so the engine never hardwires a
//! logging call; the default forwards to the `log` facade.

use log::error;

use crate::handler::HandlerError;

/// Receives the error of each failing handler when the owning broadcaster
/// isolates failures.
pub trait FailureReporter {
  fn report(&self, err: &HandlerError);
}

/// Default reporter: logs each failure at error level through the `log`
/// facade.
#[derive(Clone, Copy, Default)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
  fn report(&self, err: &HandlerError) { error!("broadcast handler failed: {err}"); }
}

/// Closure adapter, for tests and host integrations.
#[derive(Clone)]
pub struct FnReporter<F>(pub F);

impl<F> FailureReporter for FnReporter<F>
where
  F: Fn(&HandlerError),
{
  fn report(&self, err: &HandlerError) { (self.0)(err) }
}
