use thiserror::Error;

use crate::handler::HandlerError;

/// Returned by `emit` when failure isolation is off and a handler fails.
///
/// Carries the failing handler's error as `source`; handlers after the
/// failing one were not run.
#[derive(Debug, Error)]
#[error("broadcast aborted: {source}")]
pub struct BroadcastError {
  #[from]
  source: HandlerError,
}

impl BroadcastError {
  /// The failing handler's error.
  pub fn handler_error(&self) -> &HandlerError { &self.source }

  pub fn into_handler_error(self) -> HandlerError { self.source }
}
