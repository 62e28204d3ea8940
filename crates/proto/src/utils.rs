use std::fmt;
use tracing::{field, Span};

/// Span recording for the RPC handlers. A field only shows up if the
/// handler declared it in `#[instrument(fields(..))]`.
pub(crate) trait Record: Sized {
  fn record_as(self, field: &'static str) -> Self;

  #[inline]
  fn record_response(self) -> Self {
    self.record_as("response")
  }
}

impl<T: fmt::Debug> Record for T {
  #[inline]
  fn record_as(self, field: &'static str) -> Self {
    Span::current().record(field, &field::debug(&self));
    self
  }
}

#[inline]
pub(crate) fn record_request<T: fmt::Debug>(request: T) -> T {
  request.record_as("request")
}

/// Records the status code of a failed call as `error`.
pub(crate) fn record_error<T, E>(result: Result<T, E>) -> Result<T, tonic::Status>
where
  E: Into<tonic::Status>,
{
  result.map_err(|e| {
    let status = e.into();
    Span::current().record("error", &field::debug(status.code()));
    status
  })
}
