// self
use crate::{_prelude::*, error::BodyCloseError, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by token requests and refreshes.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_fresh.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Reports a refresh failure recorded on a freshness cache's failure channel.
pub fn warn_refresh_failure(error: &Error, background: bool, attempt: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			flow = FlowKind::Refresh.as_str(),
			background,
			attempt,
			error = %error,
			"Refresh failed; any previously cached value stays in place."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (error, background, attempt);
	}
}

/// Reports a response body that could not be closed after parsing.
pub fn warn_body_close_failure(error: &BodyCloseError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			flow = FlowKind::TokenRequest.as_str(),
			error = %error,
			cause = %error.0,
			"Token endpoint response body could not be closed."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ConfigError;

	#[test]
	fn warnings_never_panic() {
		warn_refresh_failure(&ConfigError::InvalidSigningKey.into(), true, 3);
		warn_body_close_failure(&BodyCloseError(std::io::Error::other("closed twice")));
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
