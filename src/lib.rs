//! OAuth 2.0 client-credentials tokens on autopilot: OAuth1-signed client authentication against
//! the token endpoint, and self-refreshing freshness caches driven by a pluggable clock.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod error;
pub mod ext;
pub mod flows;
pub mod fresh;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		io::{Cursor, Read},
		sync::atomic::{AtomicBool, AtomicUsize, Ordering},
	};
	// crates.io
	use oauth2::http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
	// self
	use crate::{
		auth::Credentials,
		error::TransportError,
		http::{HttpFuture, HttpProvider, HttpRequest, HttpResponse, ResponseBody},
	};

	/// Credentials pointing at an unroutable endpoint; only useful with scripted transports.
	pub fn test_credentials() -> Credentials {
		Credentials::new("https://token.example.com/oauth2/token", "test-key-id", "test-key-secret")
			.expect("Failed to build test credentials.")
	}

	/// Response body that records whether it was closed and can be told to fail on close.
	#[derive(Debug)]
	pub struct TrackedBody {
		inner: Cursor<Vec<u8>>,
		closed: Arc<AtomicBool>,
		fail_close: bool,
	}
	impl Read for TrackedBody {
		fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
			self.inner.read(buf)
		}
	}
	impl ResponseBody for TrackedBody {
		fn close(&mut self) -> std::io::Result<()> {
			self.closed.store(true, Ordering::SeqCst);

			if self.fail_close {
				Err(std::io::Error::other("Scripted close failure."))
			} else {
				Ok(())
			}
		}
	}

	/// Owned snapshot of a request seen by [`ScriptedHttpProvider`].
	#[derive(Clone, Debug)]
	pub struct CapturedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URI.
		pub uri: String,
		/// `Authorization` header, if present.
		pub authorization: Option<String>,
		/// `Content-Type` header, if present.
		pub content_type: Option<String>,
		/// Request body.
		pub body: Vec<u8>,
	}
	impl From<HttpRequest> for CapturedRequest {
		fn from(request: HttpRequest) -> Self {
			let header = |name: HeaderName| {
				request
					.headers()
					.get(name)
					.and_then(|value| value.to_str().ok())
					.map(ToOwned::to_owned)
			};
			let authorization = header(AUTHORIZATION);
			let content_type = header(CONTENT_TYPE);

			Self {
				method: request.method().to_string(),
				uri: request.uri().to_string(),
				authorization,
				content_type,
				body: request.into_body(),
			}
		}
	}

	enum Scripted {
		Respond { status: u16, body: Vec<u8>, fail_close: bool },
		Fail(TransportError),
	}

	/// Transport that replays scripted responses in order, repeating the last one once the script
	/// runs out.
	#[derive(Default)]
	pub struct ScriptedHttpProvider {
		script: Mutex<VecDeque<Scripted>>,
		last: Mutex<Option<(u16, Vec<u8>)>>,
		calls: AtomicUsize,
		requests: Mutex<Vec<CapturedRequest>>,
		closed: Arc<AtomicBool>,
	}
	impl ScriptedHttpProvider {
		/// Queues a response with the given status and body.
		pub fn respond(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
			self.script.lock().push_back(Scripted::Respond {
				status,
				body: body.into(),
				fail_close: false,
			});

			self
		}

		/// Queues a response whose body fails when closed.
		pub fn respond_failing_close(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
			self.script.lock().push_back(Scripted::Respond {
				status,
				body: body.into(),
				fail_close: true,
			});

			self
		}

		/// Queues a transport failure.
		pub fn fail(self, error: TransportError) -> Self {
			self.script.lock().push_back(Scripted::Fail(error));

			self
		}

		/// Number of requests executed so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		/// Requests captured so far.
		pub fn requests(&self) -> Vec<CapturedRequest> {
			self.requests.lock().clone()
		}

		/// Whether the most recent response body was closed.
		pub fn body_closed(&self) -> bool {
			self.closed.load(Ordering::SeqCst)
		}
	}
	impl HttpProvider for ScriptedHttpProvider {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.requests.lock().push(CapturedRequest::from(request));

			let next = self.script.lock().pop_front();
			let outcome = match next {
				Some(Scripted::Fail(error)) => Err(error),
				Some(Scripted::Respond { status, body, fail_close }) => {
					*self.last.lock() = Some((status, body.clone()));

					Ok((status, body, fail_close))
				},
				None => match self.last.lock().clone() {
					Some((status, body)) => Ok((status, body, false)),
					None => Err(TransportError::network(std::io::Error::other(
						"Scripted transport has no responses left.",
					))),
				},
			};
			let closed = self.closed.clone();

			Box::pin(async move {
				let (status, body, fail_close) = outcome?;

				closed.store(false, Ordering::SeqCst);

				let content_length = Some(body.len() as u64);
				let body = TrackedBody { inner: Cursor::new(body), closed, fail_close };

				Ok(HttpResponse::new(status, content_length, Box::new(body)))
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
