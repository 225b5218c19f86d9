//! Request authorization contract used by the token endpoint.

// self
use crate::{_prelude::*, http::HttpRequest};

/// Attaches client authentication to a fully built token request.
///
/// The endpoint passes the form parameters it encoded into the body so signature schemes that
/// cover the body can include them; parameters carried in the URL query are available from the
/// request itself. Implementations must not perform I/O.
pub trait HttpRequestAuthorizer
where
	Self: Send + Sync,
{
	/// Mutates `request` in place (typically by setting `Authorization`).
	fn authorize(&self, request: &mut HttpRequest, form_params: &[(String, String)]) -> Result<()>;
}
impl<A> HttpRequestAuthorizer for Arc<A>
where
	A: ?Sized + HttpRequestAuthorizer,
{
	fn authorize(&self, request: &mut HttpRequest, form_params: &[(String, String)]) -> Result<()> {
		(**self).authorize(request, form_params)
	}
}
