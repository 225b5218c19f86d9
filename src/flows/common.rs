//! Request building and response parsing shared by token endpoint calls.

// std
use std::io::Read;
// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	error::{ResponseParsingError, TransportError},
	http::{HttpRequest, HttpResponse, ResponseBody, close_response_body},
	obs,
	oauth::{self, AccessTokenRequest, AccessTokenResponse, ErrorResponse},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Encoding of token request parameters in the request body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyEncoding {
	/// `application/x-www-form-urlencoded`; the parameters are covered by the signature.
	#[default]
	Form,
	/// `application/json`; the body is sent as is and not covered by the signature.
	Json,
}

/// Request ready for authorization, plus the body parameters the signature must cover.
#[derive(Debug)]
pub struct PreparedRequest {
	/// Outbound request without client authentication.
	pub request: HttpRequest,
	/// Form parameters carried in the body; empty for `GET` and JSON bodies.
	pub signed_params: Vec<(String, String)>,
}

/// Builds the outbound request for `request`.
///
/// `GET` requests carry the parameters in the URL query and have no body.
pub fn prepare_request(
	method: Method,
	mut url: Url,
	request: &AccessTokenRequest,
	encoding: BodyEncoding,
) -> Result<PreparedRequest> {
	let params = request.to_form_params();
	let builder = Request::builder().header(ACCEPT, JSON_CONTENT_TYPE);

	if method == Method::GET {
		url.query_pairs_mut().extend_pairs(&params);

		let request = builder
			.method(method)
			.uri(url.as_str())
			.body(Vec::new())
			.map_err(TransportError::from)?;

		return Ok(PreparedRequest { request, signed_params: Vec::new() });
	}

	let (content_type, body, signed_params) = match encoding {
		BodyEncoding::Form => {
			let body = oauth::form_urlencode(&params).into_bytes();

			(FORM_CONTENT_TYPE, body, params)
		},
		BodyEncoding::Json => (JSON_CONTENT_TYPE, request.to_json()?, Vec::new()),
	};
	let request = builder
		.method(method)
		.uri(url.as_str())
		.header(CONTENT_TYPE, content_type)
		.body(body)
		.map_err(TransportError::from)?;

	Ok(PreparedRequest { request, signed_params })
}

/// Parses a token endpoint response and closes its body.
///
/// 2xx bodies must be an [`AccessTokenResponse`]; any other status must carry an
/// [`ErrorResponse`], which becomes [`Error::AccessToken`]. The body is closed on every path, and a
/// close failure is only reported through the observability layer.
pub fn parse_response(mut response: HttpResponse) -> Result<AccessTokenResponse> {
	let status = response.status;
	let success = response.is_success();
	let result = read_token_body(status, success, response.body.as_mut());

	if let Err(e) = close_response_body(Some(response.body.as_mut())) {
		obs::warn_body_close_failure(&e);
	}

	result
}

fn read_token_body(
	status: u16,
	success: bool,
	body: &mut dyn ResponseBody,
) -> Result<AccessTokenResponse> {
	let mut bytes = Vec::new();

	body.read_to_end(&mut bytes)
		.map_err(|e| ResponseParsingError::ReadBody { status, source: Arc::new(e) })?;

	if success {
		return oauth::parse_json(&bytes).map_err(|e| {
			ResponseParsingError::TokenResponse { status, source: Arc::new(e) }.into()
		});
	}

	let response = oauth::parse_json::<ErrorResponse>(&bytes)
		.map_err(|e| ResponseParsingError::ErrorResponse { status, source: Arc::new(e) })?;

	Err(Error::AccessToken { status, response })
}
