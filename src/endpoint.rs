// SPDX-License-Identifier: GPL-3.0-or-later

use std::error::Error as StdError;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use http_body_util::BodyExt;
use http_body_util::Full;

use hyper::body::Bytes;
use hyper::http::request::Builder;
use hyper::http::Error as HttpError;
use hyper::Method;
use hyper::Request;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::from_slice;
use serde_json::Error as JsonError;

use url::Url;

use crate::api::HDR_API_KEY;
use crate::credentials::Credentials;
use crate::credentials::Token;
use crate::error::fmt_err;
use crate::error::Error;
use crate::error::Kind;
use crate::Str;


/// An error type used by the [`Endpoint`] trait for concerns that are
/// common to every endpoint: building the request, talking to the
/// transport, and decoding the response body.
#[derive(Debug)]
pub enum EndpointError {
  /// An HTTP related error.
  Http(HttpError),
  /// The transport failed to send the request or receive the response.
  Transport(hyper_util::client::legacy::Error),
  /// Reading the response body failed.
  Body(hyper::Error),
  /// A JSON conversion error.
  Json(JsonError),
  /// The endpoint requires credentials but none are currently available.
  NoCredentials,
}

impl Display for EndpointError {
  fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
    match self {
      EndpointError::Http(err) => fmt_err(err, fmt),
      EndpointError::Transport(err) => fmt_err(err, fmt),
      EndpointError::Body(err) => fmt_err(err, fmt),
      EndpointError::Json(err) => fmt_err(err, fmt),
      EndpointError::NoCredentials => fmt.write_str("no credentials"),
    }
  }
}

impl StdError for EndpointError {}

impl From<HttpError> for EndpointError {
  fn from(e: HttpError) -> Self {
    EndpointError::Http(e)
  }
}

impl From<hyper_util::client::legacy::Error> for EndpointError {
  fn from(e: hyper_util::client::legacy::Error) -> Self {
    EndpointError::Transport(e)
  }
}

impl From<hyper::Error> for EndpointError {
  fn from(e: hyper::Error) -> Self {
    EndpointError::Body(e)
  }
}

impl From<JsonError> for EndpointError {
  fn from(e: JsonError) -> Self {
    EndpointError::Json(e)
  }
}

impl From<EndpointError> for Error {
  fn from(e: EndpointError) -> Self {
    match e {
      EndpointError::Http(err) => {
        Error::new(Kind::InvalidRequest, "failed to build HTTP request").with_cause(err)
      },
      EndpointError::Transport(err) => {
        Error::new(Kind::CallFailed, "HTTP transport error").with_cause(err)
      },
      EndpointError::Body(err) => {
        Error::new(Kind::CallFailed, "failed to read HTTP response body").with_cause(err)
      },
      EndpointError::Json(err) => {
        Error::new(Kind::InvalidResponse, "failed to decode JSON body").with_cause(err)
      },
      EndpointError::NoCredentials => {
        Error::new(Kind::InvalidRequest, "no credentials")
      },
    }
  }
}


/// The body of a server-reported error, as returned by most endpoints on
/// failure.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ErrorMessage {
  /// A broker-specific error code.
  #[serde(rename = "errorCode")]
  pub code: String,
}

impl ErrorMessage {
  /// Best-effort parse of an error body; falls back to an empty code if
  /// the body does not match the expected schema.
  pub fn parse(body: &[u8]) -> Result<Self, Vec<u8>> {
    from_slice(body).map_err(|_| body.to_vec())
  }
}


/// A trait describing an HTTPS endpoint: a path, method, and how to turn
/// an [`Input`][Endpoint::Input] into a request and a response body into
/// an [`Output`][Endpoint::Output].
///
/// The default [`request`][Endpoint::request] implementation injects the
/// authentication headers described in the crate's external interface:
/// `X-IG-API-KEY` unconditionally, plus either `X-CST`/`X-SECURITY-TOKEN`
/// (for certificate tokens) or `Authorization`/`IG-ACCOUNT-ID` (for OAuth
/// tokens), and a `Version` header carrying the endpoint's API version.
pub trait Endpoint {
  /// The type of data passed in as part of a request to this endpoint.
  type Input;
  /// The type of data returned in a successful response.
  type Output;
  /// The type of error this endpoint can report.
  type Error: From<EndpointError>;

  /// The HTTP method to use. Defaults to `GET`.
  fn method() -> Method {
    Method::GET
  }

  /// The endpoint version, emitted as the `Version` header.
  fn version() -> u16 {
    1
  }

  /// Whether this endpoint requires credentials to be attached.
  fn credentials() -> bool {
    true
  }

  /// The path the request should go to.
  fn path(input: &Self::Input) -> Str;

  /// The query string the request should use, if any.
  #[allow(unused)]
  fn query(input: &Self::Input) -> Option<Str> {
    None
  }

  /// The request's body. Defaults to an empty body.
  #[allow(unused)]
  fn body(input: &Self::Input) -> Result<Bytes, JsonError> {
    Ok(Bytes::new())
  }

  /// Build the request for this endpoint.
  fn request(
    base_url: &Url,
    credentials: Option<&Credentials>,
    input: &Self::Input,
  ) -> Result<Request<Full<Bytes>>, EndpointError> {
    let mut url = base_url.clone();
    url.set_path(&Self::path(input));
    url.set_query(Self::query(input).as_deref());

    let mut builder = Builder::new()
      .method(Self::method())
      .uri(url.as_str())
      .header("Version", Self::version().to_string());

    if Self::credentials() {
      let credentials = credentials.ok_or(EndpointError::NoCredentials)?;
      builder = builder.header(HDR_API_KEY, credentials.api_key());
      builder = match &credentials.token {
        Token::Certificate { access, security } => builder
          .header("X-CST", access.as_str())
          .header("X-SECURITY-TOKEN", security.as_str()),
        Token::OAuth {
          access, type_, ..
        } => builder
          .header("Authorization", format!("{} {}", type_, access))
          .header("IG-ACCOUNT-ID", credentials.account_id.as_ref()),
      };
    }

    let body = Self::body(input).map_err(EndpointError::from)?;
    builder
      .body(Full::new(body))
      .map_err(EndpointError::from)
  }

  /// Parse the response body into the endpoint's output type.
  fn parse(body: &[u8]) -> Result<Self::Output, Self::Error>
  where
    Self::Output: DeserializeOwned,
  {
    from_slice::<Self::Output>(body)
      .map_err(|e| Self::Error::from(EndpointError::Json(e)))
  }
}


/// Read a response body fully into memory.
pub(crate) async fn collect_body(
  body: hyper::body::Incoming,
) -> Result<Vec<u8>, hyper::Error> {
  let collected = body.collect().await?;
  Ok(collected.to_bytes().to_vec())
}


/// A result type used solely to communicate the result of a conversion
/// from an `(HTTP status, body)` pair to the [`Client`][crate::Client].
///
/// This type is local to the crate so that we can implement the foreign
/// `From` trait on it.
#[derive(Debug)]
pub struct ConvertResult<T, E>(pub Result<T, E>);

impl<T, E> From<ConvertResult<T, E>> for Result<T, E> {
  fn from(result: ConvertResult<T, E>) -> Self {
    result.0
  }
}
