// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use hyper::http::Error as HttpError;
use hyper::http::StatusCode as HttpStatusCode;
use serde_json::Error as JsonError;
use thiserror::Error as ThisError;
use url::ParseError;

use crate::Str;


/// The kind of failure that occurred, shared across the session, request
/// and subscription domains (see the crate-level error taxonomy).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
  /// The owning session handle has been dropped or the credential is gone.
  SessionExpired,
  /// Caller-side misuse: bad arguments, missing credentials, impossible
  /// state.
  InvalidRequest,
  /// The underlying transport (HTTPS or streaming) reported a failure.
  CallFailed,
  /// The server reply (bytes, status, schema) did not match expectations.
  InvalidResponse,
}

impl Display for Kind {
  fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
    let s = match self {
      Kind::SessionExpired => "session expired",
      Kind::InvalidRequest => "invalid request",
      Kind::CallFailed => "call failed",
      Kind::InvalidResponse => "invalid response",
    };
    fmt.write_str(s)
  }
}


/// The error category reported for a subscription-level failure, as
/// relayed by the streaming server (see spec §7).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SubscriptionErrorKind {
  /// The requested adapter set is not known to the server.
  InvalidAdapterName,
  /// The session backing the subscription was interrupted.
  InterruptedSession,
  /// The item group name is not recognized.
  InvalidGroupName,
  /// The field schema name is not recognized.
  InvalidSchemaName,
  /// The requested mode is not allowed for this item.
  ProhibitedModeForItem,
  /// Unfiltered dispatching was requested but is not permitted.
  UnfilteredDispatchingProhibited,
  /// Unfiltered dispatching was requested but is not supported.
  UnfilteredDispatchingUnsupported,
  /// Unfiltered dispatching was requested but is restricted.
  UnfilteredDispatchingRestricted,
  /// Raw mode is restricted for this item.
  RawModeRestricted,
  /// The subscription is restricted (e.g. by entitlement).
  SubscriptionRestricted,
  /// The server refused the request outright.
  RequestRefused,
  /// A code the client does not recognize.
  Unknown(i32),
}

impl SubscriptionErrorKind {
  /// Map a server-reported numeric code onto a [`SubscriptionErrorKind`].
  ///
  /// The concrete codes mirror the ones used by Lightstreamer-compatible
  /// servers; values not in this table classify as `Unknown`.
  pub fn from_code(code: i32) -> Self {
    match code {
      1 | 2 => Self::InvalidAdapterName,
      5 => Self::InterruptedSession,
      10 => Self::InvalidGroupName,
      11 => Self::InvalidSchemaName,
      12 => Self::ProhibitedModeForItem,
      13 => Self::UnfilteredDispatchingUnsupported,
      14 => Self::UnfilteredDispatchingRestricted,
      15 => Self::RawModeRestricted,
      16 => Self::UnfilteredDispatchingProhibited,
      17 => Self::SubscriptionRestricted,
      21 | 22 => Self::RequestRefused,
      other => Self::Unknown(other),
    }
  }
}


/// A free-form bag of contextual information attached to an [`Error`],
/// e.g. the request URL, the page number being fetched, or the
/// subscription's item and field names.
pub type Context = BTreeMap<Str, Str>;

/// Build a [`Context`] from `(key, value)` pairs, for use at error sites.
#[macro_export]
macro_rules! context {
  ($($key:expr => $val:expr),* $(,)?) => {{
    #[allow(unused_mut)]
    let mut map = $crate::error::Context::new();
    $(let _ = map.insert($key.into(), $val.into());)*
    map
  }};
}


/// The error type as used by this crate.
///
/// Every variant carries a [`Kind`], a short human-readable message, a
/// [`Context`] describing where the error occurred, and (where
/// applicable) the underlying cause.
#[derive(Debug, ThisError)]
pub struct Error {
  kind: Kind,
  message: Str,
  recovery: Option<Str>,
  context: Context,
  #[source]
  cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
  subscription_kind: Option<SubscriptionErrorKind>,
}

impl Error {
  /// Construct a new error of the given `kind` with a message.
  pub fn new(kind: Kind, message: impl Into<Str>) -> Self {
    Self {
      kind,
      message: message.into(),
      recovery: None,
      context: Context::new(),
      cause: None,
      subscription_kind: None,
    }
  }

  /// Construct an [`InvalidRequest`][Kind::InvalidRequest] error.
  pub fn invalid_request(message: impl Into<Str>) -> Self {
    Self::new(Kind::InvalidRequest, message)
  }

  /// Construct an [`InvalidResponse`][Kind::InvalidResponse] error.
  pub fn invalid_response(message: impl Into<Str>) -> Self {
    Self::new(Kind::InvalidResponse, message)
  }

  /// Construct a [`CallFailed`][Kind::CallFailed] error.
  pub fn call_failed(message: impl Into<Str>) -> Self {
    Self::new(Kind::CallFailed, message)
  }

  /// Construct a [`SessionExpired`][Kind::SessionExpired] error.
  pub fn session_expired(message: impl Into<Str>) -> Self {
    Self::new(Kind::SessionExpired, message)
  }

  /// Construct a subscription-level failure, carrying the server-reported
  /// error code.
  pub fn subscription_failed(code: i32, message: impl Into<Str>) -> Self {
    Self {
      subscription_kind: Some(SubscriptionErrorKind::from_code(code)),
      ..Self::new(Kind::CallFailed, message)
    }
  }

  /// Attach a recovery suggestion.
  #[must_use]
  pub fn with_recovery(mut self, recovery: impl Into<Str>) -> Self {
    self.recovery = Some(recovery.into());
    self
  }

  /// Attach contextual key/value pairs.
  #[must_use]
  pub fn with_context(mut self, context: Context) -> Self {
    self.context.extend(context);
    self
  }

  /// Attach an underlying cause.
  #[must_use]
  pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
    self.cause = Some(Box::new(cause));
    self
  }

  /// The error's [`Kind`].
  pub fn kind(&self) -> Kind {
    self.kind
  }

  /// The subscription-level error category, if this error originated on a
  /// subscription.
  pub fn subscription_kind(&self) -> Option<SubscriptionErrorKind> {
    self.subscription_kind
  }

  /// The recovery suggestion, if any.
  pub fn recovery(&self) -> Option<&str> {
    self.recovery.as_deref()
  }

  /// The contextual key/value pairs attached to this error.
  pub fn context(&self) -> &Context {
    &self.context
  }
}

impl Display for Error {
  fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
    write!(fmt, "{}: {}", self.kind, self.message)?;
    if let Some(recovery) = &self.recovery {
      write!(fmt, " ({})", recovery)?;
    }
    Ok(())
  }
}

impl From<HttpError> for Error {
  fn from(e: HttpError) -> Self {
    Self::new(Kind::InvalidRequest, "failed to build HTTP request").with_cause(e)
  }
}

impl From<HttpStatusCode> for Error {
  fn from(status: HttpStatusCode) -> Self {
    Self::new(Kind::InvalidResponse, format!("received HTTP status {}", status))
  }
}

impl From<hyper::Error> for Error {
  fn from(e: hyper::Error) -> Self {
    Self::new(Kind::CallFailed, "HTTP transport error").with_cause(e)
  }
}

impl From<hyper_util::client::legacy::Error> for Error {
  fn from(e: hyper_util::client::legacy::Error) -> Self {
    Self::new(Kind::CallFailed, "HTTP transport error").with_cause(e)
  }
}

impl From<JsonError> for Error {
  fn from(e: JsonError) -> Self {
    Self::new(Kind::InvalidResponse, "failed to decode JSON body").with_cause(e)
  }
}

impl From<ParseError> for Error {
  fn from(e: ParseError) -> Self {
    Self::new(Kind::InvalidRequest, "failed to parse URL").with_cause(e)
  }
}

impl From<sqlx::Error> for Error {
  fn from(e: sqlx::Error) -> Self {
    Self::new(Kind::CallFailed, "cache storage error").with_cause(e)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn context_macro_builds_map() {
    let ctx = context! {
      "url" => "https://example.com/v1/foo",
      "page" => "3",
    };
    assert_eq!(ctx.get("url").map(String::as_str), Some("https://example.com/v1/foo"));
    assert_eq!(ctx.get("page").map(String::as_str), Some("3"));
  }

  #[test]
  fn subscription_error_kind_maps_known_codes() {
    assert_eq!(SubscriptionErrorKind::from_code(15), SubscriptionErrorKind::RawModeRestricted);
    assert_eq!(SubscriptionErrorKind::from_code(9999), SubscriptionErrorKind::Unknown(9999));
  }

  #[test]
  fn display_includes_recovery_suggestion() {
    let err = Error::invalid_request("missing credentials").with_recovery("call set() first");
    let rendered = err.to_string();
    assert!(rendered.contains("missing credentials"));
    assert!(rendered.contains("call set() first"));
  }
}
