// SPDX-License-Identifier: GPL-3.0-or-later

//! The session login exchange and the account list endpoint.
//!
//! Login is handled outside the [`EndpointDef!`] machinery: unlike every
//! other endpoint, a successful login carries its token material in
//! response *headers* (`CST`/`X-SECURITY-TOKEN`) rather than the body,
//! and its success is precisely the event that populates the
//! [`CredentialStore`] the rest of the pipeline depends on.

use std::time::Duration;
use std::time::SystemTime;

use hyper::http::StatusCode;
use hyper::Method;

use serde::Deserialize;
use serde::Serialize;
use serde_json::to_vec as to_json;

use url::Url;

use crate::client::Client;
use crate::credentials::Credentials;
use crate::credentials::Token;
use crate::endpoint::collect_body;
use crate::endpoint::Endpoint;
use crate::endpoint::ErrorMessage;
use crate::error::Error;
use crate::error::Kind;
use crate::Str;


/// The lifetime granted to a certificate login, absent any explicit
/// expiry in the response (the broker's session tokens are valid for
/// six hours of inactivity).
const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(6 * 60 * 60);


/// The body of a `POST /session` login request.
#[derive(Clone, Debug, Serialize)]
struct LoginRequest<'a> {
  identifier: &'a str,
  password: &'a str,
}

/// The body of a successful `POST /session` login response.
#[derive(Clone, Debug, Deserialize)]
struct LoginResponse {
  #[serde(rename = "clientId")]
  client_id: String,
  #[serde(rename = "accountId")]
  account_id: String,
  #[serde(rename = "lightstreamerEndpoint")]
  streamer_url: String,
  #[serde(rename = "timezoneOffset")]
  timezone_offset: Option<i32>,
}

impl Client {
  /// Log in with an identifier/password pair, populating this client's
  /// [`CredentialStore`][crate::session::CredentialStore] with the
  /// resulting certificate token on success.
  ///
  /// This is the one request the generic [`Endpoint`] pipeline cannot
  /// express: the server returns the `CST`/`X-SECURITY-TOKEN` pair as
  /// response headers rather than as part of the JSON body.
  pub async fn login(&self, identifier: &str, password: &str, api_key: &str) -> Result<(), Error> {
    let mut url = self.base_url().clone();
    url.set_path("/session");

    let body = to_json(&LoginRequest { identifier, password })?;
    let req = hyper::http::request::Builder::new()
      .method(Method::POST)
      .uri(url.as_str())
      .header("Version", "2")
      .header(crate::api::HDR_API_KEY, api_key)
      .header("Content-Type", "application/json; charset=UTF-8")
      .body(http_body_util::Full::new(hyper::body::Bytes::from(body)))?;

    let res = self.send_raw(req).await?;
    let status = res.status();
    let access = header_str(&res, "CST")?;
    let security = header_str(&res, "X-SECURITY-TOKEN")?;

    let body = collect_body(res.into_body()).await?;
    if status != StatusCode::OK {
      let message = ErrorMessage::parse(&body).map(|m| m.code).unwrap_or_default();
      return Err(Error::new(Kind::InvalidResponse, format!("login failed: {}", message)))
    }

    let login: LoginResponse = serde_json::from_slice(&body)?;
    let expiration = SystemTime::now() + DEFAULT_SESSION_LIFETIME;
    let streamer_url = Url::parse(&login.streamer_url)?;
    // The broker reports the account's UTC offset in hours; fall back to
    // UTC if it is absent (demo accounts sometimes omit it).
    let timezone = login
      .timezone_offset
      .map(|hours| format!("UTC{:+}", hours))
      .unwrap_or_else(|| "UTC".to_string());

    let credentials = Credentials::new(
      login.client_id,
      login.account_id,
      api_key.to_string(),
      streamer_url,
      timezone,
      Token::Certificate { access, security },
      expiration,
    )?;
    self.credentials().set(Some(credentials));
    Ok(())
  }
}

fn header_str(res: &hyper::Response<hyper::body::Incoming>, name: &str) -> Result<String, Error> {
  res
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string)
    .ok_or_else(|| Error::new(Kind::InvalidResponse, format!("missing {} header", name)))
}


/// One account accessible under the logged-in client.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct AccountDetails {
  /// The account identifier.
  #[serde(rename = "accountId")]
  pub account_id: String,
  /// The account's display name.
  #[serde(rename = "accountName")]
  pub account_name: String,
  /// Whether this is the account used by default when none is specified.
  pub preferred: bool,
  /// The three-letter account currency.
  pub currency: String,
}

/// The response to a `GET /accounts` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Accounts {
  /// All accounts the authenticated client can operate.
  pub accounts: Vec<AccountDetails>,
}


/// The representation of a `GET /accounts` request, listing every
/// account reachable under the current credentials.
#[derive(Clone, Copy, Debug)]
pub struct Get;

impl Endpoint for Get {
  type Input = ();
  type Output = Accounts;
  type Error = GetError;

  fn path(_input: &Self::Input) -> Str {
    "/accounts".into()
  }
}

EndpointDef! {
  Get,
  Ok => Accounts, [
    /// The account list was retrieved successfully.
    OK,
  ],
  Err => GetError, []
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[test]
  fn parse_accounts_response() {
    let response = r#"{
      "accounts": [
        {"accountId": "ABC123", "accountName": "Spread bet", "preferred": true, "currency": "GBP"}
      ]
    }"#;

    let accounts = from_json::<Accounts>(response).unwrap();
    assert_eq!(accounts.accounts.len(), 1);
    assert!(accounts.accounts[0].preferred);
  }
}
