// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::SystemTime;

use crate::error::Error;
use crate::error::Kind;
use crate::Str;


/// The number of characters a valid API key consists of.
const API_KEY_LEN: usize = 40;

/// Check that `key` is a valid API key: exactly [`API_KEY_LEN`] characters,
/// all of them lowercase ASCII letters or digits.
fn is_valid_api_key(key: &str) -> bool {
  key.len() == API_KEY_LEN
    && key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}


/// The authentication material carried by a [`Credentials`] object.
///
/// A `Token` is a tagged union: either a certificate pair (used to derive
/// a streaming password) or an OAuth bearer token (used as an
/// `Authorization` header). Only one variant is active at a time.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
  /// A certificate/security-token pair, as returned by certificate login.
  Certificate {
    /// The `CST` half of the pair.
    access: String,
    /// The `X-SECURITY-TOKEN` half of the pair.
    security: String,
  },
  /// An OAuth bearer token, as returned by OAuth login.
  OAuth {
    /// The access token.
    access: String,
    /// The refresh token.
    refresh: String,
    /// The granted scope.
    scope: String,
    /// The token type, e.g. `"Bearer"`.
    type_: String,
  },
}

impl Token {
  /// Derive the Lightstreamer-compatible streaming password from this
  /// token.
  ///
  /// Only [`Token::Certificate`] tokens can produce a streaming password;
  /// the concatenation omits either half when empty, and the `|`
  /// separator appears only between two non-empty halves.
  pub fn streaming_password(&self) -> Result<String, Error> {
    match self {
      Token::Certificate { access, security } => {
        let password = match (access.is_empty(), security.is_empty()) {
          (true, true) => String::new(),
          (true, false) => format!("XST-{}", security),
          (false, true) => format!("CST-{}", access),
          (false, false) => format!("CST-{}|XST-{}", access, security),
        };
        Ok(password)
      },
      Token::OAuth { .. } => Err(
        Error::new(Kind::InvalidRequest, "No Certificate credentials")
          .with_recovery("log in with a certificate token to open a streaming channel"),
      ),
    }
  }
}


/// The full set of authentication material and account metadata needed
/// to talk to both the HTTPS API and the streaming channel.
///
/// See the crate-level data model for the invariants this type upholds:
/// the API key is always 40 lowercase-alphanumeric characters, and the
/// `expiration` is the single authoritative lifetime marker observed by
/// both transports.
#[derive(Clone, Debug, PartialEq)]
pub struct Credentials {
  /// The opaque client identifier.
  pub client_id: Str,
  /// The opaque account identifier.
  pub account_id: Str,
  api_key: Str,
  /// The absolute URL of the streaming server.
  pub streamer_url: url::Url,
  /// The IANA time zone identifier the account operates in.
  pub timezone: Str,
  /// The current authentication token.
  pub token: Token,
  /// The instant at which `token` stops being valid.
  pub expiration: SystemTime,
}

impl Credentials {
  /// Construct a new [`Credentials`] value, validating the API key.
  ///
  /// # Errors
  /// Returns [`Kind::InvalidRequest`] if `api_key` is not exactly 40
  /// lowercase alphanumeric characters.
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    client_id: impl Into<Str>,
    account_id: impl Into<Str>,
    api_key: impl Into<Str>,
    streamer_url: url::Url,
    timezone: impl Into<Str>,
    token: Token,
    expiration: SystemTime,
  ) -> Result<Self, Error> {
    let api_key = api_key.into();
    if !is_valid_api_key(&api_key) {
      return Err(Error::new(
        Kind::InvalidRequest,
        format!(
          "API key must be {} lowercase alphanumeric characters",
          API_KEY_LEN
        ),
      ))
    }

    Ok(Self {
      client_id: client_id.into(),
      account_id: account_id.into(),
      api_key,
      streamer_url,
      timezone: timezone.into(),
      token,
      expiration,
    })
  }

  /// The API key, guaranteed to be 40 lowercase alphanumeric characters.
  pub fn api_key(&self) -> &str {
    &self.api_key
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  use std::time::Duration;
  use std::time::UNIX_EPOCH;

  fn valid_key() -> String {
    "a".repeat(40)
  }

  fn creds_with_token(token: Token) -> Credentials {
    Credentials::new(
      "client",
      "account",
      valid_key(),
      url::Url::parse("https://stream.example.com").unwrap(),
      "Europe/London",
      token,
      UNIX_EPOCH + Duration::from_secs(10),
    )
    .unwrap()
  }

  #[test]
  fn api_key_must_be_forty_lowercase_alphanumeric() {
    assert!(is_valid_api_key(&valid_key()));
    assert!(!is_valid_api_key(&"a".repeat(41)));
    assert!(!is_valid_api_key(&format!("{}A", "a".repeat(39))));
  }

  #[test]
  fn rejecting_invalid_api_key() {
    let err = Credentials::new(
      "client",
      "account",
      "too-short",
      url::Url::parse("https://stream.example.com").unwrap(),
      "UTC",
      Token::Certificate {
        access: "a".into(),
        security: "b".into(),
      },
      UNIX_EPOCH,
    )
    .unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidRequest);
  }

  #[test]
  fn streaming_password_from_certificate() {
    let creds = creds_with_token(Token::Certificate {
      access: "abc".to_string(),
      security: "xyz".to_string(),
    });
    assert_eq!(creds.token.streaming_password().unwrap(), "CST-abc|XST-xyz");
  }

  #[test]
  fn streaming_password_omits_empty_halves() {
    let token = Token::Certificate {
      access: "abc".to_string(),
      security: String::new(),
    };
    assert_eq!(token.streaming_password().unwrap(), "CST-abc");

    let token = Token::Certificate {
      access: String::new(),
      security: "xyz".to_string(),
    };
    assert_eq!(token.streaming_password().unwrap(), "XST-xyz");
  }

  #[test]
  fn streaming_password_from_oauth_fails() {
    let creds = creds_with_token(Token::OAuth {
      access: "a".to_string(),
      refresh: "r".to_string(),
      scope: "trade".to_string(),
      type_: "Bearer".to_string(),
    });
    let err = creds.token.streaming_password().unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidRequest);
    assert!(err.to_string().contains("No Certificate credentials"));
  }
}
