// SPDX-License-Identifier: GPL-3.0-or-later

//! Test-only configuration: integration tests need a live account to run
//! against, so rather than scatter environment variables across every
//! test module they all load one JSON file, pointed to by a single
//! environment variable.

use std::env::var_os;
use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use url::Url;

use crate::credentials::Token;
use crate::error::Error;
use crate::error::Kind;

/// The environment variable naming the JSON configuration file.
const ENV_CONFIG: &str = "io.dehesa.ig.tests.account";

/// The `api` section of the configuration file.
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
  /// The HTTPS API's base URL.
  pub url: Url,
  /// The application's API key.
  pub key: String,
  /// The account's credentials, in one of three supported shapes.
  #[serde(flatten)]
  pub credentials: CredentialsConfig,
}

/// The account's credentials, in whichever one of the three supported
/// shapes the configuration file carries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CredentialsConfig {
  /// A plaintext login exchanged for a certificate pair during the
  /// session handshake.
  User {
    /// The account's identifier, as used interactively.
    user: String,
    /// The account's password.
    password: String,
  },
  /// A pre-established certificate pair.
  Certificate {
    /// The certificate credentials.
    certificate: CertificateConfig,
  },
  /// A pre-established OAuth token.
  OAuth {
    /// The OAuth credentials.
    oauth: OAuthConfig,
  },
}

/// A certificate credential pair, as stored in the configuration file.
#[derive(Debug, Deserialize)]
pub struct CertificateConfig {
  /// The access (CST) token.
  pub access: String,
  /// The security (X-SECURITY-TOKEN) token.
  pub security: String,
}

/// An OAuth credential set, as stored in the configuration file.
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
  /// The access token.
  pub access: String,
  /// The refresh token.
  pub refresh: String,
  /// The granted scope.
  pub scope: String,
  /// The token type (typically `Bearer`).
  #[serde(rename = "type")]
  pub type_: String,
}

impl CredentialsConfig {
  /// Coerce into a streamable [`Token`], where possible. `User` logins
  /// authenticate into a certificate pair during the session handshake,
  /// so they have no static token to construct here.
  pub fn into_token(self) -> Option<Token> {
    match self {
      CredentialsConfig::User { .. } => None,
      CredentialsConfig::Certificate { certificate } => {
        Some(Token::Certificate { access: certificate.access, security: certificate.security })
      },
      CredentialsConfig::OAuth { oauth } => Some(Token::OAuth {
        access: oauth.access,
        refresh: oauth.refresh,
        scope: oauth.scope,
        type_: oauth.type_,
      }),
    }
  }
}

/// The `streamer` section of the configuration file.
#[derive(Debug, Deserialize)]
pub struct StreamerConfig {
  /// The Lightstreamer-compatible server address.
  pub url: Url,
}

/// The `database` section of the configuration file.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
  /// The cache database's location, as a `sqlite:` URL or bare file path;
  /// a leading `~` is expanded against the user's home directory.
  pub url: String,
}

/// The full configuration file: `{accountId, api, streamer, database}`.
#[derive(Debug, Deserialize)]
pub struct TestConfig {
  /// The account identifier the tests authenticate as.
  #[serde(rename = "accountId")]
  pub account_id: String,
  /// The HTTPS API section.
  pub api: ApiConfig,
  /// The streaming channel section.
  pub streamer: StreamerConfig,
  /// The local cache database section.
  pub database: DatabaseConfig,
}

/// Expand a leading `~` in `path` to the user's home directory, the way
/// a shell would; any other path is returned unchanged.
pub fn expand_tilde(path: &str) -> Result<PathBuf, Error> {
  match path.strip_prefix('~') {
    Some(rest) => {
      let home = var_os("HOME")
        .ok_or_else(|| Error::new(Kind::InvalidRequest, "HOME is not set, cannot expand '~'"))?;
      Ok(Path::new(&home).join(rest.trim_start_matches('/')))
    },
    None => Ok(PathBuf::from(path)),
  }
}

/// Load the test configuration named by the `io.dehesa.ig.tests.account`
/// environment variable.
pub fn load() -> Result<TestConfig, Error> {
  let raw_path = var_os(ENV_CONFIG)
    .ok_or_else(|| Error::new(Kind::InvalidRequest, format!("{} environment variable not found", ENV_CONFIG)))?;
  let raw_path = raw_path
    .into_string()
    .map_err(|_| Error::new(Kind::InvalidRequest, format!("{} is not valid UTF-8", ENV_CONFIG)))?;
  let path = expand_tilde(&raw_path)?;

  let contents = read_to_string(&path)
    .map_err(|err| Error::new(Kind::InvalidRequest, format!("failed to read {:?}", path)).with_cause(err))?;
  let config: TestConfig = serde_json::from_str(&contents)
    .map_err(|err| Error::new(Kind::InvalidResponse, format!("malformed test configuration at {:?}", path)).with_cause(err))?;
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tilde_expands_against_home() {
    std::env::set_var("HOME", "/home/tester");
    assert_eq!(expand_tilde("~/config.json").unwrap(), PathBuf::from("/home/tester/config.json"));
    assert_eq!(expand_tilde("/absolute/config.json").unwrap(), PathBuf::from("/absolute/config.json"));
  }

  #[test]
  fn full_config_deserializes_with_certificate_credentials() {
    let json = r#"{
      "accountId": "ABC123",
      "api": {
        "url": "https://demo-api.example.com",
        "key": "deadbeef",
        "certificate": {"access": "acc", "security": "sec"}
      },
      "streamer": {"url": "https://stream.example.com"},
      "database": {"url": "sqlite://cache.db"}
    }"#;

    let config: TestConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.account_id, "ABC123");
    assert!(matches!(config.api.credentials.into_token(), Some(Token::Certificate { .. })));
  }
}
