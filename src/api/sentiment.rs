// SPDX-License-Identifier: GPL-3.0-or-later

//! Client sentiment: the simplest possible illustrative endpoint, a
//! single unparameterized `GET`.

use serde::Deserialize;

use crate::Str;


/// The proportion of clients holding long vs. short positions on a
/// market.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Sentiment {
  /// The percentage of clients currently long.
  #[serde(rename = "longPositionPercentage")]
  pub long_percentage: f64,
  /// The percentage of clients currently short.
  #[serde(rename = "shortPositionPercentage")]
  pub short_percentage: f64,
}

/// The representation of a `GET /clientsentiment/{marketId}` request.
#[derive(Clone, Debug)]
pub struct Get {
  /// The market to look up sentiment for.
  pub market_id: Str,
}

impl crate::endpoint::Endpoint for Get {
  type Input = Str;
  type Output = Sentiment;
  type Error = GetError;

  fn path(input: &Self::Input) -> Str {
    format!("/clientsentiment/{}", input).into()
  }
}

EndpointDef! {
  Get,
  Ok => Sentiment, [
    /// Sentiment for the market was retrieved successfully.
    OK,
  ],
  Err => GetError, [
    /// No sentiment data exists for the given market.
    NOT_FOUND => NotFound,
  ]
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[test]
  fn parse_sentiment() {
    let sentiment =
      from_json::<Sentiment>(r#"{"longPositionPercentage": 62.5, "shortPositionPercentage": 37.5}"#)
        .unwrap();
    assert_eq!(sentiment.long_percentage, 62.5);
  }
}
