// SPDX-License-Identifier: GPL-3.0-or-later

//! Market detail and search lookups.

use num_decimal::Num;

use serde::Deserialize;

use crate::fixed_point::optional_price_from_scaled;
use crate::util::vec_from_str;
use crate::Str;


/// A market's current tradeable snapshot.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct Snapshot {
  /// The current bid price, or `None` if the market is closed.
  #[serde(rename = "bid", deserialize_with = "optional_price_from_scaled")]
  pub bid: Option<Num>,
  /// The current offer price, or `None` if the market is closed.
  #[serde(rename = "offer", deserialize_with = "optional_price_from_scaled")]
  pub offer: Option<Num>,
  /// Whether the market is currently tradeable.
  #[serde(rename = "marketStatus")]
  pub status: String,
}

/// The response to a `GET /markets/{epic}` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MarketDetails {
  /// The instrument's opaque identifier.
  pub epic: String,
  /// The human-readable instrument name.
  #[serde(rename = "instrumentName")]
  pub name: String,
  /// The current tradeable snapshot.
  pub snapshot: Snapshot,
}

/// The representation of a `GET /markets/{epic}` request.
#[derive(Clone, Debug)]
pub struct Get {
  /// The instrument to look up.
  pub epic: Str,
}

impl crate::endpoint::Endpoint for Get {
  type Input = Str;
  type Output = MarketDetails;
  type Error = GetError;

  fn path(input: &Self::Input) -> Str {
    format!("/markets/{}", input).into()
  }
}

EndpointDef! {
  Get,
  Ok => MarketDetails, [
    /// The market was found.
    OK,
  ],
  Err => GetError, [
    /// No market exists under the given epic.
    NOT_FOUND => NotFound,
  ]
}


/// One match in a market search result.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MarketSummary {
  /// The instrument's opaque identifier.
  pub epic: String,
  /// The human-readable instrument name.
  #[serde(rename = "instrumentName")]
  pub name: String,
}

/// The response to a `GET /markets?searchTerm=` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SearchResult {
  /// The matching markets, possibly empty (the server may report `null`
  /// instead of an empty array when there are no matches).
  #[serde(rename = "markets", deserialize_with = "vec_from_str")]
  pub markets: Vec<MarketSummary>,
}

/// The representation of a `GET /markets?searchTerm=` request.
///
/// An empty search term is rejected client-side before dispatch.
#[derive(Clone, Debug)]
pub struct Search;

impl crate::endpoint::Endpoint for Search {
  type Input = Str;
  type Output = SearchResult;
  type Error = SearchError;

  fn path(_input: &Self::Input) -> Str {
    "/markets".into()
  }

  fn query(input: &Self::Input) -> Option<Str> {
    Some(
      serde_urlencoded::to_string([("searchTerm", input.as_ref())])
        .unwrap_or_default()
        .into(),
    )
  }
}

/// Validate a search term client-side, before any request is built.
///
/// An empty term is always rejected by the server; failing here avoids
/// the round trip.
pub(crate) fn validate_search_term(term: &str) -> Result<(), crate::error::Error> {
  if term.is_empty() {
    return Err(crate::error::Error::invalid_request("search term must not be empty"))
  }
  Ok(())
}

EndpointDef! {
  Search,
  Ok => SearchResult, [
    /// The search completed, possibly with zero matches.
    OK,
  ],
  Err => SearchError, []
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[test]
  fn parse_market_details() {
    let response = r#"{
      "epic": "CS.D.EURUSD.CFD.IP",
      "instrumentName": "Spot FX EUR/USD",
      "snapshot": {"bid": 123450, "offer": 123470, "marketStatus": "TRADEABLE"}
    }"#;

    let details = from_json::<MarketDetails>(response).unwrap();
    assert_eq!(details.snapshot.bid, Some(Num::new(12345, 10)));
    assert_eq!(details.snapshot.offer, Some(Num::new(12347, 10)));
  }

  #[test]
  fn parse_search_result_with_null_markets() {
    let result = from_json::<SearchResult>(r#"{"markets": null}"#).unwrap();
    assert!(result.markets.is_empty());
  }

  #[test]
  fn empty_search_term_is_rejected_before_dispatch() {
    let err = validate_search_term("").unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::InvalidRequest);
  }

  #[test]
  fn non_empty_search_term_is_accepted() {
    assert!(validate_search_term("EURUSD").is_ok());
  }
}
