// SPDX-License-Identifier: GPL-3.0-or-later

//! Working orders and open positions: a POST endpoint (create) and a GET
//! endpoint (list), illustrating a request body and a discriminated
//! response respectively.

use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

use crate::fixed_point::price_from_scaled;
use crate::time_util::optional_system_time_from_str;
use crate::util::vec_from_str;
use crate::Str;

use num_decimal::Num;


/// The direction of a deal.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Direction {
  /// Buy.
  #[serde(rename = "BUY")]
  Buy,
  /// Sell.
  #[serde(rename = "SELL")]
  Sell,
}

/// The outcome of a deal confirmation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "dealStatus")]
pub enum DealOutcome {
  /// The deal was accepted and opened or modified a position.
  #[serde(rename = "ACCEPTED")]
  Accepted {
    /// The broker-issued deal identifier.
    #[serde(rename = "dealId")]
    deal_id: String,
  },
  /// The deal was refused.
  #[serde(rename = "REJECTED")]
  Rejected {
    /// The reason the deal was rejected.
    #[serde(rename = "reason")]
    reason: String,
  },
}

/// The body of a `POST /positions/otc` request (open a new position).
#[derive(Clone, Debug, Serialize)]
pub struct OpenPosition {
  /// The instrument to trade.
  pub epic: Str,
  /// Buy or sell.
  pub direction: Direction,
  /// The number of contracts/shares to trade.
  pub size: Num,
  /// Whether to use the broker's guaranteed stop feature.
  #[serde(rename = "guaranteedStop")]
  pub guaranteed_stop: bool,
}

/// The representation of a `POST /positions/otc` request.
#[derive(Clone, Debug)]
pub struct Open;

impl crate::endpoint::Endpoint for Open {
  type Input = OpenPosition;
  type Output = DealOutcome;
  type Error = OpenError;

  fn method() -> hyper::Method {
    hyper::Method::POST
  }

  fn version() -> u16 {
    2
  }

  fn path(_input: &Self::Input) -> Str {
    "/positions/otc".into()
  }

  fn body(input: &Self::Input) -> Result<hyper::body::Bytes, serde_json::Error> {
    serde_json::to_vec(input).map(hyper::body::Bytes::from)
  }
}

EndpointDef! {
  Open,
  Ok => DealOutcome, [
    /// The position request was accepted for processing.
    OK,
  ],
  Err => OpenError, [
    /// The requested size, stop, or limit violates the market's dealing
    /// rules.
    BAD_REQUEST => InvalidParameters,
  ]
}


/// One currently open position.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct Position {
  /// The broker-issued deal identifier.
  #[serde(rename = "dealId")]
  pub deal_id: String,
  /// The instrument traded.
  pub epic: String,
  /// Buy or sell.
  pub direction: Direction,
  /// The size of the position.
  pub size: Num,
  /// The price at which the position was opened, decoded from its
  /// scaled wire representation.
  #[serde(rename = "level", deserialize_with = "price_from_scaled")]
  pub open_level: Num,
  /// When the position was opened, if the server reported it (older
  /// accounts may carry positions opened before this field existed).
  #[serde(rename = "createdDateUTC", default, deserialize_with = "optional_system_time_from_str")]
  pub created: Option<SystemTime>,
}

/// The response to a `GET /positions` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Positions {
  /// Every currently open position (the server reports `null` rather
  /// than `[]` when there are none).
  #[serde(rename = "positions", deserialize_with = "vec_from_str")]
  pub positions: Vec<Position>,
}

/// The representation of a `GET /positions` request.
#[derive(Clone, Copy, Debug)]
pub struct List;

impl crate::endpoint::Endpoint for List {
  type Input = ();
  type Output = Positions;
  type Error = ListError;

  fn path(_input: &Self::Input) -> Str {
    "/positions".into()
  }
}

EndpointDef! {
  List,
  Ok => Positions, [
    /// The position list was retrieved successfully.
    OK,
  ],
  Err => ListError, []
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[test]
  fn parse_accepted_outcome() {
    let outcome = from_json::<DealOutcome>(r#"{"dealStatus": "ACCEPTED", "dealId": "DIAAAA"}"#).unwrap();
    assert_eq!(outcome, DealOutcome::Accepted { deal_id: "DIAAAA".to_string() });
  }

  #[test]
  fn parse_rejected_outcome() {
    let outcome =
      from_json::<DealOutcome>(r#"{"dealStatus": "REJECTED", "reason": "INSUFFICIENT_FUNDS"}"#).unwrap();
    assert_eq!(outcome, DealOutcome::Rejected { reason: "INSUFFICIENT_FUNDS".to_string() });
  }

  #[test]
  fn parse_positions_with_null_list() {
    let positions = from_json::<Positions>(r#"{"positions": null}"#).unwrap();
    assert!(positions.positions.is_empty());
  }
}
