// SPDX-License-Identifier: GPL-3.0-or-later

//! Historical price retrieval, the endpoint that most directly exercises
//! the pagination combinator (§4.2) together with the fixed-point price
//! codec and the broker's local-time date formatting.

use chrono::offset::FixedOffset;

use futures::Stream;

use num_decimal::Num;

use serde::Deserialize;

use crate::client::Client;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::fixed_point::decode as decode_price;
use crate::pagination::send_paginating;
use crate::time_util::format_local_datetime;
use crate::Str;


/// One OHLC candle for a price resolution.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Candle {
  /// The candle's local-time open date, as reported by the server.
  #[serde(rename = "snapshotTime")]
  pub date: String,
  /// The opening (bid, ask) pair.
  #[serde(rename = "openPrice")]
  pub open: BidAsk,
  /// The closing (bid, ask) pair.
  #[serde(rename = "closePrice")]
  pub close: BidAsk,
  /// The lowest (bid, ask) pair observed in the candle.
  #[serde(rename = "lowPrice")]
  pub low: BidAsk,
  /// The highest (bid, ask) pair observed in the candle.
  #[serde(rename = "highPrice")]
  pub high: BidAsk,
  /// The number of ticks observed in the candle.
  #[serde(rename = "lastTradedVolume")]
  pub volume: u64,
}

/// A (bid, ask) pair as reported on the wire: raw integers scaled by
/// `10^5`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct RawBidAsk {
  bid: i64,
  ask: i64,
}

/// A decoded (bid, ask) price pair.
#[derive(Clone, Debug, PartialEq)]
pub struct BidAsk {
  /// The bid price.
  pub bid: Num,
  /// The ask price.
  pub ask: Num,
}

impl<'de> serde::Deserialize<'de> for BidAsk {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let raw = RawBidAsk::deserialize(deserializer)?;
    Ok(BidAsk { bid: decode_price(raw.bid), ask: decode_price(raw.ask) })
  }
}

/// Metadata describing the page just fetched.
#[derive(Clone, Debug, Deserialize, PartialEq)]
struct PageMetadata {
  #[serde(rename = "pageData")]
  page: PageData,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
struct PageData {
  #[serde(rename = "pageSize")]
  size: u32,
  #[serde(rename = "pageNumber")]
  number: u32,
  #[serde(rename = "totalPages")]
  total: u32,
}

/// The response to a `GET /prices/{epic}` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
struct PricesPage {
  prices: Vec<Candle>,
  metadata: PageMetadata,
}

/// The input to one page of a `GET /prices/{epic}` request.
#[derive(Clone, Debug)]
pub(crate) struct PricesInput {
  pub epic: Str,
  pub resolution: Str,
  pub page_size: u32,
  pub page_number: u32,
  /// The inclusive `from`/`to` local-time boundaries, precomputed once
  /// (before the first page is requested) rather than reformatted on
  /// every page.
  pub range: Option<(Str, Str)>,
}

/// The representation of a single `GET /prices/{epic}` page request.
#[derive(Clone, Debug)]
pub(crate) struct Get;

impl Endpoint for Get {
  type Input = PricesInput;
  type Output = PricesPage;
  type Error = GetError;

  fn path(input: &Self::Input) -> Str {
    format!("/prices/{}", input.epic).into()
  }

  fn query(input: &Self::Input) -> Option<Str> {
    let mut query = format!(
      "resolution={}&pageSize={}&pageNumber={}",
      input.resolution, input.page_size, input.page_number
    );
    if let Some((from, to)) = &input.range {
      query.push_str(&format!("&from={}&to={}", from, to));
    }
    Some(query.into())
  }
}

EndpointDef! {
  Get,
  Ok => PricesPage, [
    /// The page was retrieved successfully.
    OK,
  ],
  Err => GetError, [
    /// No market exists under the given epic.
    NOT_FOUND => NotFound,
  ]
}


/// Validate the pagination parameters client-side, before any network
/// I/O, per the "non-positive page size/number fails immediately"
/// boundary.
fn validate_page_params(page_size: u32, page_number: u32) -> Result<(), Error> {
  if page_size == 0 {
    return Err(Error::invalid_request("page size must be positive"))
  }
  if page_number == 0 {
    return Err(Error::invalid_request("page number must be positive"))
  }
  Ok(())
}

/// Fetch the full, paginated history of candles for `epic` at the given
/// `resolution`, flattening every page into a single stream of
/// [`Candle`]s in server order.
///
/// `range`, if given, is resolved to the broker's local-time format
/// exactly once, up front — the *deferred precomputation* stage of the
/// pipeline — rather than on every page request.
pub fn history(
  client: &Client,
  epic: impl Into<Str>,
  resolution: impl Into<Str>,
  page_size: u32,
  range: Option<(std::time::SystemTime, std::time::SystemTime, FixedOffset)>,
) -> Result<impl Stream<Item = Result<Candle, Error>> + '_, Error> {
  validate_page_params(page_size, 1)?;

  let epic = epic.into();
  let resolution = resolution.into();
  let range: Option<(Str, Str)> = range
    .map(|(from, to, offset)| (format_local_datetime(from, offset).into(), format_local_datetime(to, offset).into()));

  Ok(send_paginating(move |cursor| {
    let epic = epic.clone();
    let resolution = resolution.clone();
    let range = range.clone();
    let page_number: u32 = cursor.as_deref().unwrap_or("1").parse().unwrap_or(1);

    async move {
      let input = PricesInput { epic, resolution, page_size, page_number, range };
      let page = client.issue::<Get>(input).await.map_err(Error::from)?;
      let next = if page.metadata.page.number < page.metadata.page.total {
        Some((page.metadata.page.number + 1).to_string())
      } else {
        None
      };
      Ok((page.prices, next))
    }
  }))
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[test]
  fn decodes_bid_ask_pair_from_scaled_integers() {
    let candle: Candle = from_json(
      r#"{
        "snapshotTime": "2021/01/21 12:00:00",
        "openPrice": {"bid": 123450, "ask": 123470},
        "closePrice": {"bid": 123460, "ask": 123480},
        "lowPrice": {"bid": 123400, "ask": 123420},
        "highPrice": {"bid": 123500, "ask": 123520},
        "lastTradedVolume": 42
      }"#,
    )
    .unwrap();

    assert_eq!(candle.open.bid, Num::new(12345, 10));
    assert_eq!(candle.volume, 42);
  }

  #[test]
  fn rejects_non_positive_page_size_before_dispatch() {
    let err = validate_page_params(0, 1).unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::InvalidRequest);
  }

  #[test]
  fn rejects_non_positive_page_number_before_dispatch() {
    let err = validate_page_params(1, 0).unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::InvalidRequest);
  }
}
