// SPDX-License-Identifier: GPL-3.0-or-later

//! Bid/ask prices are carried over the wire (both HTTPS and streaming)
//! as integers scaled by a fixed power of ten rather than as floating
//! point numbers, so that two parties never disagree on rounding. This
//! module centralizes the scale and the (de)serialization glue.

use num_decimal::Num;

use serde::de::Deserializer;
use serde::Deserialize;


/// The scale applied to every wire-level price: a raw value `v`
/// represents the price `v / 10^SCALE_EXPONENT`.
const SCALE_EXPONENT: u32 = 5;

fn scale() -> i64 {
  10i64.pow(SCALE_EXPONENT)
}

/// Decode a raw scaled integer into an exact [`Num`].
pub(crate) fn decode(raw: i64) -> Num {
  Num::new(raw, scale())
}

/// Encode a price into its raw scaled integer representation.
///
/// # Panics
/// Panics if `price` does not evenly divide into the fixed scale; the
/// broker never reports prices with finer granularity than
/// `10^-SCALE_EXPONENT`, so this indicates a logic error rather than an
/// expected runtime condition.
pub(crate) fn encode(price: &Num) -> i64 {
  let scaled = price * scale();
  assert!(scaled.is_integer(), "price has sub-scale precision: {}", price);
  scaled.to_integer()
}

/// Deserialize a raw scaled integer (as sent by the broker) into a
/// [`Num`].
pub(crate) fn price_from_scaled<'de, D>(deserializer: D) -> Result<Num, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = i64::deserialize(deserializer)?;
  Ok(decode(raw))
}

/// Deserialize an optional raw scaled integer into an optional [`Num`].
pub(crate) fn optional_price_from_scaled<'de, D>(
  deserializer: D,
) -> Result<Option<Num>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<i64>::deserialize(deserializer)? {
    Some(raw) => Ok(Some(decode(raw))),
    None => Ok(None),
  }
}

/// Parse a streaming field value (always transmitted as a string) into
/// a scaled price. Used by [`crate::streaming::Update::price_field`] to
/// decode bid/offer fields carried over the streaming channel.
pub(crate) fn price_from_streaming_field(field: &str) -> Result<Num, crate::error::Error> {
  let raw: i64 = field.parse().map_err(|_| {
    crate::error::Error::invalid_response(format!("not a scaled price: {:?}", field))
  })?;
  Ok(decode(raw))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_scales_down() {
    let price = decode(1_234_500);
    assert_eq!(price, Num::new(12345, 100));
  }

  #[test]
  fn encode_scales_up() {
    let price = Num::new(12345, 100);
    assert_eq!(encode(&price), 1_234_500);
  }

  #[test]
  fn round_trips_through_scaled_integer() {
    for raw in [0i64, 1, 100_000, 99_999, 123_456_789] {
      let price = decode(raw);
      assert_eq!(encode(&price), raw);
    }
  }

  #[test]
  fn streaming_field_parses_same_as_wire_integer() {
    let price = price_from_streaming_field("1234500").unwrap();
    assert_eq!(price, decode(1_234_500));
  }

  #[test]
  fn streaming_field_rejects_non_integers() {
    let err = price_from_streaming_field("not-a-number").unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::InvalidResponse);
  }
}
