// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use serde::Deserializer;


/// Deserialize a `Vec` from a field that the server may report as
/// `null` instead of an empty array.
pub(crate) fn vec_from_str<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  let vec = Option::<Vec<T>>::deserialize(deserializer)?;
  Ok(vec.unwrap_or_default())
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[derive(Debug, Deserialize)]
  struct Wrapper {
    #[serde(deserialize_with = "vec_from_str")]
    items: Vec<u32>,
  }

  #[test]
  fn null_deserializes_to_empty_vec() {
    let wrapper: Wrapper = from_json(r#"{"items": null}"#).unwrap();
    assert_eq!(wrapper.items, Vec::<u32>::new());
  }

  #[test]
  fn array_deserializes_as_is() {
    let wrapper: Wrapper = from_json(r#"{"items": [1, 2, 3]}"#).unwrap();
    assert_eq!(wrapper.items, vec![1, 2, 3]);
  }
}
