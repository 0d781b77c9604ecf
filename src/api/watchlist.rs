// SPDX-License-Identifier: GPL-3.0-or-later

//! Watchlist CRUD: list, create, and delete, illustrating a `DELETE`
//! request with no body alongside the familiar `GET`/`POST` shapes.

use serde::Deserialize;
use serde::Serialize;

use crate::util::vec_from_str;
use crate::Str;


/// One saved watchlist.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Watchlist {
  /// The watchlist's broker-issued identifier.
  pub id: String,
  /// The watchlist's display name.
  pub name: String,
  /// Whether this watchlist was created by the broker (and thus cannot
  /// be deleted).
  #[serde(rename = "editable")]
  pub editable: bool,
}

/// The response to a `GET /watchlists` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Watchlists {
  /// Every watchlist owned by the account.
  #[serde(rename = "watchlists", deserialize_with = "vec_from_str")]
  pub watchlists: Vec<Watchlist>,
}

/// The representation of a `GET /watchlists` request.
#[derive(Clone, Copy, Debug)]
pub struct List;

impl crate::endpoint::Endpoint for List {
  type Input = ();
  type Output = Watchlists;
  type Error = ListError;

  fn path(_input: &Self::Input) -> Str {
    "/watchlists".into()
  }
}

EndpointDef! {
  List,
  Ok => Watchlists, [
    /// The watchlist list was retrieved successfully.
    OK,
  ],
  Err => ListError, []
}


/// The body of a `POST /watchlists` request.
#[derive(Clone, Debug, Serialize)]
pub struct NewWatchlist {
  /// The new watchlist's display name.
  pub name: Str,
  /// The epics to seed the watchlist with.
  pub epics: Vec<Str>,
}

/// The outcome of creating a watchlist.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Created {
  /// The new watchlist's broker-issued identifier.
  #[serde(rename = "watchlistId")]
  pub id: String,
}

/// The representation of a `POST /watchlists` request.
#[derive(Clone, Debug)]
pub struct Create;

impl crate::endpoint::Endpoint for Create {
  type Input = NewWatchlist;
  type Output = Created;
  type Error = CreateError;

  fn method() -> hyper::Method {
    hyper::Method::POST
  }

  fn path(_input: &Self::Input) -> Str {
    "/watchlists".into()
  }

  fn body(input: &Self::Input) -> Result<hyper::body::Bytes, serde_json::Error> {
    serde_json::to_vec(input).map(hyper::body::Bytes::from)
  }
}

EndpointDef! {
  Create,
  Ok => Created, [
    /// The watchlist was created successfully.
    OK,
  ],
  Err => CreateError, [
    /// A watchlist with this name already exists.
    CONFLICT => AlreadyExists,
  ]
}


/// The representation of a `DELETE /watchlists/{id}` request.
#[derive(Clone, Debug)]
pub struct Delete;

impl crate::endpoint::Endpoint for Delete {
  type Input = Str;
  type Output = ();
  type Error = DeleteError;

  fn method() -> hyper::Method {
    hyper::Method::DELETE
  }

  fn path(input: &Self::Input) -> Str {
    format!("/watchlists/{}", input).into()
  }

  fn parse(_body: &[u8]) -> Result<Self::Output, Self::Error> {
    // A successful deletion carries no body worth decoding.
    Ok(())
  }
}

EndpointDef! {
  Delete,
  Ok => (), [
    /// The watchlist was deleted successfully.
    OK,
  ],
  Err => DeleteError, [
    /// The watchlist is one of the broker's own and cannot be deleted.
    FORBIDDEN => NotEditable,
  ]
}


#[cfg(test)]
mod tests {
  use super::*;

  use serde_json::from_str as from_json;

  #[test]
  fn parse_watchlists_with_null_list() {
    let watchlists = from_json::<Watchlists>(r#"{"watchlists": null}"#).unwrap();
    assert!(watchlists.watchlists.is_empty());
  }

  #[test]
  fn parse_single_watchlist() {
    let watchlists =
      from_json::<Watchlists>(r#"{"watchlists": [{"id": "1", "name": "Majors", "editable": true}]}"#)
        .unwrap();
    assert_eq!(watchlists.watchlists[0].name, "Majors");
  }
}
