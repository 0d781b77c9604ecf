// SPDX-License-Identifier: GPL-3.0-or-later

//! Account activity history: a paginated endpoint accepting an optional
//! FIQL filter expression.

use std::time::SystemTime;

use futures::Stream;

use serde::Deserialize;

use crate::client::Client;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::pagination::send_paginating;
use crate::time_util::system_time_from_str;
use crate::Str;


/// One historical activity entry (a deal, an adjustment, …).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct Activity {
  /// The broker-issued deal identifier this activity pertains to.
  #[serde(rename = "dealId")]
  pub deal_id: String,
  /// The activity's human-readable type, e.g. `"POSITION"`.
  #[serde(rename = "type")]
  pub kind: String,
  /// The time the activity occurred, as reported by the server.
  #[serde(rename = "date", deserialize_with = "system_time_from_str")]
  pub date: SystemTime,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
struct ActivityPage {
  activities: Vec<Activity>,
  metadata: PageMetadata,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
struct PageMetadata {
  paging: Paging,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
struct Paging {
  next: Option<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct ActivityInput {
  pub filter: Option<Str>,
  pub page_size: u32,
  pub cursor: Option<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct Get;

impl Endpoint for Get {
  type Input = ActivityInput;
  type Output = ActivityPage;
  type Error = GetError;

  fn path(_input: &Self::Input) -> Str {
    "/history/activity".into()
  }

  fn query(input: &Self::Input) -> Option<Str> {
    let mut query = format!("pageSize={}", input.page_size);
    if let Some(filter) = &input.filter {
      query.push_str(&format!("&filter={}", filter));
    }
    if let Some(cursor) = &input.cursor {
      query.push_str(&format!("&from={}", cursor));
    }
    Some(query.into())
  }
}

EndpointDef! {
  Get,
  Ok => ActivityPage, [
    /// The page was retrieved successfully.
    OK,
  ],
  Err => GetError, [
    /// The FIQL filter expression could not be parsed.
    BAD_REQUEST => InvalidFilter,
  ]
}


/// Validate a FIQL filter client-side: the server always rejects an
/// empty-but-present filter, so this is caught before any I/O.
fn validate_filter(filter: Option<&str>) -> Result<(), Error> {
  if filter == Some("") {
    return Err(Error::invalid_request("FIQL filter must not be empty"))
  }
  Ok(())
}

/// Fetch the full activity history, optionally narrowed by a FIQL
/// `filter` expression, flattening every page in server order.
pub fn history(
  client: &Client,
  filter: Option<impl Into<Str>>,
  page_size: u32,
) -> Result<impl Stream<Item = Result<Activity, Error>> + '_, Error> {
  let filter = filter.map(Into::into);
  validate_filter(filter.as_deref())?;

  Ok(send_paginating(move |cursor| {
    let filter = filter.clone();
    async move {
      let input = ActivityInput { filter, page_size, cursor };
      let page = client.issue::<Get>(input).await.map_err(Error::from)?;
      Ok((page.activities, page.metadata.paging.next))
    }
  }))
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_filter_is_rejected_before_dispatch() {
    let err = validate_filter(Some("")).unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::InvalidRequest);
  }

  #[test]
  fn absent_filter_is_accepted() {
    assert!(validate_filter(None).is_ok());
  }
}
