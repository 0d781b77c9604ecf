// SPDX-License-Identifier: GPL-3.0-or-later

//! The subscription multiplexer: registers typed field subscriptions
//! against a [`Channel`]'s session and exposes a per-subscription update
//! stream.
//!
//! Grounded on the reference client's subscription setup (`Subscription::new`,
//! `set_data_adapter`, `set_requested_snapshot`, `add_listener`,
//! `LightstreamerClient::subscribe`) and on this crate's own
//! `send_paginating`/`status_stream` pattern of turning a callback-driven
//! API into a pollable [`Stream`] via an internal channel.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::Context as TaskContext;
use std::task::Poll;

use async_trait::async_trait;

use futures::Stream;

use lightstreamer_rs::client::LightstreamerClient;
use lightstreamer_rs::subscription::ItemUpdate;
use lightstreamer_rs::subscription::Snapshot;
use lightstreamer_rs::subscription::Subscription as LsSubscription;
use lightstreamer_rs::subscription::SubscriptionListener;
use lightstreamer_rs::subscription::SubscriptionMode as LsSubscriptionMode;

use num_decimal::Num;

use tokio::sync::mpsc;
use tokio::sync::watch;

use tracing::warn;

use crate::error::Error;
use crate::error::Kind;
use crate::fixed_point::price_from_streaming_field;
use crate::streaming::channel::Channel;
use crate::streaming::channel::SubscriptionRegistry;


/// The subscription mode, controlling snapshot and update semantics (see
/// the crate-level glossary entry for `Mode`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
  /// Every update replaces the previous value for its field.
  Merge,
  /// Every update is delivered even if identical to the previous one.
  Distinct,
  /// No merging, no snapshot: updates are forwarded as-is.
  Raw,
  /// Key-based `ADD`/`UPDATE`/`DELETE` semantics, with optional two-level
  /// fields.
  Command,
}

impl From<Mode> for LsSubscriptionMode {
  fn from(mode: Mode) -> Self {
    match mode {
      Mode::Merge => LsSubscriptionMode::Merge,
      Mode::Distinct => LsSubscriptionMode::Distinct,
      Mode::Raw => LsSubscriptionMode::Raw,
      Mode::Command => LsSubscriptionMode::Command,
    }
  }
}

/// One field's value as carried by an [`Update`]: the value itself (absent
/// on e.g. a `DELETE` in `Command` mode) and whether it changed since the
/// last update for this item.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldValue {
  /// The field's current value, or `None` if the server reported it as
  /// absent.
  pub value: Option<String>,
  /// Whether this value differs from the previous update for the same
  /// item.
  pub changed: bool,
}

/// One update delivered by a subscription: a mapping from field name to
/// its current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
  /// The subscription item this update pertains to (e.g. `MARKET:CS.D.EURUSD`).
  pub item: String,
  /// The field values carried by this update.
  pub fields: BTreeMap<String, FieldValue>,
}

impl Update {
  /// Decode `field` as a scaled price, per the wire's fixed-point price
  /// encoding (see [`crate::fixed_point`]).
  ///
  /// Fails with [`Kind::InvalidResponse`] if the field is absent or is not
  /// a recognized scaled integer, e.g. when called against a field that
  /// does not carry a price (`BID`, `OFFER`, and similar fields do).
  pub fn price_field(&self, field: &str) -> Result<Num, Error> {
    let raw = self
      .fields
      .get(field)
      .and_then(|value| value.value.as_deref())
      .ok_or_else(|| Error::invalid_response(format!("missing price field: {:?}", field)))?;
    price_from_streaming_field(raw)
  }
}

/// A non-fatal sideband event surfaced alongside ordinary updates.
#[derive(Clone, Debug)]
pub enum Event {
  /// An ordinary update.
  Update(Update),
  /// The server reported that it dropped `count` consecutive updates for
  /// this subscription (unfiltered dispatching modes only).
  LostUpdates {
    /// The item the dropped updates pertained to.
    item: String,
    /// The number of updates dropped.
    count: u32,
  },
}

struct Forwarder {
  tx: mpsc::UnboundedSender<Result<Event, Error>>,
  closed: watch::Sender<bool>,
}

#[async_trait]
impl SubscriptionListener for Forwarder {
  async fn on_item_update(&self, update: &ItemUpdate) {
    let item = update.item_name.clone().unwrap_or_default();
    let mut fields = BTreeMap::new();
    for name in update.get_fields().keys() {
      let value = update.get_value(name).cloned();
      let changed = update.is_value_changed(name);
      fields.insert(name.clone(), FieldValue { value, changed });
    }
    let _ = self.tx.send(Ok(Event::Update(Update { item, fields })));
  }

  async fn on_item_lost_updates(&self, item_name: Option<&str>, lost_updates: i32) {
    let item = item_name.unwrap_or_default().to_string();
    let _ = self.tx.send(Ok(Event::LostUpdates { item, count: lost_updates.max(0) as u32 }));
  }

  async fn on_subscription_error(&self, code: i32, message: Option<&str>) {
    let message = message.unwrap_or("subscription failed").to_string();
    let _ = self.tx.send(Err(Error::subscription_failed(code, message)));
  }

  async fn on_unsubscription(&self) {
    let _ = self.closed.send(true);
  }
}


/// A stream of the updates (and sideband events) produced by one live
/// subscription.
///
/// Completes when the broker reports the subscription unsubscribed, when
/// the owning channel's [`unsubscribe_all`][Channel::unsubscribe_all] is
/// called, or when the channel fully disconnects. Dropping the stream
/// itself issues an unsubscribe to the broker session, so a subscription
/// never outlives every handle to its stream.
pub struct SubscriptionStream {
  rx: mpsc::UnboundedReceiver<Result<Event, Error>>,
  closed: watch::Receiver<bool>,
  id: u64,
  registry: SubscriptionRegistry,
}

impl std::fmt::Debug for SubscriptionStream {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SubscriptionStream").field("id", &self.id).finish_non_exhaustive()
  }
}

impl Stream for SubscriptionStream {
  type Item = Result<Event, Error>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
    if *self.closed.borrow() {
      return Poll::Ready(None)
    }
    self.rx.poll_recv(cx)
  }
}

impl Drop for SubscriptionStream {
  fn drop(&mut self) {
    let registry = self.registry.clone();
    let id = self.id;
    tokio::spawn(async move { registry.unsubscribe_one(id).await });
  }
}


/// Register a subscription on `channel` and return a stream of the
/// updates (and sideband events) it produces.
///
/// `second_level_fields` names the fields of a two-level `Command`-mode
/// subscription's second level, if any; pass an empty `Vec` for a plain
/// (non two-level) subscription. Their wire positions are computed by
/// [`second_level_positions`] and appended after `fields` in the request
/// sent to the broker.
///
/// The returned stream completes when the caller drops it, the channel
/// fully disconnects, or [`unsubscribe_all`][Channel::unsubscribe_all] is
/// called; it terminates with an error if the server reports a
/// subscription-level failure.
pub async fn subscribe(
  channel: &Channel,
  mode: Mode,
  items: Vec<String>,
  fields: Vec<String>,
  second_level_fields: Vec<String>,
  snapshot: bool,
) -> Result<SubscriptionStream, Error> {
  if items.is_empty() {
    return Err(Error::invalid_request("subscription must name at least one item"))
  }
  if fields.is_empty() {
    return Err(Error::invalid_request("subscription must name at least one field"))
  }

  let mut combined_fields = fields.clone();
  if !second_level_fields.is_empty() {
    let positions = second_level_positions(&fields, &second_level_fields);
    let mut ordered: Vec<(&String, &usize)> = positions.iter().collect();
    ordered.sort_by_key(|&(_, position)| *position);
    combined_fields.extend(ordered.into_iter().map(|(name, _)| name.clone()));
  }

  let mut subscription = LsSubscription::new(mode.into(), Some(items), Some(combined_fields))
    .map_err(|err| Error::new(Kind::InvalidRequest, "failed to build subscription").with_cause(err))?;
  subscription
    .set_requested_snapshot(Some(if snapshot { Snapshot::Yes } else { Snapshot::No }))
    .map_err(|err| Error::new(Kind::InvalidRequest, "failed to set snapshot mode").with_cause(err))?;

  let registry = channel.registry();
  let (id, closed_tx, closed_rx) = registry.register(subscription.clone());

  let (tx, rx) = mpsc::unbounded_channel();
  subscription.add_listener(Box::new(Forwarder { tx, closed: closed_tx }));

  let client = channel.client();
  let sender = {
    let guard = client.lock().await;
    guard.subscription_sender.clone()
  };
  LightstreamerClient::subscribe(sender, subscription).await;

  Ok(SubscriptionStream { rx, closed: closed_rx, id, registry })
}

/// Compute the second-level field position for a two-level `Command`-mode
/// subscription: second-level fields begin immediately after the last
/// first-level field, with first-level names winning on a name conflict.
///
/// Returns the 1-based positions assigned to `second_level_fields`,
/// skipping any name already present in `first_level_fields`.
pub fn second_level_positions(
  first_level_fields: &[String],
  second_level_fields: &[String],
) -> BTreeMap<String, usize> {
  let mut positions = BTreeMap::new();
  let mut next = first_level_fields.len() + 1;
  for name in second_level_fields {
    if first_level_fields.iter().any(|f| f == name) {
      warn!(field = %name, "second-level field name shadowed by a first-level field");
      continue
    }
    positions.insert(name.clone(), next);
    next += 1;
  }
  positions
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_level_fields_start_after_first_level_max() {
    let first = vec!["BID".to_string(), "OFFER".to_string()];
    let second = vec!["UPDATE_TIME".to_string(), "MARKET_STATE".to_string()];
    let positions = second_level_positions(&first, &second);
    assert_eq!(positions["UPDATE_TIME"], 3);
    assert_eq!(positions["MARKET_STATE"], 4);
  }

  #[test]
  fn first_level_name_wins_on_conflict() {
    let first = vec!["BID".to_string()];
    let second = vec!["BID".to_string(), "OFFER".to_string()];
    let positions = second_level_positions(&first, &second);
    assert!(!positions.contains_key("BID"));
    assert_eq!(positions["OFFER"], 2);
  }

  #[test]
  fn price_field_decodes_a_scaled_value() {
    let mut fields = BTreeMap::new();
    fields.insert("BID".to_string(), FieldValue { value: Some("1234500".to_string()), changed: true });
    let update = Update { item: "MARKET:CS.D.EURUSD.CFD.IP".to_string(), fields };
    assert_eq!(update.price_field("BID").unwrap(), Num::new(12345, 100));
  }

  #[test]
  fn price_field_rejects_a_missing_field() {
    let update = Update::default();
    let err = update.price_field("BID").unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidResponse);
  }
}
