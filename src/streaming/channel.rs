// SPDX-License-Identifier: GPL-3.0-or-later

//! The streaming channel: a single long-lived Lightstreamer session tied
//! to one [`Credentials`] snapshot, exposing `connect`/`disconnect` and a
//! de-duplicated status stream.
//!
//! Grounded on `lightstreamer_rs::client::LightstreamerClient` usage (a
//! `ClientListener` forwarding `on_status_change` callbacks, a
//! subscription sender used to register [`Subscription`][lightstreamer_rs::subscription::Subscription]
//! objects) the way the broker-specific reference client wires it up, and
//! on this crate's own [`CredentialStore`][crate::session::CredentialStore]
//! for the single-writer/many-reader status broadcast discipline.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use futures::stream::unfold;
use futures::Stream;

use lightstreamer_rs::client::ClientListener;
use lightstreamer_rs::client::LightstreamerClient;
use lightstreamer_rs::client::Transport;
use lightstreamer_rs::subscription::Subscription as LsSubscription;

use tokio::sync::watch;
use tokio::sync::Notify;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::credentials::Credentials;
use crate::credentials::Token;
use crate::error::Error;
use crate::error::Kind;
use crate::streaming::status::SessionStatus;


/// Forwards `ClientListener` callbacks onto a `watch` channel, collapsing
/// adjacent duplicates the way the credential store's status stream does.
struct StatusForwarder {
  tx: watch::Sender<SessionStatus>,
}

#[async_trait]
impl ClientListener for StatusForwarder {
  async fn on_status_change(&self, status: String) {
    match SessionStatus::from_str(&status) {
      Ok(status) => {
        info!(%status, "streaming session status changed");
        // `watch::Sender::send` already suppresses no-op wakeups for
        // consumers that haven't observed the previous value yet, but it
        // does *not* suppress re-sending an identical value, so we check
        // explicitly to honor the "adjacent duplicates removed" contract.
        if *self.tx.borrow() != status {
          let _ = self.tx.send(status);
        }
      },
      Err(err) => warn!(%err, raw = %status, "received unrecognized streaming status"),
    }
  }
}


/// One subscription currently live on the broker session.
struct SubscriptionEntry {
  subscription: LsSubscription,
  closed: watch::Sender<bool>,
}

/// A cloneable handle onto a channel's live-subscription bookkeeping.
///
/// Shared between the [`Channel`] itself (for [`Channel::unsubscribe_all`]
/// and disconnect teardown) and every outstanding subscription stream (so
/// that dropping a stream unsubscribes its own entry), without making
/// `Channel` itself cloneable — a `Channel` has exactly one owner, and its
/// `Drop` impl tears down the whole session, which must not happen every
/// time a subscription stream is dropped.
#[derive(Clone)]
pub(crate) struct SubscriptionRegistry {
  client: Arc<tokio::sync::Mutex<LightstreamerClient>>,
  entries: Arc<StdMutex<HashMap<u64, SubscriptionEntry>>>,
  next_id: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
  fn new(client: Arc<tokio::sync::Mutex<LightstreamerClient>>) -> Self {
    Self { client, entries: Arc::new(StdMutex::new(HashMap::new())), next_id: Arc::new(AtomicU64::new(0)) }
  }

  /// Record a freshly built `subscription` under a new id, returning that
  /// id, a sender the subscription's own listener can use to report a
  /// broker-initiated unsubscription, and a receiver a stream can poll to
  /// observe completion from any source (stream drop, `unsubscribe_all`,
  /// full disconnect, or the broker itself).
  pub(crate) fn register(&self, subscription: LsSubscription) -> (u64, watch::Sender<bool>, watch::Receiver<bool>) {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let (closed_tx, closed_rx) = watch::channel(false);
    self.entries.lock().unwrap().insert(id, SubscriptionEntry { subscription, closed: closed_tx.clone() });
    (id, closed_tx, closed_rx)
  }

  /// Unsubscribe a single live subscription from the broker session and
  /// signal completion to its stream. A no-op if `id` is no longer
  /// registered.
  pub(crate) async fn unsubscribe_one(&self, id: u64) {
    let entry = self.entries.lock().unwrap().remove(&id);
    if let Some(entry) = entry {
      let sender = self.client.lock().await.subscription_sender.clone();
      LightstreamerClient::unsubscribe(sender, entry.subscription).await;
      let _ = entry.closed.send(true);
    }
  }

  /// Unsubscribe every currently-registered subscription from the broker
  /// session and signal completion to each of their streams.
  pub(crate) async fn unsubscribe_all(&self) {
    let ids: Vec<u64> = self.entries.lock().unwrap().keys().copied().collect();
    for id in ids {
      self.unsubscribe_one(id).await;
    }
  }

  /// Signal completion to every registered subscription's stream without a
  /// broker round trip. Used when the whole session is already tearing
  /// down, where an individual unsubscribe call would be redundant.
  fn close_all(&self) {
    for (_, entry) in self.entries.lock().unwrap().drain() {
      let _ = entry.closed.send(true);
    }
  }
}


/// Owns one Lightstreamer session and its status machine.
///
/// Disconnecting or dropping the channel tears down every subscription
/// registered through it before the status stream is allowed to
/// complete, per the "disconnect-on-destroy" and
/// "unsubscribe-on-full-disconnect" rules.
pub struct Channel {
  client: Arc<tokio::sync::Mutex<LightstreamerClient>>,
  status_tx: watch::Sender<SessionStatus>,
  connect_requested: Arc<StdMutex<bool>>,
  shutdown: Arc<Notify>,
  registry: SubscriptionRegistry,
}

impl std::fmt::Debug for Channel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Channel").field("status", &self.status()).finish_non_exhaustive()
  }
}

impl Channel {
  /// Construct a channel from a certificate-backed [`Credentials`]
  /// snapshot.
  ///
  /// Fails with [`Kind::InvalidRequest`] if the credentials carry an
  /// OAuth token: only a certificate pair can derive a streaming
  /// password (see [`Token::streaming_password`]).
  pub fn new(credentials: &Credentials) -> Result<Self, Error> {
    let password = credentials.token.streaming_password()?;

    let client = LightstreamerClient::new(
      Some(credentials.streamer_url.as_str()),
      None,
      Some(credentials.account_id.as_ref()),
      Some(&password),
    )
    .map_err(|err| Error::new(Kind::InvalidRequest, "failed to construct streaming client").with_cause(err))?;

    let (status_tx, _rx) = watch::channel(SessionStatus::Disconnected { is_retrying: false });
    let client = Arc::new(tokio::sync::Mutex::new(client));
    let registry = SubscriptionRegistry::new(Arc::clone(&client));

    Ok(Self {
      client,
      status_tx,
      connect_requested: Arc::new(StdMutex::new(false)),
      shutdown: Arc::new(Notify::new()),
      registry,
    })
  }

  /// The current session status.
  pub fn status(&self) -> SessionStatus {
    *self.status_tx.borrow()
  }

  /// A de-duplicated stream of status transitions; subscribers only
  /// observe transitions that occur after they subscribe.
  pub fn status_stream(&self) -> impl Stream<Item = SessionStatus> {
    let mut rx = self.status_tx.subscribe();
    let _ = rx.borrow_and_update();

    unfold(rx, |mut rx| async move {
      match rx.changed().await {
        Ok(()) => {
          let status = *rx.borrow_and_update();
          Some((status, rx))
        },
        Err(_) => None,
      }
    })
  }

  /// Request a connection.
  ///
  /// A no-op if the channel is already `Connecting`, `Connected(*)`, or
  /// `Disconnected(retrying=true)`. Fails immediately if the channel is
  /// `Stalled`. Otherwise spawns the connection attempt and resolves once
  /// the session first reaches a ready state (`Connected(Http|WebSocket)`),
  /// or fails if it instead settles on a full disconnect.
  pub async fn connect(&self) -> Result<(), Error> {
    let current = self.status();
    if current == SessionStatus::Stalled {
      return Err(Error::invalid_request("stalled connection"))
    }
    if current.is_connecting()
      || current.is_ready()
      || current == (SessionStatus::Disconnected { is_retrying: true })
    {
      return Ok(())
    }

    *self.connect_requested.lock().unwrap() = true;

    let mut ready = self.status_stream();
    let client = Arc::clone(&self.client);
    let listener = Box::new(StatusForwarder { tx: self.status_tx.clone() });
    let shutdown = Arc::clone(&self.shutdown);

    tokio::spawn(async move {
      let mut guard = client.lock().await;
      guard.add_listener(listener).await;
      guard.connection_options.set_forced_transport(Some(Transport::WsStreaming));
      if let Err(err) = guard.connect_direct(Arc::clone(&shutdown)).await {
        debug!(%err, "streaming connection attempt ended with an error");
      }
    });

    use futures::StreamExt;
    while let Some(status) = ready.next().await {
      if status.is_ready() {
        return Ok(())
      }
      if status == (SessionStatus::Disconnected { is_retrying: false }) {
        return Err(Error::invalid_response("unable to connect"))
      }
      if status == SessionStatus::Stalled {
        return Err(Error::invalid_response("stalled"))
      }
    }
    Err(Error::invalid_response("unable to connect"))
  }

  /// Request a disconnection.
  ///
  /// A no-op if the channel is already `Disconnected(retrying=false)`.
  /// Every subscription registered through this channel is terminated as
  /// the state machine settles.
  pub async fn disconnect(&self) {
    if self.status() == (SessionStatus::Disconnected { is_retrying: false }) {
      return
    }
    self.registry.close_all();
    self.shutdown.notify_waiters();
    let mut client = self.client.lock().await;
    client.disconnect().await;
    *self.connect_requested.lock().unwrap() = false;
  }

  /// Unsubscribe every subscription currently registered through this
  /// channel, unsubscribing each from the broker session and signaling
  /// completion to its stream.
  pub async fn unsubscribe_all(&self) {
    self.registry.unsubscribe_all().await;
  }

  /// The shared Lightstreamer client handle, used by the subscription
  /// multiplexer to register new subscriptions.
  pub(crate) fn client(&self) -> Arc<tokio::sync::Mutex<LightstreamerClient>> {
    Arc::clone(&self.client)
  }

  /// A handle onto this channel's subscription registry, used by the
  /// subscription multiplexer to register new subscriptions and by their
  /// streams to unsubscribe on drop.
  pub(crate) fn registry(&self) -> SubscriptionRegistry {
    self.registry.clone()
  }
}

impl Drop for Channel {
  fn drop(&mut self) {
    self.registry.close_all();
    self.shutdown.notify_waiters();
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  use std::time::SystemTime;

  fn creds(token: Token) -> Credentials {
    Credentials::new(
      "client",
      "account",
      "a".repeat(40),
      url::Url::parse("https://stream.example.com").unwrap(),
      "UTC",
      token,
      SystemTime::now(),
    )
    .unwrap()
  }

  #[test]
  fn oauth_credentials_are_rejected_at_construction() {
    let token = Token::OAuth {
      access: "a".into(),
      refresh: "r".into(),
      scope: "trade".into(),
      type_: "Bearer".into(),
    };
    let err = Channel::new(&creds(token)).unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidRequest);
  }

  #[test]
  fn certificate_credentials_construct_a_channel() {
    let token = Token::Certificate { access: "a".into(), security: "s".into() };
    let channel = Channel::new(&creds(token)).unwrap();
    assert_eq!(channel.status(), SessionStatus::Disconnected { is_retrying: false });
  }
}
