// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use std::time::SystemTime;

use futures::stream::unfold;
use futures::Stream;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tracing::debug;
use tracing::trace;

use crate::credentials::Credentials;
use crate::error::Error;


/// The grace period within which an expiration is treated as already
/// past, per spec: `expirationDate <= now + 100ms` is `Expired`.
const EXPIRATION_GRACE: Duration = Duration::from_millis(100);


/// The externally observable status of the credentials held by a
/// [`CredentialStore`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CredentialStatus {
  /// No credentials are set.
  LoggedOut,
  /// Credentials are set but their expiration has passed (or is within
  /// the grace period).
  Expired,
  /// Credentials are set and valid until `until`.
  Ready {
    /// The instant the credentials expire.
    until: SystemTime,
  },
}

impl CredentialStatus {
  fn from_expiration(expiration: Option<SystemTime>, now: SystemTime) -> Self {
    match expiration {
      None => Self::LoggedOut,
      Some(exp) if exp <= now + EXPIRATION_GRACE => Self::Expired,
      Some(exp) => Self::Ready { until: exp },
    }
  }
}


/// Holds zero-or-one [`Credentials`] under mutual exclusion and publishes
/// expiration-driven status transitions.
///
/// `get`/`set` are plain reads/writes; `modify` is an exclusive
/// read-modify-write under which no other `get`/`set`/`modify` may
/// proceed. Exactly one expiration timer is pending at any moment; it
/// survives a `set` only when the new expiration is unchanged from the
/// previous one (no status event is emitted in that case either).
#[derive(Debug)]
pub struct CredentialStore {
  inner: Arc<StdMutex<Option<Credentials>>>,
  status_tx: watch::Sender<CredentialStatus>,
  timer: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl Default for CredentialStore {
  fn default() -> Self {
    Self::new()
  }
}

impl CredentialStore {
  /// Create a new, empty credential store.
  pub fn new() -> Self {
    let (status_tx, _rx) = watch::channel(CredentialStatus::LoggedOut);
    Self {
      inner: Arc::new(StdMutex::new(None)),
      status_tx,
      timer: Arc::new(StdMutex::new(None)),
    }
  }

  /// Take a snapshot of the currently stored credentials.
  pub fn get(&self) -> Option<Credentials> {
    self.inner.lock().unwrap().clone()
  }

  /// Replace the stored credentials, publishing a status transition if
  /// the expiration changed.
  pub fn set(&self, new: Option<Credentials>) {
    let prev_expiration = {
      let mut guard = self.inner.lock().unwrap();
      let prev_expiration = guard.as_ref().map(|c| c.expiration);
      *guard = new.clone();
      prev_expiration
    };
    let new_expiration = new.as_ref().map(|c| c.expiration);
    self.apply_transition(prev_expiration, new_expiration);
  }

  /// Exclusively read-modify-write the stored credentials.
  ///
  /// `f` observes the current credentials and returns the new value (or
  /// an error, in which case the stored value is left unchanged). No
  /// other `get`/`set`/`modify` may proceed while `f` runs.
  pub fn modify<F>(&self, f: F) -> Result<(), Error>
  where
    F: FnOnce(Option<Credentials>) -> Result<Option<Credentials>, Error>,
  {
    let (prev_expiration, new_expiration) = {
      let mut guard = self.inner.lock().unwrap();
      let prev = guard.clone();
      let prev_expiration = prev.as_ref().map(|c| c.expiration);
      let new = f(prev)?;
      let new_expiration = new.as_ref().map(|c| c.expiration);
      *guard = new;
      (prev_expiration, new_expiration)
    };
    self.apply_transition(prev_expiration, new_expiration);
    Ok(())
  }

  /// The current status, derived from the stored credentials' expiration.
  pub fn status(&self) -> CredentialStatus {
    *self.status_tx.borrow()
  }

  /// A de-duplicated stream of status transitions.
  ///
  /// Subscribers only observe transitions that occur *after* they
  /// subscribe; the stream never replays the status current at
  /// subscription time.
  pub fn status_stream(&self) -> impl Stream<Item = CredentialStatus> {
    let mut rx = self.status_tx.subscribe();
    // Mark the value current at subscription time as already seen so
    // that the first `changed()` call only fires on a genuine future
    // transition.
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

  /// Apply the transition rules for `prev_expiration -> new_expiration`,
  /// cancelling/rescheduling the expiration timer and publishing a status
  /// event as needed. A no-op if the expiration is unchanged.
  fn apply_transition(
    &self,
    prev_expiration: Option<SystemTime>,
    new_expiration: Option<SystemTime>,
  ) {
    if prev_expiration == new_expiration {
      trace!("expiration unchanged; suppressing status event and timer reschedule");
      return
    }

    if let Some(handle) = self.timer.lock().unwrap().take() {
      handle.abort();
    }

    let now = SystemTime::now();
    let status = CredentialStatus::from_expiration(new_expiration, now);
    debug!(?status, "publishing credential status transition");
    let _ = self.status_tx.send(status);

    if let CredentialStatus::Ready { until } = status {
      let delay = until.duration_since(now).unwrap_or(Duration::ZERO);
      let status_tx = self.status_tx.clone();
      let timer_slot = Arc::clone(&self.timer);
      let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        *timer_slot.lock().unwrap() = None;
        let _ = status_tx.send(CredentialStatus::Expired);
      });
      *self.timer.lock().unwrap() = Some(handle);
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  use std::time::Duration;

  use futures::pin_mut;
  use futures::StreamExt;

  use crate::credentials::Token;

  fn creds(expiration: SystemTime) -> Credentials {
    Credentials::new(
      "client",
      "account",
      "a".repeat(40),
      url::Url::parse("https://stream.example.com").unwrap(),
      "UTC",
      Token::Certificate {
        access: "access".into(),
        security: "security".into(),
      },
      expiration,
    )
    .unwrap()
  }

  #[test]
  fn initial_status_is_logged_out() {
    let store = CredentialStore::new();
    assert_eq!(store.status(), CredentialStatus::LoggedOut);
    assert!(store.get().is_none());
  }

  #[tokio::test]
  async fn login_then_expire_then_logout_emits_single_events_each() {
    let store = CredentialStore::new();
    let stream = store.status_stream();
    pin_mut!(stream);

    let soon = SystemTime::now() + Duration::from_millis(50);
    store.set(Some(creds(soon)));
    let first = stream.next().await.unwrap();
    assert_eq!(first, CredentialStatus::Expired);

    store.set(None);
    let second = stream.next().await.unwrap();
    assert_eq!(second, CredentialStatus::LoggedOut);
  }

  #[tokio::test(start_paused = true)]
  async fn future_expiry_transitions_to_expired_on_schedule() {
    let store = CredentialStore::new();
    let stream = store.status_stream();
    pin_mut!(stream);

    let later = SystemTime::now() + Duration::from_secs(10);
    store.set(Some(creds(later)));
    let ready = stream.next().await.unwrap();
    assert_eq!(ready, CredentialStatus::Ready { until: later });

    tokio::time::advance(Duration::from_secs(11)).await;
    let expired = stream.next().await.unwrap();
    assert_eq!(expired, CredentialStatus::Expired);
  }

  #[tokio::test]
  async fn identical_expiration_suppresses_event_and_timer_reshuffle() {
    let store = CredentialStore::new();
    let stream = store.status_stream();
    pin_mut!(stream);

    let until = SystemTime::now() + Duration::from_secs(10);
    store.set(Some(creds(until)));
    let _ready = stream.next().await.unwrap();

    // Setting again with the exact same expiration must not emit another
    // event.
    store.set(Some(creds(until)));

    let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(next.is_err(), "no event should have been emitted");
  }

  #[tokio::test]
  async fn modify_failure_leaves_store_unchanged() {
    let store = CredentialStore::new();
    let until = SystemTime::now() + Duration::from_secs(10);
    store.set(Some(creds(until)));

    let result = store.modify(|_current| Err(Error::invalid_request("nope")));
    assert!(result.is_err());
    assert_eq!(store.get().unwrap().expiration, until);
  }

  #[tokio::test]
  async fn subscribers_only_see_future_transitions() {
    let store = CredentialStore::new();
    let until = SystemTime::now() + Duration::from_secs(10);
    store.set(Some(creds(until)));

    // A subscriber that joins *after* the Ready transition must not
    // immediately observe it.
    let stream = store.status_stream();
    pin_mut!(stream);
    let immediate = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
    assert!(immediate.is_err());
  }
}
