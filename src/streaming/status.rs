// SPDX-License-Identifier: GPL-3.0-or-later

//! The session status enum, rendered to and parsed from the strings the
//! Lightstreamer protocol itself uses on the wire (`CONNECTED:WS-STREAMING`
//! and friends), so that [`ClientListener::on_status_change`][super::channel]
//! callbacks can be mapped losslessly in both directions.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::error::Kind;


/// The sub-variant of a [`SessionStatus::Connected`] session: which
/// transport is active, and whether it fell back to polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionKind {
  /// The client is still deciding which transport to use.
  Sensing,
  /// Connected over HTTP, streaming or polling.
  Http {
    /// Whether the connection fell back to polling.
    polling: bool,
  },
  /// Connected over a WebSocket, streaming or polling.
  WebSocket {
    /// Whether the connection fell back to polling.
    polling: bool,
  },
}

/// The status of a streaming session, mirroring the Lightstreamer client's
/// own state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionStatus {
  /// A connection attempt is in progress; the transport is not yet
  /// decided.
  Connecting,
  /// A session is established over the given transport.
  Connected(ConnectionKind),
  /// The connection is alive but not receiving any data.
  Stalled,
  /// No session is active.
  Disconnected {
    /// Whether the client is automatically retrying.
    is_retrying: bool,
  },
}

impl SessionStatus {
  /// True iff the session can carry live updates (`Connected` on a
  /// fully-negotiated transport, not merely sensing).
  pub fn is_ready(&self) -> bool {
    matches!(
      self,
      SessionStatus::Connected(ConnectionKind::Http { .. })
        | SessionStatus::Connected(ConnectionKind::WebSocket { .. })
    )
  }

  /// True iff the session is in the process of being established.
  pub fn is_connecting(&self) -> bool {
    matches!(
      self,
      SessionStatus::Connecting | SessionStatus::Connected(ConnectionKind::Sensing)
    )
  }
}

impl fmt::Display for SessionStatus {
  fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      SessionStatus::Connecting => "CONNECTING",
      SessionStatus::Connected(ConnectionKind::Sensing) => "CONNECTED:STREAM-SENSING",
      SessionStatus::Connected(ConnectionKind::Http { polling: false }) => "CONNECTED:HTTP-STREAMING",
      SessionStatus::Connected(ConnectionKind::Http { polling: true }) => "CONNECTED:HTTP-POLLING",
      SessionStatus::Connected(ConnectionKind::WebSocket { polling: false }) => "CONNECTED:WS-STREAMING",
      SessionStatus::Connected(ConnectionKind::WebSocket { polling: true }) => "CONNECTED:WS-POLLING",
      SessionStatus::Stalled => "STALLED",
      SessionStatus::Disconnected { is_retrying: true } => "DISCONNECTED:WILL-RETRY",
      SessionStatus::Disconnected { is_retrying: false } => "DISCONNECTED",
    };
    fmt.write_str(s)
  }
}

impl FromStr for SessionStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let status = match s {
      "CONNECTING" => SessionStatus::Connecting,
      "CONNECTED:STREAM-SENSING" => SessionStatus::Connected(ConnectionKind::Sensing),
      "CONNECTED:HTTP-STREAMING" => SessionStatus::Connected(ConnectionKind::Http { polling: false }),
      "CONNECTED:HTTP-POLLING" => SessionStatus::Connected(ConnectionKind::Http { polling: true }),
      "CONNECTED:WS-STREAMING" => SessionStatus::Connected(ConnectionKind::WebSocket { polling: false }),
      "CONNECTED:WS-POLLING" => SessionStatus::Connected(ConnectionKind::WebSocket { polling: true }),
      "STALLED" => SessionStatus::Stalled,
      // The client-side recovery attempt is, from this crate's point of
      // view, indistinguishable from a plain retry.
      "DISCONNECTED:WILL-RETRY" | "DISCONNECTED:TRYING-RECOVERY" => {
        SessionStatus::Disconnected { is_retrying: true }
      },
      "DISCONNECTED" => SessionStatus::Disconnected { is_retrying: false },
      other => {
        return Err(Error::new(Kind::InvalidResponse, format!("unrecognized session status: {}", other)))
      },
    };
    Ok(status)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [SessionStatus; 9] = [
    SessionStatus::Connecting,
    SessionStatus::Connected(ConnectionKind::Sensing),
    SessionStatus::Connected(ConnectionKind::Http { polling: false }),
    SessionStatus::Connected(ConnectionKind::Http { polling: true }),
    SessionStatus::Connected(ConnectionKind::WebSocket { polling: false }),
    SessionStatus::Connected(ConnectionKind::WebSocket { polling: true }),
    SessionStatus::Stalled,
    SessionStatus::Disconnected { is_retrying: true },
    SessionStatus::Disconnected { is_retrying: false },
  ];

  #[test]
  fn rendering_is_bijective_with_the_enum() {
    for status in ALL {
      let rendered = status.to_string();
      let parsed: SessionStatus = rendered.parse().unwrap();
      assert_eq!(parsed, status);
    }
  }

  #[test]
  fn is_ready_only_for_fully_negotiated_transports() {
    assert!(!SessionStatus::Connecting.is_ready());
    assert!(!SessionStatus::Connected(ConnectionKind::Sensing).is_ready());
    assert!(SessionStatus::Connected(ConnectionKind::Http { polling: true }).is_ready());
    assert!(SessionStatus::Connected(ConnectionKind::WebSocket { polling: false }).is_ready());
  }

  #[test]
  fn is_connecting_covers_sensing() {
    assert!(SessionStatus::Connecting.is_connecting());
    assert!(SessionStatus::Connected(ConnectionKind::Sensing).is_connecting());
    assert!(!SessionStatus::Connected(ConnectionKind::Http { polling: false }).is_connecting());
  }

  #[test]
  fn unknown_status_string_is_rejected() {
    let err = "NOT-A-REAL-STATUS".parse::<SessionStatus>().unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidResponse);
  }
}
