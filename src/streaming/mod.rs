// SPDX-License-Identifier: GPL-3.0-or-later

//! The streaming channel (component C) and subscription multiplexer
//! (component D): a single Lightstreamer-compatible session derived from
//! certificate credentials, and typed field subscriptions registered
//! against it.

mod channel;
mod subscription;

pub use channel::Channel;
pub use subscription::second_level_positions;
pub use subscription::subscribe;
pub use subscription::Event;
pub use subscription::FieldValue;
pub use subscription::Mode;
pub use subscription::Update;
pub use subscription::SubscriptionStream;

pub mod status;
pub use status::ConnectionKind;
pub use status::SessionStatus;
