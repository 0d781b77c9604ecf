// SPDX-License-Identifier: GPL-3.0-or-later

#![deny(
  dead_code,
  improper_ctypes,
  late_bound_lifetime_arguments,
  missing_copy_implementations,
  missing_debug_implementations,
  missing_docs,
  non_shorthand_field_patterns,
  overflowing_literals,
  path_statements,
  trivial_numeric_casts,
  unconditional_recursion,
  unreachable_patterns,
  unused,
  unused_comparisons,
  unused_import_braces,
  unused_lifetimes,
  unused_qualifications,
  while_true,
)]
#![warn(
  bad_style,
  future_incompatible,
  nonstandard_style,
  rust_2018_compatibility,
  rust_2018_idioms,
)]

//! A client for a trading-platform broker that multiplexes an HTTPS
//! request/response API and a persistent Lightstreamer-compatible
//! streaming channel behind a single credential store, and that keeps a
//! local cache of reference data and historical prices.

#[macro_use]
mod macros;
#[macro_use]
pub mod error;

mod client;
mod credentials;
mod endpoint;
mod fixed_point;
mod pagination;
mod session;
mod time_util;
mod util;

/// Domain record types and illustrative endpoint wrappers exercising the
/// request pipeline (accounts, markets, prices, deals, positions,
/// activity, watchlists).
pub mod api;
/// The local reference-data and historical-price cache.
pub mod cache;
/// The streaming channel and subscription multiplexer.
pub mod streaming;
/// Environment- and file-backed test configuration.
pub mod test_env;

use std::borrow::Cow;

pub use crate::client::Builder;
pub use crate::client::Client;
pub use crate::credentials::Credentials;
pub use crate::credentials::Token;
pub use crate::error::Error;
pub use crate::session::CredentialStatus;
pub use crate::session::CredentialStore;

pub(crate) type Str = Cow<'static, str>;
