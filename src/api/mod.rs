// SPDX-License-Identifier: GPL-3.0-or-later

/// Definitions pertaining the user's account, its preferences, and its
/// applications.
pub mod account;
/// Definitions pertaining account activity and transaction history.
pub mod activity;
/// Definitions surrounding open positions and working orders.
pub mod deal;
/// Functionality for searching and retrieving markets and their nodes.
pub mod market;
/// Functionality for retrieving historical prices for a market.
pub mod price;
/// Definitions surrounding client sentiment.
pub mod sentiment;
/// Definitions surrounding watchlists.
pub mod watchlist;

/// The API base URL used against the production environment.
pub(crate) const API_BASE_URL: &str = "https://api.example-broker.com";
/// The API base URL used against the demo/paper environment.
pub(crate) const API_DEMO_URL: &str = "https://demo-api.example-broker.com";
/// The HTTP header carrying the API key.
pub(crate) const HDR_API_KEY: &str = "X-IG-API-KEY";
