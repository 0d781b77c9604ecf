// SPDX-License-Identifier: GPL-3.0-or-later

//! The local reference-data and price cache (component E): a versioned
//! SQLite-backed store for `Application`, `Market`, and `Price` records,
//! with ordered migrations between schema versions.

mod migrations;
mod schema;
mod store;

pub use store::AppStatus;
pub use store::Application;
pub use store::Market;
pub use store::PriceRow;
pub use store::Store;
