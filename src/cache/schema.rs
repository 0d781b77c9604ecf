// SPDX-License-Identifier: GPL-3.0-or-later

//! The cache's table layouts (§6 "Persisted cache layout").

/// The table tracking the schema version currently applied to the
/// database. A single row, `id = 0`.
pub(crate) const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS SchemaVersion (
  id      INTEGER PRIMARY KEY CHECK (id = 0),
  version INTEGER NOT NULL
)";

/// One registered broker application (key, name, status, permissions,
/// allowances, timestamps).
pub(crate) const APPS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS Apps (
  key      TEXT PRIMARY KEY,
  name     TEXT NOT NULL,
  status   INTEGER NOT NULL CHECK (status IN (-1, 0, 1)),
  equity   INTEGER NOT NULL CHECK (equity IN (0, 1)),
  quote    INTEGER NOT NULL CHECK (quote IN (0, 1)),
  liApp    INTEGER NOT NULL CHECK (liApp >= 0),
  liAcco   INTEGER NOT NULL CHECK (liAcco >= 0),
  liTrade  INTEGER NOT NULL CHECK (liTrade >= 0),
  liHisto  INTEGER NOT NULL CHECK (liHisto >= 0),
  subs     INTEGER NOT NULL CHECK (subs >= 0),
  created  TEXT NOT NULL,
  updated  INTEGER NOT NULL
)";

/// One cached market (forex instrument) reference record.
pub(crate) const MARKETS_FOREX_TABLE: &str = "
CREATE TABLE IF NOT EXISTS Markets_Forex (
  epic TEXT PRIMARY KEY,
  name TEXT NOT NULL
)";

/// The per-epic price time series table's bare name, e.g.
/// `Price_CS.D.EURUSD.CFD.IP`. Epics routinely contain `.`, so every use
/// site must quote this with [`quoted_price_table_name`] rather than
/// interpolating it unquoted into SQL.
pub(crate) fn price_table_name(epic: &str) -> String {
  format!("Price_{}", epic)
}

/// The per-epic price table name, quoted for use as a SQL identifier.
///
/// Table names are interpolated rather than bound as parameters: SQLite
/// does not allow parameterizing identifiers, only values, so the epic is
/// instead validated by [`crate::cache::store::validate_epic`] before it
/// ever reaches a query string.
pub(crate) fn quoted_price_table_name(epic: &str) -> String {
  format!("\"{}\"", price_table_name(epic))
}

/// The schema-version-2 price table: `date` stored as Unix seconds.
pub(crate) fn price_table_v2(epic: &str) -> String {
  format!(
    "CREATE TABLE IF NOT EXISTS {} (
      date     INTEGER PRIMARY KEY,
      openBid  INTEGER NOT NULL,
      openAsk  INTEGER NOT NULL,
      closeBid INTEGER NOT NULL,
      closeAsk INTEGER NOT NULL,
      lowBid   INTEGER NOT NULL,
      lowAsk   INTEGER NOT NULL,
      highBid  INTEGER NOT NULL,
      highAsk  INTEGER NOT NULL,
      volume   INTEGER NOT NULL
    )",
    quoted_price_table_name(epic)
  )
}
