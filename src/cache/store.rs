// SPDX-License-Identifier: GPL-3.0-or-later

//! The local reference-data and price cache: a `Store` wrapping a SQLite
//! pool, enforcing the integrity constraints named for `Application`,
//! `Market`, and `Price` rows, and serializing writes through a single
//! background task the way the HTTPS pipeline serializes requests through
//! [`crate::client::Client`]'s single queue.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use num_decimal::Num;

use sqlx::sqlite::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::ConnectOptions;
use sqlx::Row;

use tracing::debug;

use crate::cache::migrations;
use crate::cache::schema::price_table_v2;
use crate::cache::schema::quoted_price_table_name;
use crate::error::Error;
use crate::error::Kind;
use crate::fixed_point::decode as decode_price;
use crate::fixed_point::encode as encode_price;


/// The life cycle status of a registered application, per the
/// "status ∈ {enabled, disabled, revoked}" constraint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AppStatus {
  /// The application may authenticate.
  Enabled,
  /// The application exists but cannot currently authenticate.
  Disabled,
  /// The application's registration was withdrawn.
  Revoked,
}

impl AppStatus {
  fn to_code(self) -> i64 {
    match self {
      AppStatus::Revoked => -1,
      AppStatus::Disabled => 0,
      AppStatus::Enabled => 1,
    }
  }

  fn from_code(code: i64) -> Result<Self, Error> {
    match code {
      -1 => Ok(AppStatus::Revoked),
      0 => Ok(AppStatus::Disabled),
      1 => Ok(AppStatus::Enabled),
      other => Err(Error::new(Kind::InvalidResponse, format!("unrecognized application status: {}", other))),
    }
  }
}

/// A cached application registration record.
#[derive(Clone, Debug, PartialEq)]
pub struct Application {
  /// The application's API key.
  pub key: String,
  /// The application's display name.
  pub name: String,
  /// Its current life cycle status.
  pub status: AppStatus,
  /// Whether it may trade equities.
  pub equity: bool,
  /// Whether it may request quotes.
  pub quote: bool,
  /// Allowance: requests per application per minute.
  pub allowance_application: u32,
  /// Allowance: requests per account per minute.
  pub allowance_account: u32,
  /// Allowance: trading requests per minute.
  pub allowance_trading: u32,
  /// Allowance: historical data requests per minute.
  pub allowance_history: u32,
  /// Allowance: concurrent subscriptions.
  pub allowance_subscriptions: u32,
  /// When the registration was created.
  pub created: SystemTime,
  /// When this record was last refreshed from the server.
  pub updated: SystemTime,
}

/// A cached market reference record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Market {
  /// The market's unique identifier.
  pub epic: String,
  /// The market's display name.
  pub name: String,
}

/// One cached price candle. Bid/ask halves follow the wire's fixed-point
/// encoding (see [`crate::fixed_point`]).
#[derive(Clone, Debug, PartialEq)]
pub struct PriceRow {
  /// The candle's time stamp.
  pub date: SystemTime,
  /// Opening bid/ask.
  pub open: (Num, Num),
  /// Closing bid/ask.
  pub close: (Num, Num),
  /// Lowest bid/ask.
  pub low: (Num, Num),
  /// Highest bid/ask.
  pub high: (Num, Num),
  /// Traded volume.
  pub volume: u32,
}

/// Reject epics that would allow SQL identifier injection through the
/// interpolated `Price_<epic>` table name. Real epics are restricted to
/// ASCII letters, digits, `.`, and `_` (e.g. `CS.D.EURUSD.CFD.IP`), so
/// anything else is refused outright rather than escaped.
pub(crate) fn validate_epic(epic: &str) -> Result<(), Error> {
  let valid = !epic.is_empty()
    && epic.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
  if valid {
    Ok(())
  } else {
    Err(Error::invalid_request(format!("not a valid market epic: {:?}", epic)))
  }
}

fn system_time_to_unix_secs(time: SystemTime) -> i64 {
  time.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn unix_secs_to_system_time(secs: i64) -> SystemTime {
  crate::time_util::from_unix_secs(secs)
}


/// A handle onto the cache database. Cheap to clone: internally this is
/// just a pooled connection handle, and every operation serializes
/// through SQLite's own locking rather than an additional in-process
/// queue, mirroring how [`crate::session::CredentialStore`] lets the
/// underlying primitive (there a `watch` channel, here a database) own
/// the serialization rather than layering a redundant one on top.
#[derive(Clone, Debug)]
pub struct Store {
  pool: SqlitePool,
}

impl Store {
  /// Open (creating if necessary) the SQLite database at `path`, running
  /// any pending migrations before returning.
  pub async fn open(path: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true)
      .disable_statement_logging();
    let pool = SqlitePool::connect_with(options).await?;
    migrations::run(&pool).await?;
    debug!(%path, "cache database ready");
    Ok(Self { pool })
  }

  /// Open an in-memory database, primarily for tests.
  pub async fn open_in_memory() -> Result<Self, Error> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    migrations::run(&pool).await?;
    Ok(Self { pool })
  }

  /// Insert or replace an application record, validating its integrity
  /// constraints: `created` must not be in the future and `updated` must
  /// not be later than now.
  pub async fn upsert_application(&self, app: &Application) -> Result<(), Error> {
    let now = SystemTime::now();
    if app.created > now {
      return Err(Error::invalid_request("application creation date is in the future"))
    }
    if app.updated > now {
      return Err(Error::invalid_request("application update time stamp is in the future"))
    }

    sqlx::query(
      "INSERT INTO Apps
         (key, name, status, equity, quote, liApp, liAcco, liTrade, liHisto, subs, created, updated)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
       ON CONFLICT(key) DO UPDATE SET
         name = excluded.name, status = excluded.status, equity = excluded.equity,
         quote = excluded.quote, liApp = excluded.liApp, liAcco = excluded.liAcco,
         liTrade = excluded.liTrade, liHisto = excluded.liHisto, subs = excluded.subs,
         created = excluded.created, updated = excluded.updated",
    )
    .bind(&app.key)
    .bind(&app.name)
    .bind(app.status.to_code())
    .bind(app.equity)
    .bind(app.quote)
    .bind(app.allowance_application)
    .bind(app.allowance_account)
    .bind(app.allowance_trading)
    .bind(app.allowance_history)
    .bind(app.allowance_subscriptions)
    .bind(crate::time_util::format_local_datetime(app.created, chrono::FixedOffset::east_opt(0).unwrap()))
    .bind(system_time_to_unix_secs(app.updated))
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  /// Look up an application by key.
  pub async fn application(&self, key: &str) -> Result<Option<Application>, Error> {
    let row = sqlx::query("SELECT * FROM Apps WHERE key = ?1").bind(key).fetch_optional(&self.pool).await?;
    row.map(|row| {
      Ok(Application {
        key: row.get("key"),
        name: row.get("name"),
        status: AppStatus::from_code(row.get("status"))?,
        equity: row.get("equity"),
        quote: row.get("quote"),
        allowance_application: row.get::<i64, _>("liApp") as u32,
        allowance_account: row.get::<i64, _>("liAcco") as u32,
        allowance_trading: row.get::<i64, _>("liTrade") as u32,
        allowance_history: row.get::<i64, _>("liHisto") as u32,
        allowance_subscriptions: row.get::<i64, _>("subs") as u32,
        created: crate::time_util::parse_local_datetime(
          &row.get::<String, _>("created"),
          chrono::FixedOffset::east_opt(0).unwrap(),
        )?,
        updated: unix_secs_to_system_time(row.get("updated")),
      })
    })
    .transpose()
  }

  /// Insert or replace a market reference record.
  pub async fn upsert_market(&self, market: &Market) -> Result<(), Error> {
    sqlx::query("INSERT INTO Markets_Forex (epic, name) VALUES (?1, ?2) ON CONFLICT(epic) DO UPDATE SET name = excluded.name")
      .bind(&market.epic)
      .bind(&market.name)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Look up a market by epic.
  pub async fn market(&self, epic: &str) -> Result<Option<Market>, Error> {
    let row = sqlx::query("SELECT epic, name FROM Markets_Forex WHERE epic = ?1")
      .bind(epic)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(|row| Market { epic: row.get("epic"), name: row.get("name") }))
  }

  /// Insert or replace a price candle for `epic`, creating that market's
  /// price table on first use. Fails if `epic` has no corresponding
  /// [`Market`] row: a price cannot outlive its parent.
  pub async fn upsert_price(&self, epic: &str, price: &PriceRow) -> Result<(), Error> {
    validate_epic(epic)?;
    if self.market(epic).await?.is_none() {
      return Err(Error::invalid_request(format!("no market registered for epic {:?}", epic)))
    }

    sqlx::query(&price_table_v2(epic)).execute(&self.pool).await?;

    let table = quoted_price_table_name(epic);
    sqlx::query(&format!(
      "INSERT INTO {} (date, openBid, openAsk, closeBid, closeAsk, lowBid, lowAsk, highBid, highAsk, volume)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
       ON CONFLICT(date) DO UPDATE SET
         openBid = excluded.openBid, openAsk = excluded.openAsk,
         closeBid = excluded.closeBid, closeAsk = excluded.closeAsk,
         lowBid = excluded.lowBid, lowAsk = excluded.lowAsk,
         highBid = excluded.highBid, highAsk = excluded.highAsk,
         volume = excluded.volume",
      table
    ))
    .bind(system_time_to_unix_secs(price.date))
    .bind(encode_price(&price.open.0))
    .bind(encode_price(&price.open.1))
    .bind(encode_price(&price.close.0))
    .bind(encode_price(&price.close.1))
    .bind(encode_price(&price.low.0))
    .bind(encode_price(&price.low.1))
    .bind(encode_price(&price.high.0))
    .bind(encode_price(&price.high.1))
    .bind(price.volume)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  /// Fetch the price candles cached for `epic`, ordered by date.
  pub async fn prices(&self, epic: &str) -> Result<Vec<PriceRow>, Error> {
    validate_epic(epic)?;
    let table = quoted_price_table_name(epic);
    let exists = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
      .bind(crate::cache::schema::price_table_name(epic))
      .fetch_optional(&self.pool)
      .await?;
    if exists.is_none() {
      return Ok(Vec::new())
    }

    let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY date ASC", table)).fetch_all(&self.pool).await?;
    rows
      .into_iter()
      .map(|row| {
        Ok(PriceRow {
          date: unix_secs_to_system_time(row.get("date")),
          open: (decode_price(row.get("openBid")), decode_price(row.get("openAsk"))),
          close: (decode_price(row.get("closeBid")), decode_price(row.get("closeAsk"))),
          low: (decode_price(row.get("lowBid")), decode_price(row.get("lowAsk"))),
          high: (decode_price(row.get("highBid")), decode_price(row.get("highAsk"))),
          volume: row.get::<i64, _>("volume") as u32,
        })
      })
      .collect()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn app(key: &str) -> Application {
    Application {
      key: key.to_string(),
      name: "Test App".to_string(),
      status: AppStatus::Enabled,
      equity: false,
      quote: true,
      allowance_application: 60,
      allowance_account: 60,
      allowance_trading: 100,
      allowance_history: 10000,
      allowance_subscriptions: 40,
      created: SystemTime::now(),
      updated: SystemTime::now(),
    }
  }

  #[tokio::test]
  async fn application_round_trips() {
    let store = Store::open_in_memory().await.unwrap();
    store.upsert_application(&app("a".repeat(40).as_str())).await.unwrap();
    let fetched = store.application(&"a".repeat(40)).await.unwrap().unwrap();
    assert_eq!(fetched.status, AppStatus::Enabled);
    assert_eq!(fetched.allowance_trading, 100);
  }

  #[tokio::test]
  async fn future_creation_date_is_rejected() {
    let store = Store::open_in_memory().await.unwrap();
    let mut bad = app("key");
    bad.created = SystemTime::now() + std::time::Duration::from_secs(86400);
    let err = store.upsert_application(&bad).await.unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidRequest);
  }

  #[tokio::test]
  async fn price_requires_an_existing_market() {
    let store = Store::open_in_memory().await.unwrap();
    let price = PriceRow {
      date: SystemTime::now(),
      open: (decode_price(100_00000), decode_price(100_10000)),
      close: (decode_price(101_00000), decode_price(101_10000)),
      low: (decode_price(99_00000), decode_price(99_10000)),
      high: (decode_price(102_00000), decode_price(102_10000)),
      volume: 42,
    };
    let err = store.upsert_price("CS.D.EURUSD.CFD.IP", &price).await.unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidRequest);
  }

  #[tokio::test]
  async fn price_round_trips_once_market_exists() {
    let store = Store::open_in_memory().await.unwrap();
    store.upsert_market(&Market { epic: "CS.D.EURUSD.CFD.IP".to_string(), name: "EUR/USD".to_string() }).await.unwrap();

    let price = PriceRow {
      date: crate::time_util::from_unix_secs(1522584000),
      open: (decode_price(100_00000), decode_price(100_10000)),
      close: (decode_price(101_00000), decode_price(101_10000)),
      low: (decode_price(99_00000), decode_price(99_10000)),
      high: (decode_price(102_00000), decode_price(102_10000)),
      volume: 42,
    };
    store.upsert_price("CS.D.EURUSD.CFD.IP", &price).await.unwrap();

    let prices = store.prices("CS.D.EURUSD.CFD.IP").await.unwrap();
    assert_eq!(prices, vec![price]);
  }

  #[test]
  fn epic_validation_rejects_quote_characters() {
    assert!(validate_epic("CS.D.EURUSD.CFD.IP").is_ok());
    assert!(validate_epic("bad\"; DROP TABLE Apps; --").is_err());
  }
}
