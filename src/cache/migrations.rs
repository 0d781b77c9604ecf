// SPDX-License-Identifier: GPL-3.0-or-later

//! Ordered schema migrations, applied in sequence against whatever
//! version is currently recorded in `SchemaVersion`.
//!
//! Grounded on the mandated v1->v2 price-table migration (§6/§8 scenario
//! 6): the `date` column moves from an ISO-8601 string to Unix seconds,
//! preserving row count, via a rename/recreate/copy/drop cycle (SQLite has
//! no `ALTER COLUMN`, so this is the idiomatic way to change a column's
//! type in place).

use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::cache::schema::APPS_TABLE;
use crate::cache::schema::MARKETS_FOREX_TABLE;
use crate::cache::schema::SCHEMA_VERSION_TABLE;
use crate::error::Error;
use crate::error::Kind;
use crate::time_util::parse_system_time_from_str;

/// The schema version this build of the crate expects after all
/// migrations have run.
pub(crate) const CURRENT_VERSION: i64 = 2;

/// Read the recorded schema version, treating an absent row (a brand new
/// database) as version 0.
async fn read_version(pool: &SqlitePool) -> Result<i64, Error> {
  sqlx::query(SCHEMA_VERSION_TABLE).execute(pool).await?;
  let row = sqlx::query("SELECT version FROM SchemaVersion WHERE id = 0").fetch_optional(pool).await?;
  Ok(row.map(|row| row.get::<i64, _>("version")).unwrap_or(0))
}

async fn write_version(pool: &SqlitePool, version: i64) -> Result<(), Error> {
  sqlx::query("INSERT INTO SchemaVersion (id, version) VALUES (0, ?1) ON CONFLICT(id) DO UPDATE SET version = ?1")
    .bind(version)
    .execute(pool)
    .await?;
  Ok(())
}

/// Create the baseline (version 1) tables: `Apps`, `Markets_Forex`. Price
/// tables are created on demand, per epic, by the store; migrations only
/// need to touch the ones that already exist.
async fn migrate_v0_to_v1(pool: &SqlitePool) -> Result<(), Error> {
  sqlx::query(APPS_TABLE).execute(pool).await?;
  sqlx::query(MARKETS_FOREX_TABLE).execute(pool).await?;
  Ok(())
}

/// Convert every existing `Price_<epic>` table's `date` column from an
/// ISO-8601 string to Unix seconds, preserving row count and all other
/// columns verbatim.
async fn migrate_v1_to_v2(pool: &SqlitePool) -> Result<(), Error> {
  let tables = sqlx::query(
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'Price\\_%' ESCAPE '\\'",
  )
  .fetch_all(pool)
  .await?;

  for row in tables {
    let table: String = row.get("name");
    let epic = table.strip_prefix("Price_").unwrap_or(&table).to_string();
    migrate_price_table(pool, &epic, &table).await?;
  }
  Ok(())
}

async fn migrate_price_table(pool: &SqlitePool, epic: &str, old_table: &str) -> Result<(), Error> {
  let quoted_old = format!("\"{}\"", old_table);
  let old_rows = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", quoted_old))
    .fetch_one(pool)
    .await?
    .get::<i64, _>("n");

  let staging = format!("{}_v2_staging", old_table);
  let quoted_staging = format!("\"{}\"", staging);
  sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted_staging)).execute(pool).await?;
  sqlx::query(&format!(
    "CREATE TABLE {} (
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
    quoted_staging
  ))
  .execute(pool)
  .await?;

  let rows = sqlx::query(&format!(
    "SELECT date, openBid, openAsk, closeBid, closeAsk, lowBid, lowAsk, highBid, highAsk, volume FROM {}",
    quoted_old
  ))
  .fetch_all(pool)
  .await?;

  for row in &rows {
    let old_date: String = row.get("date");
    let unix_secs = parse_system_time_from_str(&old_date)?
      .duration_since(std::time::UNIX_EPOCH)
      .map_err(|_| Error::new(Kind::InvalidResponse, "price date predates the epoch"))?
      .as_secs() as i64;

    sqlx::query(&format!(
      "INSERT INTO {} (date, openBid, openAsk, closeBid, closeAsk, lowBid, lowAsk, highBid, highAsk, volume)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
      quoted_staging
    ))
    .bind(unix_secs)
    .bind(row.get::<i64, _>("openBid"))
    .bind(row.get::<i64, _>("openAsk"))
    .bind(row.get::<i64, _>("closeBid"))
    .bind(row.get::<i64, _>("closeAsk"))
    .bind(row.get::<i64, _>("lowBid"))
    .bind(row.get::<i64, _>("lowAsk"))
    .bind(row.get::<i64, _>("highBid"))
    .bind(row.get::<i64, _>("highAsk"))
    .bind(row.get::<i64, _>("volume"))
    .execute(pool)
    .await?;
  }

  let new_rows = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", quoted_staging))
    .fetch_one(pool)
    .await?
    .get::<i64, _>("n");
  if new_rows != old_rows {
    return Err(Error::new(
      Kind::CallFailed,
      format!("price migration for {} changed row count: {} -> {}", epic, old_rows, new_rows),
    ))
  }

  sqlx::query(&format!("DROP TABLE {}", quoted_old)).execute(pool).await?;
  sqlx::query(&format!("ALTER TABLE {} RENAME TO {}", quoted_staging, quoted_old)).execute(pool).await?;
  Ok(())
}

/// Bring `pool`'s schema up to [`CURRENT_VERSION`], applying each pending
/// migration in order and recording progress after every step so a
/// failure partway through leaves the database at a consistent,
/// resumable version rather than silently skipping ahead.
pub(crate) async fn run(pool: &SqlitePool) -> Result<(), Error> {
  loop {
    let version = read_version(pool).await?;
    if version >= CURRENT_VERSION {
      return Ok(())
    }

    match version {
      0 => migrate_v0_to_v1(pool).await?,
      1 => migrate_v1_to_v2(pool).await?,
      other => {
        return Err(Error::new(Kind::CallFailed, format!("no migration defined from schema version {}", other)))
      },
    }
    write_version(pool, version + 1).await?;
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  async fn fresh_pool() -> SqlitePool {
    SqlitePool::connect("sqlite::memory:").await.unwrap()
  }

  #[tokio::test]
  async fn fresh_database_lands_on_current_version() {
    let pool = fresh_pool().await;
    run(&pool).await.unwrap();
    assert_eq!(read_version(&pool).await.unwrap(), CURRENT_VERSION);
  }

  #[tokio::test]
  async fn running_migrations_twice_is_a_no_op() {
    let pool = fresh_pool().await;
    run(&pool).await.unwrap();
    run(&pool).await.unwrap();
    assert_eq!(read_version(&pool).await.unwrap(), CURRENT_VERSION);
  }

  #[tokio::test]
  async fn v1_price_rows_survive_the_date_migration() {
    let pool = fresh_pool().await;
    migrate_v0_to_v1(&pool).await.unwrap();
    write_version(&pool, 1).await.unwrap();

    sqlx::query(
      "CREATE TABLE IF NOT EXISTS \"Price_CS.D.EURUSD.CFD.IP\" (
        date     TEXT PRIMARY KEY,
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
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
      "INSERT INTO \"Price_CS.D.EURUSD.CFD.IP\"
       (date, openBid, openAsk, closeBid, closeAsk, lowBid, lowAsk, highBid, highAsk, volume)
       VALUES ('2018-04-01T12:00:00Z', 1, 2, 3, 4, 5, 6, 7, 8, 9)",
    )
    .execute(&pool)
    .await
    .unwrap();

    run(&pool).await.unwrap();

    let row = sqlx::query("SELECT date, volume FROM \"Price_CS.D.EURUSD.CFD.IP\"")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(row.get::<i64, _>("date"), 1522584000);
    assert_eq!(row.get::<i64, _>("volume"), 9);
  }
}
