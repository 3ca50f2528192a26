//! Schema reconciliation for crypto_prices
//!
//! The live column set is compared with a fixed list; any difference (missing
//! or extra columns, or no table at all) drops the table and recreates it from
//! the fixed DDL. This is destructive: stored history is lost on drift.

use std::collections::BTreeSet;

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, FromQueryResult, Statement,
    TransactionTrait,
};
use tracing::info;

pub const PRICE_TABLE: &str = "crypto_prices";

/// Column names of crypto_prices, in DDL order
pub const EXPECTED_COLUMNS: [&str; 17] = [
    "id",
    "timestamp",
    "coin_id",
    "symbol",
    "name",
    "current_price_usd",
    "market_cap_usd",
    "total_volume_usd",
    "price_change_24h",
    "price_change_percentage_24h",
    "circulating_supply",
    "total_supply",
    "ath",
    "ath_date",
    "atl",
    "atl_date",
    "created_at",
];

const DROP_PRICE_TABLE_SQL: &str = "DROP TABLE IF EXISTS crypto_prices";

const CREATE_PRICE_TABLE_SQL: &str = r#"
CREATE TABLE crypto_prices (
    id SERIAL PRIMARY KEY,
    timestamp TIMESTAMP NOT NULL,
    coin_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    current_price_usd NUMERIC(20,8),
    market_cap_usd NUMERIC(30,2),
    total_volume_usd NUMERIC(30,2),
    price_change_24h NUMERIC(20,8),
    price_change_percentage_24h NUMERIC(10,4),
    circulating_supply NUMERIC(30,2),
    total_supply NUMERIC(30,2),
    ath NUMERIC(20,8),
    ath_date TIMESTAMP,
    atl NUMERIC(20,8),
    atl_date TIMESTAMP,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (coin_id, timestamp)
)
"#;

/// What the reconciler did to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAction {
    Unchanged,
    Recreated {
        missing: Vec<String>,
        extra: Vec<String>,
    },
}

/// Difference between the live and expected column sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDrift {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl ColumnDrift {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compare live column names with [`EXPECTED_COLUMNS`]
pub fn diff_columns<S: AsRef<str>>(live: &[S]) -> ColumnDrift {
    let live: BTreeSet<&str> = live.iter().map(|c| c.as_ref()).collect();
    let expected: BTreeSet<&str> = EXPECTED_COLUMNS.iter().copied().collect();

    ColumnDrift {
        missing: expected.difference(&live).map(|c| c.to_string()).collect(),
        extra: live.difference(&expected).map(|c| c.to_string()).collect(),
    }
}

#[derive(Debug, FromQueryResult)]
struct ColumnName {
    column_name: String,
}

/// Column names of a `public` table, empty when the table does not exist
pub async fn live_columns<C: ConnectionTrait>(db: &C, table: &str) -> Result<Vec<String>, DbErr> {
    // information_schema exposes sql_identifier, which the driver only decodes as text
    let rows = ColumnName::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"
        SELECT column_name::text AS column_name
        FROM information_schema.columns
        WHERE table_name = $1 AND table_schema = 'public'
        ORDER BY ordinal_position
        "#,
        [table.into()],
    ))
    .all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.column_name).collect())
}

/// Make sure crypto_prices has exactly the expected columns, recreating it if not
pub async fn reconcile_price_table(db: &DatabaseConnection) -> Result<SchemaAction, DbErr> {
    let live = live_columns(db, PRICE_TABLE).await?;
    let drift = diff_columns(&live);

    if drift.is_empty() {
        info!("Table '{}' already exists with correct schema", PRICE_TABLE);
        return Ok(SchemaAction::Unchanged);
    }

    if live.is_empty() {
        info!("Table '{}' not found, creating it", PRICE_TABLE);
    } else {
        info!(
            missing = ?drift.missing,
            extra = ?drift.extra,
            "Table schema mismatch. Recreating {} table...",
            PRICE_TABLE
        );
    }

    // Dropping an uncommitted transaction rolls it back
    let txn = db.begin().await?;
    txn.execute_unprepared(DROP_PRICE_TABLE_SQL).await?;
    txn.execute_unprepared(CREATE_PRICE_TABLE_SQL).await?;
    txn.commit().await?;

    info!("Created new {} table with correct schema", PRICE_TABLE);

    Ok(SchemaAction::Recreated {
        missing: drift.missing,
        extra: drift.extra,
    })
}
