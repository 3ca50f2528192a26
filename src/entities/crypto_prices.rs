//! `SeaORM` Entity for crypto_prices table
//!
//! The table is owned by the schema reconciler, which recreates it from a fixed
//! DDL whenever the live columns drift from this model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "crypto_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Observation time (UTC, stored without zone)
    pub timestamp: DateTime,
    /// CoinGecko coin id, e.g. "bitcoin"
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub current_price_usd: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 2)))", nullable)]
    pub market_cap_usd: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 2)))", nullable)]
    pub total_volume_usd: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub price_change_24h: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub price_change_percentage_24h: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 2)))", nullable)]
    pub circulating_supply: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 2)))", nullable)]
    pub total_supply: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub ath: Option<Decimal>,
    pub ath_date: Option<DateTime>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub atl: Option<Decimal>,
    pub atl_date: Option<DateTime>,
    /// Filled by the column default on insert
    pub created_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
