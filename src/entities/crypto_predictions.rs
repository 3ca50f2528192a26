//! `SeaORM` Entity for crypto_predictions table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crypto_predictions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Target date of the prediction
    pub ds: DateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    /// Asset symbol, e.g. "BTC"
    pub symbol: String,
    /// When the forecast run produced this row
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
