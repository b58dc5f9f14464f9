use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Journal d'audit: une ligne par écriture sur admin_crypto_prices
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crypto_price_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub coin: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub buy_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub sell_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 4)))")]
    pub change_24h: Decimal,
    pub updated_by: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
