use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{Asset, CloseReason, TradeType};

/// Historique des trades fermés (une ligne par fermeture, jamais modifiée)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trade_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub trade_id: Uuid,
    pub asset: Asset,
    pub trade_type: TradeType,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub entry_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub exit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub profit_loss: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub profit_loss_percentage: Decimal,
    pub close_reason: CloseReason,
    pub opened_at: DateTimeUtc,
    pub closed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
