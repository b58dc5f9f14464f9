use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};
use serde::{Deserialize, Serialize};

use super::enums::{Asset, Timeframe, TradeStatus, TradeType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trades")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub asset: Asset,
    pub trade_type: TradeType,
    pub status: TradeStatus,

    // Prix
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub entry_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub current_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub exit_price: Option<Decimal>,

    #[sea_orm(column_type = "Decimal(Some((12, 4)))")]
    pub quantity: Decimal,

    // Gestion du risque: vérifiés seulement lors d'un appel update-price
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub stop_loss: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub take_profit: Option<Decimal>,

    pub timeframe: Option<Timeframe>,
    pub expires_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub profit_loss: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub profit_loss_percentage: Decimal,

    pub created_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,
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

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert && matches!(self.created_at, NotSet) {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}
