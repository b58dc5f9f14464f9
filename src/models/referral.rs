use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::ReferralStatus;

// Parrainage: referrer a invité referred_user à l'inscription.
// La récompense n'est créditée qu'une fois (reward_claimed).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub referrer_id: i32,
    pub referred_user_id: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub reward_amount: Decimal,
    pub reward_claimed: bool,
    pub status: ReferralStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ReferrerId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Referrer,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ReferredUserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    ReferredUser,
}

impl ActiveModelBehavior for ActiveModel {}
