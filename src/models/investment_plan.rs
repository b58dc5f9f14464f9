// ============================================================================
// MODÈLE : CAPITAL INVESTMENT PLAN
// ============================================================================
//
// Description:
//   Plan d'investissement simulé à durée fixe (en mois) avec un taux de
//   croissance mensuel composé. La projection mois par mois est calculée
//   UNE SEULE FOIS à la création (services::growth) puis figée dans
//   monthly_growth; aucune relecture ne la recalcule.
//
// Cycle de vie:
//   active → completed (crédit de final_amount)
//   active → cancelled (remboursement de initial_amount)
//
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};
use serde::{Deserialize, Serialize};

use super::enums::{PlanStatus, PlanType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "capital_investment_plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub plan_type: PlanType,
    pub status: PlanStatus,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub initial_amount: Decimal,
    pub period_months: i32,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub growth_rate: Decimal, // En pourcentage par mois (40.00 = 40%)
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub total_return: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub final_amount: Decimal,
    pub monthly_growth: Json, // Vec<MonthlyGrowth> sérialisé
    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
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
