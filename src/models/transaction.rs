// ============================================================================
// MODÈLE : TRANSACTION (journal des mouvements de solde)
// ============================================================================
//
// Chaque mouvement du solde utilisateur laisse une ligne ici:
//   - deposit / withdrawal : demandés par l'utilisateur, validés par un admin
//   - investment / profit  : plans d'investissement (débit / crédit)
//   - referral_bonus       : récompense de parrainage
//   - crypto_buy / crypto_sell : achats et ventes au prix admin
//
// Points d'attention:
//   - net_amount = amount - fee
//   - reference est unique (préfixe selon le type + UUID)
//   - les écritures internes sont créées directement en "completed"
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{PaymentMethod, TransactionStatus, TransactionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub transaction_type: TransactionType,
    pub payment_method: Option<PaymentMethod>,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub fee: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub net_amount: Decimal,
    pub status: TransactionStatus,
    #[sea_orm(unique)]
    pub reference: String,
    pub phone_number: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
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
