// ============================================================================
// MODÈLE : ADMIN CRYPTO PRICE
// ============================================================================
//
// Description:
//   Paire de prix achat/vente fixée par un admin pour une crypto.
//   Les utilisateurs achètent au buy_price et vendent au sell_price.
//
// Invariant:
//   0.01 <= sell_price < buy_price
//   Vérifié par le service AVANT chaque écriture (unitaire, bulk, sync) et
//   revérifié ici dans before_save pour toute écriture via ActiveModel.
//
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{self, NotSet, Set, Unchanged};
use serde::{Deserialize, Serialize};

/// Prix minimum accepté pour buy_price et sell_price
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_crypto_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub coin: String,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub buy_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub sell_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 4)))")]
    pub change_24h: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 4)))")]
    pub change_7d: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 4)))")]
    pub change_30d: Decimal,
    pub is_active: bool,
    pub updated_by: Option<i32>,
    pub last_updated: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn spread(&self) -> Decimal {
        self.buy_price - self.sell_price
    }

    pub fn spread_percentage(&self) -> Decimal {
        if self.buy_price > Decimal::ZERO {
            (self.spread() / self.buy_price * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        }
    }
}

/// Vérifie l'invariant de spread sur une paire de prix
pub fn validate_prices(buy_price: Decimal, sell_price: Decimal) -> Result<(), String> {
    if buy_price < MIN_PRICE || sell_price < MIN_PRICE {
        return Err(format!("Prices must be at least {}", MIN_PRICE));
    }
    if sell_price >= buy_price {
        return Err("Sell price must be less than buy price to maintain spread.".to_string());
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

fn current(value: &ActiveValue<Decimal>) -> Option<Decimal> {
    match value {
        Set(v) | Unchanged(v) => Some(*v),
        NotSet => None,
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let (Some(buy), Some(sell)) = (current(&self.buy_price), current(&self.sell_price)) {
            validate_prices(buy, sell).map_err(DbErr::Custom)?;
        }

        let now = Utc::now();
        if insert && matches!(self.created_at, NotSet) {
            self.created_at = Set(now);
        }
        self.last_updated = Set(now);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_prices() {
        assert!(validate_prices(dec!(62.00), dec!(59.50)).is_ok());
        assert!(validate_prices(dec!(62.00), dec!(62.00)).is_err());
        assert!(validate_prices(dec!(62.00), dec!(70.00)).is_err());
        assert!(validate_prices(dec!(1.00), dec!(0.00)).is_err());
        assert!(validate_prices(dec!(0.02), dec!(0.01)).is_ok());
    }

    #[test]
    fn test_min_price_constant() {
        assert_eq!(MIN_PRICE, dec!(0.01));
    }
}
