// Achat / vente de crypto aux prix fixés par l'admin
//
// buy : l'utilisateur paie `amount` au buy_price, reçoit amount / buy_price unités
// sell: l'utilisateur cède `quantity` unités au sell_price
// Le spread (buy - sell) est la marge de la plateforme.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};
use validator::Validate;

use crate::errors::AppError;
use crate::models::crypto_holding;
use crate::models::dto::{BuyCryptoRequest, CryptoTradeResponse, HoldingResponse, SellCryptoRequest};
use crate::models::enums::{NotificationKind, TradeType, TransactionType};
use crate::services::crypto_price_service::CryptoPriceService;
use crate::services::notification_service::NotificationService;
use crate::services::trade_service::calculate_pnl;
use crate::services::wallet_service::{LedgerEntry, WalletService};
use crate::utils::money::{percentage, round2, round_quantity};

pub struct CryptoTradeService;

/// Prix moyen pondéré après un nouvel achat
pub fn weighted_average(
    held_quantity: Decimal,
    held_average: Decimal,
    bought_quantity: Decimal,
    buy_price: Decimal,
) -> Decimal {
    let total = held_quantity + bought_quantity;
    if total.is_zero() {
        return Decimal::ZERO;
    }
    round2((held_quantity * held_average + bought_quantity * buy_price) / total)
}

impl CryptoTradeService {
    pub async fn buy(
        db: &DatabaseConnection,
        user_id: i32,
        request: BuyCryptoRequest,
    ) -> Result<CryptoTradeResponse, AppError> {
        request.validate()?;
        let amount = round2(request.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("Amount must be greater than 0"));
        }

        let txn = db.begin().await?;

        // 1. Prix courant et quantité reçue
        let price = CryptoPriceService::get_active(&txn, &request.coin).await?;
        let quantity = round_quantity(amount / price.buy_price);
        if quantity <= Decimal::ZERO {
            return Err(AppError::validation("Amount is too small for this coin"));
        }

        // 2. Débit atomique du solde
        let new_balance = WalletService::debit(&txn, user_id, amount).await?;

        // 3. Mise à jour (ou création) de la position
        let holding = match Self::find_holding(&txn, user_id, &price.coin).await? {
            Some(holding) => {
                let average =
                    weighted_average(holding.quantity, holding.average_buy_price, quantity, price.buy_price);
                let new_quantity = holding.quantity + quantity;

                let mut active: crypto_holding::ActiveModel = holding.into();
                active.quantity = Set(new_quantity);
                active.average_buy_price = Set(average);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?
            }
            None => {
                crypto_holding::ActiveModel {
                    user_id: Set(user_id),
                    coin: Set(price.coin.clone()),
                    quantity: Set(quantity),
                    average_buy_price: Set(price.buy_price),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        // 4. Journal + notification
        WalletService::record(
            &txn,
            LedgerEntry::completed(
                user_id,
                TransactionType::CryptoBuy,
                amount,
                format!("Bought {} {} at {}", quantity, price.coin, price.buy_price),
            ),
        )
        .await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Success,
            "Crypto purchase",
            format!("You bought {} {} for {}", quantity, price.coin, amount),
        )
        .await?;

        txn.commit().await?;

        info!("User {} bought {} {} for {}", user_id, quantity, price.coin, amount);
        Ok(CryptoTradeResponse {
            coin: price.coin,
            quantity,
            price: price.buy_price,
            amount,
            realized_pnl: None,
            new_balance,
            holding_quantity: holding.quantity,
        })
    }

    pub async fn sell(
        db: &DatabaseConnection,
        user_id: i32,
        request: SellCryptoRequest,
    ) -> Result<CryptoTradeResponse, AppError> {
        request.validate()?;
        let quantity = round_quantity(request.quantity);
        if quantity <= Decimal::ZERO {
            return Err(AppError::validation("Quantity must be greater than 0"));
        }

        let txn = db.begin().await?;

        let price = CryptoPriceService::get_active(&txn, &request.coin).await?;
        let holding = Self::find_holding(&txn, user_id, &price.coin)
            .await?
            .ok_or_else(|| AppError::validation(format!("You do not hold any {}", price.coin)))?;

        let proceeds = round2(quantity * price.sell_price);
        if proceeds <= Decimal::ZERO {
            return Err(AppError::validation("Quantity is too small to sell"));
        }

        // Retrait conditionnel: impossible de vendre plus que la position
        let result = crypto_holding::Entity::update_many()
            .col_expr(crypto_holding::Column::Quantity, Expr::col(crypto_holding::Column::Quantity).sub(quantity))
            .col_expr(crypto_holding::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(crypto_holding::Column::Id.eq(holding.id))
            .filter(crypto_holding::Column::Quantity.gte(quantity))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!("User {} tried to sell {} {} with {}", user_id, quantity, price.coin, holding.quantity);
            return Err(AppError::validation(format!(
                "Insufficient {} holdings: {} available, {} requested",
                price.coin, holding.quantity, quantity
            )));
        }

        let remaining = holding.quantity - quantity;
        if remaining <= Decimal::ZERO {
            crypto_holding::Entity::delete_by_id(holding.id).exec(&txn).await?;
        }

        let (realized_pnl, _) = calculate_pnl(TradeType::Buy, holding.average_buy_price, price.sell_price, quantity);
        let new_balance = WalletService::credit(&txn, user_id, proceeds).await?;

        WalletService::record(
            &txn,
            LedgerEntry::completed(
                user_id,
                TransactionType::CryptoSell,
                proceeds,
                format!("Sold {} {} at {}", quantity, price.coin, price.sell_price),
            ),
        )
        .await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Success,
            "Crypto sale",
            format!("You sold {} {} for {}", quantity, price.coin, proceeds),
        )
        .await?;

        txn.commit().await?;

        info!(
            "User {} sold {} {} for {} (P&L {})",
            user_id, quantity, price.coin, proceeds, realized_pnl
        );
        Ok(CryptoTradeResponse {
            coin: price.coin,
            quantity,
            price: price.sell_price,
            amount: proceeds,
            realized_pnl: Some(realized_pnl),
            new_balance,
            holding_quantity: remaining.max(Decimal::ZERO),
        })
    }

    /// Positions valorisées au prix de vente courant
    pub async fn portfolio(db: &DatabaseConnection, user_id: i32) -> Result<Vec<HoldingResponse>, AppError> {
        let holdings = crypto_holding::Entity::find()
            .filter(crypto_holding::Column::UserId.eq(user_id))
            .filter(crypto_holding::Column::Quantity.gt(Decimal::ZERO))
            .order_by_asc(crypto_holding::Column::Coin)
            .all(db)
            .await?;

        let mut portfolio = Vec::with_capacity(holdings.len());
        for holding in holdings {
            // Pièce retirée du catalogue: valorisée au prix moyen
            let current_price = CryptoPriceService::find(db, &holding.coin)
                .await?
                .map(|p| p.sell_price)
                .unwrap_or(holding.average_buy_price);

            let market_value = round2(holding.quantity * current_price);
            let cost = round2(holding.quantity * holding.average_buy_price);
            let unrealized_pnl = market_value - cost;

            portfolio.push(HoldingResponse {
                unrealized_pnl_percentage: percentage(unrealized_pnl, cost),
                coin: holding.coin,
                quantity: holding.quantity,
                average_buy_price: holding.average_buy_price,
                current_price,
                market_value,
                unrealized_pnl,
            });
        }

        Ok(portfolio)
    }

    async fn find_holding<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        coin: &str,
    ) -> Result<Option<crypto_holding::Model>, AppError> {
        Ok(crypto_holding::Entity::find()
            .filter(crypto_holding::Column::UserId.eq(user_id))
            .filter(crypto_holding::Column::Coin.eq(coin))
            .one(conn)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_user, memory_db};
    use rust_decimal_macros::dec;

    fn buy(coin: &str, amount: Decimal) -> BuyCryptoRequest {
        BuyCryptoRequest {
            coin: coin.to_string(),
            amount,
        }
    }

    fn sell(coin: &str, quantity: Decimal) -> SellCryptoRequest {
        SellCryptoRequest {
            coin: coin.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_weighted_average() {
        assert_eq!(weighted_average(dec!(1), dec!(60), dec!(1), dec!(70)), dec!(65));
        assert_eq!(weighted_average(Decimal::ZERO, Decimal::ZERO, dec!(2), dec!(62)), dec!(62));
    }

    #[actix_web::test]
    async fn test_buy_then_sell_exacoin() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();
        let user = create_user(&db, "crypto@example.com", dec!(200)).await;

        // 124 / 62.00 = 2 EXACOIN
        let bought = CryptoTradeService::buy(&db, user.id, buy("exacoin", dec!(124))).await.unwrap();
        assert_eq!(bought.quantity, dec!(2));
        assert_eq!(bought.new_balance.round_dp(2), dec!(76));

        // 1 EXACOIN vendu à 59.50: P&L = 59.50 - 62.00
        let sold = CryptoTradeService::sell(&db, user.id, sell("EXACOIN", dec!(1))).await.unwrap();
        assert_eq!(sold.amount, dec!(59.50));
        assert_eq!(sold.realized_pnl.map(|p| p.round_dp(2)), Some(dec!(-2.50)));
        assert_eq!(sold.new_balance.round_dp(2), dec!(135.50));

        let portfolio = CryptoTradeService::portfolio(&db, user.id).await.unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio[0].quantity.round_dp(8), dec!(1));
        assert_eq!(portfolio[0].market_value, dec!(59.50));
        assert_eq!(portfolio[0].unrealized_pnl, dec!(-2.50));
    }

    #[actix_web::test]
    async fn test_cannot_oversell_or_overspend() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();
        let user = create_user(&db, "limits@example.com", dec!(100)).await;

        assert!(matches!(
            CryptoTradeService::buy(&db, user.id, buy("BTC", dec!(150))).await,
            Err(AppError::InsufficientFunds { .. })
        ));

        CryptoTradeService::buy(&db, user.id, buy("USDT", dec!(10))).await.unwrap();
        assert!(matches!(
            CryptoTradeService::sell(&db, user.id, sell("USDT", dec!(11))).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            CryptoTradeService::sell(&db, user.id, sell("ETH", dec!(1))).await,
            Err(AppError::Validation(_))
        ));

        assert_eq!(WalletService::get_balance(&db, user.id).await.unwrap().round_dp(2), dec!(90));
    }

    #[actix_web::test]
    async fn test_selling_everything_removes_holding() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();
        let user = create_user(&db, "all@example.com", dec!(10)).await;

        CryptoTradeService::buy(&db, user.id, buy("USDT", dec!(10))).await.unwrap();
        let sold = CryptoTradeService::sell(&db, user.id, sell("USDT", dec!(10))).await.unwrap();
        assert_eq!(sold.amount, dec!(9.70));
        assert_eq!(sold.holding_quantity, Decimal::ZERO);
        assert!(CryptoTradeService::portfolio(&db, user.id).await.unwrap().is_empty());
    }
}
