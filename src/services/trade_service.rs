use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::dto::CreateTradeRequest;
use crate::models::enums::{CloseReason, NotificationKind, TradeStatus, TradeType};
use crate::models::{trade, trade_history};
use crate::services::notification_service::NotificationService;
use crate::services::wallet_service::WalletService;
use crate::utils::money::{percentage, round2};

pub struct TradeService;

/// Décimales stockées pour la quantité d'un trade (colonne numeric(12,4))
pub const QUANTITY_SCALE: u32 = 4;

/// Résultat de l'évaluation d'un nouveau prix sur un trade ouvert
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceOutcome {
    /// Fermeture au prix fourni (délai dépassé)
    Expired { exit_price: Decimal },
    /// Fermeture au niveau du stop loss
    StopLossHit { exit_price: Decimal },
    /// Fermeture au niveau du take profit
    TakeProfitHit { exit_price: Decimal },
    /// Le trade reste ouvert, seul current_price change
    Updated,
}

impl PriceOutcome {
    fn closing(self) -> Option<(Decimal, CloseReason)> {
        match self {
            PriceOutcome::Expired { exit_price } => Some((exit_price, CloseReason::Expired)),
            PriceOutcome::StopLossHit { exit_price } => Some((exit_price, CloseReason::StopLoss)),
            PriceOutcome::TakeProfitHit { exit_price } => Some((exit_price, CloseReason::TakeProfit)),
            PriceOutcome::Updated => None,
        }
    }
}

/// P&L et pourcentage d'une position
/// buy:  (exit - entry) * quantity
/// sell: (entry - exit) * quantity
pub fn calculate_pnl(
    trade_type: TradeType,
    entry_price: Decimal,
    exit_price: Decimal,
    quantity: Decimal,
) -> (Decimal, Decimal) {
    let raw = match trade_type {
        TradeType::Buy => (exit_price - entry_price) * quantity,
        TradeType::Sell => (entry_price - exit_price) * quantity,
    };
    let cost = entry_price * quantity;

    (round2(raw), percentage(raw, cost))
}

/// Règles de cohérence d'un nouveau trade
pub fn validate_new_trade(request: &CreateTradeRequest) -> Result<(), String> {
    if request.quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than 0".to_string());
    }
    if request.quantity.normalize().scale() > QUANTITY_SCALE {
        return Err(format!("Quantity supports at most {} decimal places", QUANTITY_SCALE));
    }
    if request.entry_price <= Decimal::ZERO {
        return Err("Entry price must be greater than 0".to_string());
    }
    if request.stop_loss.is_some_and(|sl| sl <= Decimal::ZERO) {
        return Err("Stop loss must be greater than 0".to_string());
    }
    if request.take_profit.is_some_and(|tp| tp <= Decimal::ZERO) {
        return Err("Take profit must be greater than 0".to_string());
    }

    let entry = request.entry_price;
    match request.trade_type {
        TradeType::Buy => {
            if request.stop_loss.is_some_and(|sl| sl >= entry) {
                return Err("For buy trades, stop loss must be below entry price".to_string());
            }
            if request.take_profit.is_some_and(|tp| tp <= entry) {
                return Err("For buy trades, take profit must be above entry price".to_string());
            }
        }
        TradeType::Sell => {
            if request.stop_loss.is_some_and(|sl| sl <= entry) {
                return Err("For sell trades, stop loss must be above entry price".to_string());
            }
            if request.take_profit.is_some_and(|tp| tp >= entry) {
                return Err("For sell trades, take profit must be below entry price".to_string());
            }
        }
    }

    Ok(())
}

/// Ordre des vérifications: expiration, puis stop loss, puis take profit
pub fn evaluate_price(trade: &trade::Model, price: Decimal, now: DateTime<Utc>) -> PriceOutcome {
    if trade.expires_at.is_some_and(|expires_at| now >= expires_at) {
        return PriceOutcome::Expired { exit_price: price };
    }

    if let Some(stop_loss) = trade.stop_loss {
        let hit = match trade.trade_type {
            TradeType::Buy => price <= stop_loss,
            TradeType::Sell => price >= stop_loss,
        };
        if hit {
            return PriceOutcome::StopLossHit { exit_price: stop_loss };
        }
    }

    if let Some(take_profit) = trade.take_profit {
        let hit = match trade.trade_type {
            TradeType::Buy => price >= take_profit,
            TradeType::Sell => price <= take_profit,
        };
        if hit {
            return PriceOutcome::TakeProfitHit { exit_price: take_profit };
        }
    }

    PriceOutcome::Updated
}

impl TradeService {
    /// Ouvre un trade simulé
    /// Le solde doit couvrir entry_price * quantity mais n'est pas débité
    pub async fn create_trade(
        db: &DatabaseConnection,
        user_id: i32,
        request: CreateTradeRequest,
    ) -> Result<trade::Model, AppError> {
        // 1. Valider la cohérence des niveaux
        validate_new_trade(&request).map_err(AppError::Validation)?;

        // 2. Vérifier le solde
        let cost = round2(request.entry_price * request.quantity);
        if !WalletService::has_sufficient_funds(db, user_id, cost).await? {
            let err = WalletService::insufficient_funds(db, user_id, cost).await?;
            warn!("Trade refused for user {}: {}", user_id, err);
            return Err(err);
        }

        // 3. Calculer l'expiration si un timeframe est fourni
        let now = Utc::now();
        let expires_at = request.timeframe.map(|tf| now + tf.duration());

        let txn = db.begin().await?;

        let trade = trade::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            asset: Set(request.asset),
            trade_type: Set(request.trade_type),
            status: Set(TradeStatus::Open),
            entry_price: Set(request.entry_price),
            current_price: Set(request.entry_price),
            exit_price: Set(None),
            quantity: Set(request.quantity),
            stop_loss: Set(request.stop_loss),
            take_profit: Set(request.take_profit),
            timeframe: Set(request.timeframe),
            expires_at: Set(expires_at),
            profit_loss: Set(Decimal::ZERO),
            profit_loss_percentage: Set(Decimal::ZERO),
            created_at: Set(now),
            closed_at: Set(None),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Info,
            "Trade opened",
            format!(
                "{:?} {:?} position of {} opened at {}",
                trade.trade_type, trade.asset, trade.quantity, trade.entry_price
            ),
        )
        .await?;

        txn.commit().await?;

        info!("Trade {} opened by user {}", trade.id, user_id);
        Ok(trade)
    }

    /// Fermeture manuelle: le statut devient "closed", la raison est gardée dans l'historique
    pub async fn close_trade(
        db: &DatabaseConnection,
        user_id: i32,
        trade_id: Uuid,
        exit_price: Decimal,
        close_reason: CloseReason,
    ) -> Result<trade::Model, AppError> {
        if exit_price <= Decimal::ZERO {
            return Err(AppError::validation("Exit price must be greater than 0"));
        }

        let txn = db.begin().await?;
        let trade = Self::find_open(&txn, user_id, trade_id).await?;
        let closed = Self::apply_close(&txn, trade, exit_price, TradeStatus::Closed, close_reason).await?;
        txn.commit().await?;

        Ok(closed)
    }

    /// Applique un nouveau prix de marché et déclenche les fermetures automatiques
    pub async fn update_price(
        db: &DatabaseConnection,
        user_id: i32,
        trade_id: Uuid,
        current_price: Option<Decimal>,
    ) -> Result<trade::Model, AppError> {
        let price = current_price.ok_or_else(|| AppError::validation("current_price is required"))?;
        if price <= Decimal::ZERO {
            return Err(AppError::validation("current_price must be greater than 0"));
        }

        let txn = db.begin().await?;
        let trade = Self::find_open(&txn, user_id, trade_id).await?;

        let updated = match evaluate_price(&trade, price, Utc::now()).closing() {
            Some((exit_price, reason)) => {
                Self::apply_close(&txn, trade, exit_price, reason.final_status(), reason).await?
            }
            None => {
                let (pnl, pnl_percentage) =
                    calculate_pnl(trade.trade_type, trade.entry_price, price, trade.quantity);

                let mut active: trade::ActiveModel = trade.into();
                active.current_price = Set(price);
                active.profit_loss = Set(pnl);
                active.profit_loss_percentage = Set(pnl_percentage);
                active.update(&txn).await?
            }
        };

        txn.commit().await?;
        Ok(updated)
    }

    /// Annule un trade ouvert (aucune ligne d'historique)
    pub async fn cancel_trade(db: &DatabaseConnection, user_id: i32, trade_id: Uuid) -> Result<trade::Model, AppError> {
        let trade = Self::find_open(db, user_id, trade_id).await?;

        let mut active: trade::ActiveModel = trade.into();
        active.status = Set(TradeStatus::Cancelled);
        active.closed_at = Set(Some(Utc::now()));
        let cancelled = active.update(db).await?;

        info!("Trade {} cancelled by user {}", trade_id, user_id);
        Ok(cancelled)
    }

    pub async fn get_trade(db: &DatabaseConnection, user_id: i32, trade_id: Uuid) -> Result<trade::Model, AppError> {
        trade::Entity::find_by_id(trade_id)
            .filter(trade::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Trade not found"))
    }

    pub async fn list_trades(db: &DatabaseConnection, user_id: i32) -> Result<Vec<trade::Model>, AppError> {
        Ok(trade::Entity::find()
            .filter(trade::Column::UserId.eq(user_id))
            .order_by_desc(trade::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn open_trades(db: &DatabaseConnection, user_id: i32) -> Result<Vec<trade::Model>, AppError> {
        Ok(trade::Entity::find()
            .filter(trade::Column::UserId.eq(user_id))
            .filter(trade::Column::Status.eq(TradeStatus::Open))
            .order_by_desc(trade::Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Tous les trades qui ne sont plus ouverts
    pub async fn closed_trades(db: &DatabaseConnection, user_id: i32) -> Result<Vec<trade::Model>, AppError> {
        Ok(trade::Entity::find()
            .filter(trade::Column::UserId.eq(user_id))
            .filter(trade::Column::Status.ne(TradeStatus::Open))
            .order_by_desc(trade::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn history(db: &DatabaseConnection, user_id: i32) -> Result<Vec<trade_history::Model>, AppError> {
        Ok(trade_history::Entity::find()
            .filter(trade_history::Column::UserId.eq(user_id))
            .order_by_desc(trade_history::Column::ClosedAt)
            .all(db)
            .await?)
    }

    async fn find_open<C: ConnectionTrait>(conn: &C, user_id: i32, trade_id: Uuid) -> Result<trade::Model, AppError> {
        let trade = trade::Entity::find_by_id(trade_id)
            .filter(trade::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("Trade not found"))?;

        if trade.status != TradeStatus::Open {
            return Err(AppError::validation(format!(
                "Trade is not open (status: {})",
                trade.status.to_value()
            )));
        }
        Ok(trade)
    }

    /// Ferme le trade, écrit l'historique et notifie l'utilisateur
    async fn apply_close<C: ConnectionTrait>(
        conn: &C,
        trade: trade::Model,
        exit_price: Decimal,
        status: TradeStatus,
        reason: CloseReason,
    ) -> Result<trade::Model, AppError> {
        let (pnl, pnl_percentage) = calculate_pnl(trade.trade_type, trade.entry_price, exit_price, trade.quantity);
        let now = Utc::now();

        trade_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(trade.user_id),
            trade_id: Set(trade.id),
            asset: Set(trade.asset),
            trade_type: Set(trade.trade_type),
            entry_price: Set(trade.entry_price),
            exit_price: Set(exit_price),
            quantity: Set(trade.quantity),
            profit_loss: Set(pnl),
            profit_loss_percentage: Set(pnl_percentage),
            close_reason: Set(reason),
            opened_at: Set(trade.created_at),
            closed_at: Set(now),
        }
        .insert(conn)
        .await?;

        let user_id = trade.user_id;
        let trade_id = trade.id;

        let mut active: trade::ActiveModel = trade.into();
        active.status = Set(status);
        active.exit_price = Set(Some(exit_price));
        active.current_price = Set(exit_price);
        active.profit_loss = Set(pnl);
        active.profit_loss_percentage = Set(pnl_percentage);
        active.closed_at = Set(Some(now));
        let closed = active.update(conn).await?;

        let kind = if pnl >= Decimal::ZERO {
            NotificationKind::Success
        } else {
            NotificationKind::Warning
        };
        NotificationService::notify(
            conn,
            user_id,
            kind,
            "Trade closed",
            format!("Trade closed ({}) at {} with P&L {}", reason.to_value(), exit_price, pnl),
        )
        .await?;

        info!("Trade {} closed ({}) P&L {}", trade_id, reason.to_value(), pnl);
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_user, memory_db};
    use crate::models::enums::{Asset, Timeframe};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn request(trade_type: TradeType, sl: Option<Decimal>, tp: Option<Decimal>) -> CreateTradeRequest {
        CreateTradeRequest {
            asset: Asset::Gold,
            trade_type,
            entry_price: dec!(100),
            quantity: dec!(2),
            stop_loss: sl,
            take_profit: tp,
            timeframe: None,
        }
    }

    fn open_trade(trade_type: TradeType, sl: Option<Decimal>, tp: Option<Decimal>) -> trade::Model {
        let now = Utc::now();
        trade::Model {
            id: Uuid::new_v4(),
            user_id: 1,
            asset: Asset::Gold,
            trade_type,
            status: TradeStatus::Open,
            entry_price: dec!(100),
            current_price: dec!(100),
            exit_price: None,
            quantity: dec!(2),
            stop_loss: sl,
            take_profit: tp,
            timeframe: None,
            expires_at: None,
            profit_loss: Decimal::ZERO,
            profit_loss_percentage: Decimal::ZERO,
            created_at: now,
            closed_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_pnl_buy_and_sell() {
        assert_eq!(calculate_pnl(TradeType::Buy, dec!(100), dec!(110), dec!(2)), (dec!(20), dec!(10)));
        assert_eq!(calculate_pnl(TradeType::Sell, dec!(100), dec!(110), dec!(2)), (dec!(-20), dec!(-10)));
        assert_eq!(calculate_pnl(TradeType::Sell, dec!(50), dec!(45), dec!(1.5)), (dec!(7.5), dec!(10)));
    }

    #[test]
    fn test_pnl_zero_cost_gives_zero_percentage() {
        let (_, pct) = calculate_pnl(TradeType::Buy, dec!(100), dec!(120), Decimal::ZERO);
        assert_eq!(pct, Decimal::ZERO);
    }

    #[test]
    fn test_validate_levels() {
        assert!(validate_new_trade(&request(TradeType::Buy, Some(dec!(90)), Some(dec!(120)))).is_ok());
        assert!(validate_new_trade(&request(TradeType::Buy, Some(dec!(100)), None)).is_err());
        assert!(validate_new_trade(&request(TradeType::Buy, None, Some(dec!(95)))).is_err());
        assert!(validate_new_trade(&request(TradeType::Sell, Some(dec!(110)), Some(dec!(90)))).is_ok());
        assert!(validate_new_trade(&request(TradeType::Sell, Some(dec!(90)), None)).is_err());
        assert!(validate_new_trade(&request(TradeType::Sell, None, Some(dec!(105)))).is_err());
        assert!(validate_new_trade(&request(TradeType::Buy, Some(dec!(-1)), None)).is_err());
    }

    #[test]
    fn test_quantity_precision_matches_storage() {
        let mut req = request(TradeType::Buy, None, None);
        req.quantity = dec!(0.1234);
        assert!(validate_new_trade(&req).is_ok());

        // zéros de fin ignorés
        req.quantity = dec!(1.50000);
        assert!(validate_new_trade(&req).is_ok());

        req.quantity = dec!(0.12345);
        assert_eq!(
            validate_new_trade(&req).unwrap_err(),
            "Quantity supports at most 4 decimal places"
        );
    }

    #[test]
    fn test_evaluate_price_buy() {
        let trade = open_trade(TradeType::Buy, Some(dec!(90)), Some(dec!(120)));
        let now = Utc::now();

        assert_eq!(evaluate_price(&trade, dec!(85), now), PriceOutcome::StopLossHit { exit_price: dec!(90) });
        assert_eq!(evaluate_price(&trade, dec!(125), now), PriceOutcome::TakeProfitHit { exit_price: dec!(120) });
        assert_eq!(evaluate_price(&trade, dec!(105), now), PriceOutcome::Updated);
    }

    #[test]
    fn test_evaluate_price_sell() {
        let trade = open_trade(TradeType::Sell, Some(dec!(110)), Some(dec!(80)));
        let now = Utc::now();

        assert_eq!(evaluate_price(&trade, dec!(110), now), PriceOutcome::StopLossHit { exit_price: dec!(110) });
        assert_eq!(evaluate_price(&trade, dec!(79), now), PriceOutcome::TakeProfitHit { exit_price: dec!(80) });
        assert_eq!(evaluate_price(&trade, dec!(95), now), PriceOutcome::Updated);
    }

    #[test]
    fn test_expiry_checked_before_stop_loss() {
        let mut trade = open_trade(TradeType::Buy, Some(dec!(90)), Some(dec!(120)));
        let now = Utc::now();
        trade.expires_at = Some(now - Duration::seconds(1));

        assert_eq!(evaluate_price(&trade, dec!(50), now), PriceOutcome::Expired { exit_price: dec!(50) });
    }

    #[actix_web::test]
    async fn test_create_requires_balance_without_debit() {
        let db = memory_db().await;
        let user = create_user(&db, "trader@example.com", dec!(150)).await;

        let err = TradeService::create_trade(&db, user.id, request(TradeType::Buy, None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));

        let mut small = request(TradeType::Buy, None, None);
        small.quantity = dec!(1);
        small.timeframe = Some(Timeframe::OneHour);
        let trade = TradeService::create_trade(&db, user.id, small).await.unwrap();

        assert_eq!(trade.status, TradeStatus::Open);
        assert!(trade.expires_at.is_some());
        let balance = WalletService::get_balance(&db, user.id).await.unwrap();
        assert_eq!(balance.round_dp(2), dec!(150));
    }

    #[actix_web::test]
    async fn test_update_price_hits_stop_loss_and_writes_history() {
        let db = memory_db().await;
        let user = create_user(&db, "sl@example.com", dec!(1000)).await;

        let trade = TradeService::create_trade(&db, user.id, request(TradeType::Buy, Some(dec!(90)), Some(dec!(120))))
            .await
            .unwrap();

        let still_open = TradeService::update_price(&db, user.id, trade.id, Some(dec!(105))).await.unwrap();
        assert_eq!(still_open.status, TradeStatus::Open);
        assert_eq!(still_open.profit_loss.round_dp(2), dec!(10));

        let closed = TradeService::update_price(&db, user.id, trade.id, Some(dec!(80))).await.unwrap();
        assert_eq!(closed.status, TradeStatus::StopLossHit);
        assert_eq!(closed.exit_price.map(|p| p.round_dp(2)), Some(dec!(90)));
        assert_eq!(closed.profit_loss.round_dp(2), dec!(-20));

        let history = TradeService::history(&db, user.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].close_reason, CloseReason::StopLoss);

        // Un trade fermé ne peut plus être modifié
        assert!(matches!(
            TradeService::update_price(&db, user.id, trade.id, Some(dec!(100))).await,
            Err(AppError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn test_manual_close_and_cancel() {
        let db = memory_db().await;
        let user = create_user(&db, "close@example.com", dec!(1000)).await;

        let first = TradeService::create_trade(&db, user.id, request(TradeType::Sell, None, None)).await.unwrap();
        let closed = TradeService::close_trade(&db, user.id, first.id, dec!(95), CloseReason::Manual)
            .await
            .unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.profit_loss.round_dp(2), dec!(10));

        let second = TradeService::create_trade(&db, user.id, request(TradeType::Buy, None, None)).await.unwrap();
        let cancelled = TradeService::cancel_trade(&db, user.id, second.id).await.unwrap();
        assert_eq!(cancelled.status, TradeStatus::Cancelled);

        assert!(TradeService::open_trades(&db, user.id).await.unwrap().is_empty());
        assert_eq!(TradeService::closed_trades(&db, user.id).await.unwrap().len(), 2);
        assert_eq!(TradeService::history(&db, user.id).await.unwrap().len(), 1);
    }
}
