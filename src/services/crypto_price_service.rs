use rust_decimal::Decimal;
use sea_orm::*;
use tracing::{info, warn};
use validator::Validate;

use crate::errors::AppError;
use crate::models::crypto_price::{self, validate_prices};
use crate::models::crypto_price_history;
use crate::models::dto::{BulkUpdateError, BulkUpdateResponse, BulkUpdatePricesRequest, UpdateCryptoPriceRequest};
use crate::services::price_feed::{MarketQuote, PriceFeed};
use crate::utils::money::round2;

/// Pièce dont les deux prix sont fixés par l'admin
pub const ADMIN_CONTROLLED_COIN: &str = "EXACOIN";
pub const HISTORY_LIMIT: u64 = 50;

/// Prix de vente par défaut: 97% du prix d'achat
pub fn default_sell_price(buy_price: Decimal) -> Decimal {
    round2(buy_price * Decimal::new(97, 2))
}

/// Prix de départ insérés au premier démarrage: (coin, nom, achat, vente, 24h, 7j, 30j)
const SEED_PRICES: &[(&str, &str, i64, i64, i64, i64, i64)] = &[
    ("EXACOIN", "Exacoin", 6200, 5950, 333, 1280, 8950),
    ("BTC", "Bitcoin", 6500000, 6305000, 210, -150, 870),
    ("ETH", "Ethereum", 320000, 310400, 180, 320, 1540),
    ("USDT", "Tether", 100, 97, 0, 0, 0),
];

pub struct CryptoPriceService;

impl CryptoPriceService {
    /// Prix visibles par les utilisateurs
    pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<crypto_price::Model>, AppError> {
        Ok(crypto_price::Entity::find()
            .filter(crypto_price::Column::IsActive.eq(true))
            .order_by_asc(crypto_price::Column::Coin)
            .all(db)
            .await?)
    }

    pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<crypto_price::Model>, AppError> {
        Ok(crypto_price::Entity::find()
            .order_by_asc(crypto_price::Column::Coin)
            .all(db)
            .await?)
    }

    pub async fn find<C: ConnectionTrait>(conn: &C, coin: &str) -> Result<Option<crypto_price::Model>, AppError> {
        Ok(crypto_price::Entity::find()
            .filter(crypto_price::Column::Coin.eq(coin.trim().to_uppercase()))
            .one(conn)
            .await?)
    }

    /// Prix d'une pièce ouverte au trading
    pub async fn get_active<C: ConnectionTrait>(conn: &C, coin: &str) -> Result<crypto_price::Model, AppError> {
        match Self::find(conn, coin).await? {
            Some(price) if price.is_active => Ok(price),
            Some(_) => Err(AppError::validation(format!("Trading is disabled for {}", coin.to_uppercase()))),
            None => Err(AppError::not_found(format!("Price for {} not found", coin.to_uppercase()))),
        }
    }

    /// Mise à jour unitaire (PUT /admin/crypto/prices)
    pub async fn update_price(
        db: &DatabaseConnection,
        admin_id: i32,
        request: UpdateCryptoPriceRequest,
    ) -> Result<crypto_price::Model, AppError> {
        request.validate()?;

        let txn = db.begin().await?;
        let price = Self::apply_update(&txn, admin_id, &request).await?;
        txn.commit().await?;

        info!(
            "Price {} updated by admin {}: buy {} / sell {}",
            price.coin, admin_id, price.buy_price, price.sell_price
        );
        Ok(price)
    }

    /// Mise à jour groupée: chaque entrée est appliquée ou rejetée indépendamment
    /// Le booléen retourné indique si toutes les entrées ont été appliquées
    pub async fn bulk_update(
        db: &DatabaseConnection,
        admin_id: i32,
        request: BulkUpdatePricesRequest,
    ) -> Result<BulkUpdateResponse, AppError> {
        if request.prices.is_empty() {
            return Err(AppError::validation("No prices provided"));
        }

        let mut updated = Vec::new();
        let mut errors = Vec::new();

        for entry in request.prices {
            let coin = entry.coin.trim().to_uppercase();

            let result = match entry.validate() {
                Ok(()) => {
                    let txn = db.begin().await?;
                    match Self::apply_update(&txn, admin_id, &entry).await {
                        Ok(price) => {
                            txn.commit().await?;
                            Ok(price)
                        }
                        Err(err) => {
                            txn.rollback().await?;
                            Err(err)
                        }
                    }
                }
                Err(err) => Err(AppError::from(err)),
            };

            match result {
                Ok(price) => updated.push(price.coin),
                Err(err @ (AppError::Validation(_) | AppError::NotFound(_))) => {
                    warn!("Bulk price update rejected for {}: {}", coin, err);
                    errors.push(BulkUpdateError {
                        coin,
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!("Bulk price update: {} applied, {} rejected", updated.len(), errors.len());
        Ok(BulkUpdateResponse {
            success: errors.is_empty(),
            message: format!("Updated {} prices", updated.len()),
            updated,
            errors,
        })
    }

    /// Synchronise les prix d'achat avec le flux de marché
    /// Le prix de vente admin est conservé tant que l'invariant tient
    pub async fn sync_from_feed(
        db: &DatabaseConnection,
        admin_id: Option<i32>,
        feed: &dyn PriceFeed,
    ) -> Result<BulkUpdateResponse, AppError> {
        let quotes = feed.fetch_quotes().await?;

        let mut updated = Vec::new();
        let mut errors = Vec::new();

        for quote in quotes {
            let txn = db.begin().await?;
            match Self::apply_quote(&txn, admin_id, &quote).await {
                Ok(price) => {
                    txn.commit().await?;
                    updated.push(price.coin);
                }
                Err(AppError::Validation(msg)) => {
                    txn.rollback().await?;
                    warn!("Feed quote for {} skipped: {}", quote.coin, msg);
                    errors.push(BulkUpdateError {
                        coin: quote.coin,
                        error: msg,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!("Price sync: {} coins updated", updated.len());
        Ok(BulkUpdateResponse {
            success: errors.is_empty(),
            message: format!("Synced {} prices", updated.len()),
            updated,
            errors,
        })
    }

    /// Active / désactive le trading d'une pièce
    pub async fn toggle_active(db: &DatabaseConnection, admin_id: i32, coin: &str) -> Result<crypto_price::Model, AppError> {
        let price = Self::find(db, coin)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Price for {} not found", coin.to_uppercase())))?;

        let enabled = !price.is_active;
        let mut active: crypto_price::ActiveModel = price.into();
        active.is_active = Set(enabled);
        active.updated_by = Set(Some(admin_id));
        let price = active.update(db).await?;

        info!("{} trading {}", price.coin, if enabled { "enabled" } else { "disabled" });
        Ok(price)
    }

    /// 50 dernières modifications, les plus récentes d'abord
    pub async fn history(db: &DatabaseConnection, coin: &str) -> Result<Vec<crypto_price_history::Model>, AppError> {
        Ok(crypto_price_history::Entity::find()
            .filter(crypto_price_history::Column::Coin.eq(coin.trim().to_uppercase()))
            .order_by_desc(crypto_price_history::Column::CreatedAt)
            .order_by_desc(crypto_price_history::Column::Id)
            .limit(HISTORY_LIMIT)
            .all(db)
            .await?)
    }

    /// Insère les prix de départ si la table est vide
    pub async fn seed_defaults(db: &DatabaseConnection) -> Result<usize, AppError> {
        if crypto_price::Entity::find().count(db).await? > 0 {
            return Ok(0);
        }

        let txn = db.begin().await?;
        for (coin, name, buy, sell, c24, c7, c30) in SEED_PRICES {
            let request = UpdateCryptoPriceRequest {
                coin: (*coin).to_owned(),
                name: Some((*name).to_owned()),
                buy_price: Some(Decimal::new(*buy, 2)),
                sell_price: Some(Decimal::new(*sell, 2)),
                change_24h: Some(Decimal::new(*c24, 2)),
                change_7d: Some(Decimal::new(*c7, 2)),
                change_30d: Some(Decimal::new(*c30, 2)),
            };
            Self::write(&txn, None, None, &request).await?;
        }
        txn.commit().await?;

        info!("Seeded {} crypto prices", SEED_PRICES.len());
        Ok(SEED_PRICES.len())
    }

    // Règles d'une mise à jour admin:
    //   - sell_price toujours requis
    //   - buy_price requis pour EXACOIN et pour créer une nouvelle pièce
    async fn apply_update<C: ConnectionTrait>(
        conn: &C,
        admin_id: i32,
        request: &UpdateCryptoPriceRequest,
    ) -> Result<crypto_price::Model, AppError> {
        let coin = request.coin.trim().to_uppercase();

        if request.sell_price.is_none() {
            return Err(AppError::validation("Sell price is required"));
        }
        if coin == ADMIN_CONTROLLED_COIN && request.buy_price.is_none() {
            return Err(AppError::validation(format!("Buy price is required for {}", ADMIN_CONTROLLED_COIN)));
        }

        let existing = Self::find(conn, &coin).await?;
        if existing.is_none() && request.buy_price.is_none() {
            return Err(AppError::validation(format!(
                "Buy price is required to create new {} price record",
                coin
            )));
        }

        Self::write(conn, existing, Some(admin_id), request).await
    }

    /// Écrit la ligne de prix puis la ligne d'historique
    /// L'invariant est vérifié AVANT toute écriture
    async fn write<C: ConnectionTrait>(
        conn: &C,
        existing: Option<crypto_price::Model>,
        admin_id: Option<i32>,
        request: &UpdateCryptoPriceRequest,
    ) -> Result<crypto_price::Model, AppError> {
        let coin = request.coin.trim().to_uppercase();

        let buy_price = request
            .buy_price
            .or(existing.as_ref().map(|p| p.buy_price))
            .ok_or_else(|| AppError::validation("Buy price is required"))?;
        let sell_price = request
            .sell_price
            .or(existing.as_ref().map(|p| p.sell_price))
            .ok_or_else(|| AppError::validation("Sell price is required"))?;
        validate_prices(buy_price, sell_price).map_err(AppError::Validation)?;

        let price = match existing {
            Some(model) => {
                let mut active: crypto_price::ActiveModel = model.into();
                active.buy_price = Set(buy_price);
                active.sell_price = Set(sell_price);
                if let Some(name) = &request.name {
                    active.name = Set(name.clone());
                }
                if let Some(change) = request.change_24h {
                    active.change_24h = Set(change);
                }
                if let Some(change) = request.change_7d {
                    active.change_7d = Set(change);
                }
                if let Some(change) = request.change_30d {
                    active.change_30d = Set(change);
                }
                active.is_active = Set(true);
                active.updated_by = Set(admin_id);
                active.update(conn).await?
            }
            None => {
                crypto_price::ActiveModel {
                    coin: Set(coin.clone()),
                    name: Set(request.name.clone().unwrap_or_else(|| coin.clone())),
                    buy_price: Set(buy_price),
                    sell_price: Set(sell_price),
                    change_24h: Set(request.change_24h.unwrap_or_default()),
                    change_7d: Set(request.change_7d.unwrap_or_default()),
                    change_30d: Set(request.change_30d.unwrap_or_default()),
                    is_active: Set(true),
                    updated_by: Set(admin_id),
                    ..Default::default()
                }
                .insert(conn)
                .await?
            }
        };

        Self::log_history(conn, &price).await?;
        Ok(price)
    }

    async fn apply_quote<C: ConnectionTrait>(
        conn: &C,
        admin_id: Option<i32>,
        quote: &MarketQuote,
    ) -> Result<crypto_price::Model, AppError> {
        let existing = Self::find(conn, &quote.coin).await?;

        // Prix de vente admin conservé s'il reste sous le nouveau prix d'achat
        let sell_price = match &existing {
            Some(price) if validate_prices(quote.price, price.sell_price).is_ok() => price.sell_price,
            _ => default_sell_price(quote.price),
        };

        let request = UpdateCryptoPriceRequest {
            coin: quote.coin.clone(),
            name: existing.is_none().then(|| quote.name.clone()),
            buy_price: Some(quote.price),
            sell_price: Some(sell_price),
            change_24h: Some(quote.change_24h),
            change_7d: Some(quote.change_7d),
            change_30d: Some(quote.change_30d),
        };

        Self::write(conn, existing, admin_id, &request).await
    }

    async fn log_history<C: ConnectionTrait>(conn: &C, price: &crypto_price::Model) -> Result<(), AppError> {
        crypto_price_history::ActiveModel {
            coin: Set(price.coin.clone()),
            buy_price: Set(price.buy_price),
            sell_price: Set(price.sell_price),
            change_24h: Set(price.change_24h),
            updated_by: Set(price.updated_by),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct StaticFeed(Vec<MarketQuote>);

    #[async_trait]
    impl PriceFeed for StaticFeed {
        async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn quote(coin: &str, price: Decimal) -> MarketQuote {
        MarketQuote {
            coin: coin.to_string(),
            name: coin.to_string(),
            price,
            change_24h: dec!(1.5),
            change_7d: Decimal::ZERO,
            change_30d: Decimal::ZERO,
        }
    }

    fn update(coin: &str, buy: Option<Decimal>, sell: Option<Decimal>) -> UpdateCryptoPriceRequest {
        UpdateCryptoPriceRequest {
            coin: coin.to_string(),
            name: None,
            buy_price: buy,
            sell_price: sell,
            change_24h: None,
            change_7d: None,
            change_30d: None,
        }
    }

    fn assert_invariant(prices: &[crypto_price::Model]) {
        for p in prices {
            assert!(p.sell_price >= dec!(0.01), "{} sell below minimum", p.coin);
            assert!(p.sell_price < p.buy_price, "{} sell >= buy", p.coin);
        }
    }

    #[test]
    fn test_default_sell_price() {
        assert_eq!(default_sell_price(dec!(65000)), dec!(63050.00));
        assert_eq!(default_sell_price(dec!(1.00)), dec!(0.97));
    }

    #[actix_web::test]
    async fn test_seed_only_once() {
        let db = memory_db().await;
        assert_eq!(CryptoPriceService::seed_defaults(&db).await.unwrap(), 4);
        assert_eq!(CryptoPriceService::seed_defaults(&db).await.unwrap(), 0);

        let prices = CryptoPriceService::list_all(&db).await.unwrap();
        assert_eq!(prices.len(), 4);
        assert_invariant(&prices);

        let exa = CryptoPriceService::get_active(&db, "exacoin").await.unwrap();
        assert_eq!(exa.buy_price.round_dp(2), dec!(62.00));
        assert_eq!(exa.sell_price.round_dp(2), dec!(59.50));
    }

    #[actix_web::test]
    async fn test_single_update_rules() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();

        // vente >= achat refusée
        let err = CryptoPriceService::update_price(&db, 1, update("BTC", None, Some(dec!(70000))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // EXACOIN exige buy_price
        assert!(CryptoPriceService::update_price(&db, 1, update("EXACOIN", None, Some(dec!(50))))
            .await
            .is_err());

        // nouvelle pièce sans buy_price refusée
        assert!(CryptoPriceService::update_price(&db, 1, update("XRP", None, Some(dec!(0.5))))
            .await
            .is_err());

        let btc = CryptoPriceService::update_price(&db, 1, update("btc", None, Some(dec!(64000))))
            .await
            .unwrap();
        assert_eq!(btc.sell_price.round_dp(2), dec!(64000));
        assert_eq!(btc.buy_price.round_dp(2), dec!(65000));

        let history = CryptoPriceService::history(&db, "BTC").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sell_price.round_dp(2), dec!(64000));
    }

    #[actix_web::test]
    async fn test_bulk_rejects_invalid_entries_and_applies_others() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();

        let request = BulkUpdatePricesRequest {
            prices: vec![
                update("ETH", Some(dec!(3300)), Some(dec!(3200))),
                update("USDT", Some(dec!(1.00)), Some(dec!(1.00))),
                update("SOL", Some(dec!(150)), Some(dec!(145))),
            ],
        };
        let response = CryptoPriceService::bulk_update(&db, 1, request).await.unwrap();

        assert!(!response.success);
        assert_eq!(response.updated, vec!["ETH".to_string(), "SOL".to_string()]);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].coin, "USDT");

        let prices = CryptoPriceService::list_all(&db).await.unwrap();
        assert_eq!(prices.len(), 5);
        assert_invariant(&prices);
    }

    #[actix_web::test]
    async fn test_bulk_empty_is_rejected() {
        let db = memory_db().await;
        let result = CryptoPriceService::bulk_update(&db, 1, BulkUpdatePricesRequest { prices: vec![] }).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[actix_web::test]
    async fn test_sync_keeps_admin_sell_price_when_valid() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();

        // BTC monte: la vente admin (63050) reste valide
        // ETH chute sous la vente admin (3104): vente remise à 97%
        let feed = StaticFeed(vec![
            quote("BTC", dec!(70000)),
            quote("ETH", dec!(3000)),
            quote("ADA", dec!(0.50)),
        ]);
        let response = CryptoPriceService::sync_from_feed(&db, Some(1), &feed).await.unwrap();
        assert!(response.success);
        assert_eq!(response.updated.len(), 3);

        let btc = CryptoPriceService::get_active(&db, "BTC").await.unwrap();
        assert_eq!(btc.buy_price.round_dp(2), dec!(70000));
        assert_eq!(btc.sell_price.round_dp(2), dec!(63050));

        let eth = CryptoPriceService::get_active(&db, "ETH").await.unwrap();
        assert_eq!(eth.sell_price.round_dp(2), dec!(2910));

        let ada = CryptoPriceService::get_active(&db, "ADA").await.unwrap();
        assert_eq!(ada.sell_price.round_dp(2), dec!(0.49));

        assert_invariant(&CryptoPriceService::list_all(&db).await.unwrap());
    }

    #[actix_web::test]
    async fn test_sync_skips_quote_that_cannot_keep_spread() {
        let db = memory_db().await;
        let feed = StaticFeed(vec![quote("DOT", dec!(0.01))]);

        let response = CryptoPriceService::sync_from_feed(&db, None, &feed).await.unwrap();
        assert!(!response.success);
        assert!(response.updated.is_empty());
        assert!(CryptoPriceService::list_all(&db).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_toggle_hides_coin_from_public_list() {
        let db = memory_db().await;
        CryptoPriceService::seed_defaults(&db).await.unwrap();

        let usdt = CryptoPriceService::toggle_active(&db, 1, "usdt").await.unwrap();
        assert!(!usdt.is_active);
        assert_eq!(CryptoPriceService::list_active(&db).await.unwrap().len(), 3);
        assert!(matches!(
            CryptoPriceService::get_active(&db, "USDT").await,
            Err(AppError::Validation(_))
        ));
    }
}
