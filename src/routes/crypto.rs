use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{BuyCryptoRequest, CryptoPriceResponse, SellCryptoRequest};
use crate::services::crypto_price_service::CryptoPriceService;
use crate::services::crypto_trade_service::CryptoTradeService;

/// GET /api/crypto/prices - Prix achat/vente des pièces actives (PUBLIC)
#[get("/prices")]
pub async fn list_prices(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let prices: Vec<CryptoPriceResponse> = CryptoPriceService::list_active(db.get_ref())
        .await?
        .into_iter()
        .map(CryptoPriceResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(prices))
}

/// GET /api/crypto/prices/{coin} (PUBLIC)
#[get("/prices/{coin}")]
pub async fn get_price(path: web::Path<String>, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let price = CryptoPriceService::get_active(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CryptoPriceResponse::from(price)))
}

/// POST /api/crypto/buy - Acheter pour un montant donné au buy_price
#[post("/buy")]
pub async fn buy(
    auth_user: AuthUser,
    body: web::Json<BuyCryptoRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let result = CryptoTradeService::buy(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/crypto/sell - Vendre une quantité au sell_price
#[post("/sell")]
pub async fn sell(
    auth_user: AuthUser,
    body: web::Json<SellCryptoRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let result = CryptoTradeService::sell(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/portfolio")]
pub async fn portfolio(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let holdings = CryptoTradeService::portfolio(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(holdings))
}

pub fn crypto_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/crypto")
            .service(list_prices)
            .service(get_price)
            .service(buy)
            .service(sell)
            .service(portfolio),
    );
}
