use actix_web::{get, http::StatusCode, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::errors::AppError;
use crate::middleware::AdminUser;
use crate::models::dto::{
    BulkUpdatePricesRequest, BulkUpdateResponse, CryptoPriceResponse, TransactionFilter, UpdateCryptoPriceRequest,
};
use crate::services::account_service::AccountService;
use crate::services::crypto_price_service::CryptoPriceService;
use crate::services::price_feed::PriceFeed;
use crate::services::transaction_service::TransactionService;

// 200 si tout est passé, 207 si certaines pièces ont été refusées
fn bulk_response(response: BulkUpdateResponse) -> HttpResponse {
    if response.success {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::build(StatusCode::MULTI_STATUS).json(response)
    }
}

// ---------------------------------------------------------------------------
// Utilisateurs
// ---------------------------------------------------------------------------

#[get("/users")]
pub async fn list_users(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let users = AccountService::list_users(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/users/{id}")]
pub async fn get_user(
    _admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = AccountService::get_user(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /api/admin/users/{id}/suspend - Suspend ou réactive un compte
#[post("/users/{id}/suspend")]
pub async fn toggle_suspension(
    admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = AccountService::toggle_suspension(db.get_ref(), admin.user_id(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

// ---------------------------------------------------------------------------
// Prix crypto
// ---------------------------------------------------------------------------

/// GET /api/admin/crypto/prices - Toutes les pièces, actives ou non
#[get("/crypto/prices")]
pub async fn list_all_prices(_admin: AdminUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let prices: Vec<CryptoPriceResponse> = CryptoPriceService::list_all(db.get_ref())
        .await?
        .into_iter()
        .map(CryptoPriceResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(prices))
}

#[put("/crypto/prices")]
pub async fn update_price(
    admin: AdminUser,
    body: web::Json<UpdateCryptoPriceRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let price = CryptoPriceService::update_price(db.get_ref(), admin.user_id(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CryptoPriceResponse::from(price)))
}

/// POST /api/admin/crypto/prices/bulk - Une erreur par pièce refusée
#[post("/crypto/prices/bulk")]
pub async fn bulk_update(
    admin: AdminUser,
    body: web::Json<BulkUpdatePricesRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let response = CryptoPriceService::bulk_update(db.get_ref(), admin.user_id(), body.into_inner()).await?;
    Ok(bulk_response(response))
}

/// POST /api/admin/crypto/prices/sync - Import depuis le flux de marché
#[post("/crypto/prices/sync")]
pub async fn sync_prices(
    admin: AdminUser,
    db: web::Data<DatabaseConnection>,
    feed: web::Data<dyn PriceFeed>,
) -> Result<HttpResponse, AppError> {
    let response = CryptoPriceService::sync_from_feed(db.get_ref(), Some(admin.user_id()), feed.get_ref()).await?;
    Ok(bulk_response(response))
}

#[post("/crypto/prices/{coin}/toggle")]
pub async fn toggle_price(
    admin: AdminUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let price = CryptoPriceService::toggle_active(db.get_ref(), admin.user_id(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CryptoPriceResponse::from(price)))
}

#[get("/crypto/prices/{coin}/history")]
pub async fn price_history(
    _admin: AdminUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let history = CryptoPriceService::history(db.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(history))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[get("/transactions")]
pub async fn list_transactions(
    _admin: AdminUser,
    query: web::Query<TransactionFilter>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transactions = TransactionService::list_all(db.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

/// POST /api/admin/transactions/{id}/approve - Dépôt crédité, retrait finalisé
#[post("/transactions/{id}/approve")]
pub async fn approve_transaction(
    _admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transaction = TransactionService::approve(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

/// POST /api/admin/transactions/{id}/reject - Retrait remboursé
#[post("/transactions/{id}/reject")]
pub async fn reject_transaction(
    _admin: AdminUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transaction = TransactionService::reject(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    // bulk et sync avant {coin}
    cfg.service(
        web::scope("/admin")
            .service(list_users)
            .service(get_user)
            .service(toggle_suspension)
            .service(list_all_prices)
            .service(update_price)
            .service(bulk_update)
            .service(sync_prices)
            .service(toggle_price)
            .service(price_history)
            .service(list_transactions)
            .service(approve_transaction)
            .service(reject_transaction),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::test_support::{create_user, memory_db};
    use crate::models::users;
    use crate::services::price_feed::MarketQuote;
    use crate::utils::jwt;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, Set};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct FixedFeed;

    #[async_trait]
    impl PriceFeed for FixedFeed {
        async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AppError> {
            Ok(vec![MarketQuote {
                coin: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                price: dec!(60000),
                change_24h: Decimal::ZERO,
                change_7d: Decimal::ZERO,
                change_30d: Decimal::ZERO,
            }])
        }
    }

    async fn staff(db: &DatabaseConnection) -> users::Model {
        let user = create_user(db, "admin@example.com", dec!(0)).await;
        let mut active: users::ActiveModel = user.into();
        active.is_staff = Set(true);
        active.update(db).await.unwrap()
    }

    #[actix_web::test]
    async fn test_non_staff_is_forbidden() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = create_user(&db, "customer@example.com", dec!(0)).await;
        let token = jwt::generate_token(&config.jwt, user.id, &user.email, false).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(admin_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin/users")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get().uri("/admin/users").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_bulk_update_reports_partial_failure() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let admin = staff(&db).await;
        let token = jwt::generate_token(&config.jwt, admin.id, &admin.email, true).unwrap();
        let auth = ("Authorization", format!("Bearer {}", token));

        let feed: Arc<dyn PriceFeed> = Arc::new(FixedFeed);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .app_data(web::Data::from(feed))
                .configure(admin_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/crypto/prices/bulk")
            .insert_header(auth.clone())
            .set_json(json!({"prices": [
                {"coin": "EXACOIN", "buy_price": "62.00", "sell_price": "59.50"},
                {"coin": "ETH", "buy_price": "3000", "sell_price": "3100"}
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["updated"], json!(["EXACOIN"]));
        assert_eq!(body["errors"][0]["coin"], "ETH");

        let req = test::TestRequest::post()
            .uri("/admin/crypto/prices/sync")
            .insert_header(auth.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/admin/crypto/prices")
            .insert_header(auth.clone())
            .to_request();
        let prices: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(prices.as_array().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri("/admin/crypto/prices/EXACOIN/history")
            .insert_header(auth.clone())
            .to_request();
        let history: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_approve_deposit_over_http() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let admin = staff(&db).await;
        let customer = create_user(&db, "saver@example.com", dec!(0)).await;
        let deposit = TransactionService::deposit(
            &db,
            customer.id,
            crate::models::dto::CreateTransactionRequest {
                amount: dec!(40),
                payment_method: crate::models::enums::PaymentMethod::Momo,
                phone_number: Some("0241234567".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();
        let token = jwt::generate_token(&config.jwt, admin.id, &admin.email, true).unwrap();
        let auth = ("Authorization", format!("Bearer {}", token));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(admin_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin/transactions?status=pending")
            .insert_header(auth.clone())
            .to_request();
        let pending: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let uri = format!("/admin/transactions/{}/approve", deposit.id);
        let req = test::TestRequest::post().uri(&uri).insert_header(auth.clone()).to_request();
        let approved: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(approved["status"], "completed");

        let req = test::TestRequest::post().uri(&uri).insert_header(auth.clone()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri(&format!("/admin/users/{}", customer.id))
            .insert_header(auth.clone())
            .to_request();
        let user: Value = test::call_and_read_body_json(&app, req).await;
        let balance: f64 = user["balance"].as_str().unwrap().parse().unwrap();
        assert_eq!(balance, 40.0);
    }
}
