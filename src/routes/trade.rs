use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{CloseTradeRequest, CreateTradeRequest, UpdatePriceRequest};
use crate::services::trade_service::TradeService;

/// GET /api/trades - Tous les trades de l'utilisateur
#[get("")]
pub async fn list_trades(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let trades = TradeService::list_trades(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(trades))
}

/// POST /api/trades - Ouvrir un trade (solde vérifié, non débité)
#[post("")]
pub async fn create_trade(
    auth_user: AuthUser,
    body: web::Json<CreateTradeRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let trade = TradeService::create_trade(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(trade))
}

#[get("/open")]
pub async fn open_trades(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let trades = TradeService::open_trades(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(trades))
}

#[get("/closed")]
pub async fn closed_trades(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let trades = TradeService::closed_trades(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(trades))
}

/// GET /api/trades/history - Historique des fermetures
#[get("/history")]
pub async fn trade_history(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let history = TradeService::history(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[get("/{id}")]
pub async fn get_trade(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let trade = TradeService::get_trade(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[post("/{id}/close")]
pub async fn close_trade(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<CloseTradeRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let trade = TradeService::close_trade(
        db.get_ref(),
        auth_user.user_id,
        path.into_inner(),
        body.exit_price,
        body.close_reason,
    )
    .await?;
    Ok(HttpResponse::Ok().json(trade))
}

/// POST /api/trades/{id}/update-price - Nouveau prix: expiration, stop loss, take profit
#[post("/{id}/update-price")]
pub async fn update_price(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePriceRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let trade = TradeService::update_price(
        db.get_ref(),
        auth_user.user_id,
        path.into_inner(),
        body.into_inner().current_price,
    )
    .await?;
    Ok(HttpResponse::Ok().json(trade))
}

#[post("/{id}/cancel")]
pub async fn cancel_trade(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let trade = TradeService::cancel_trade(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(trade))
}

pub fn trade_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/trades")
            .service(list_trades)
            .service(create_trade)
            .service(open_trades)
            .service(closed_trades)
            .service(trade_history)
            .service(get_trade)
            .service(close_trade)
            .service(update_price)
            .service(cancel_trade),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::test_support::{create_user, memory_db};
    use crate::utils::jwt;
    use actix_web::{http::StatusCode, test, App};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_take_profit_over_http() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = create_user(&db, "http-trader@example.com", dec!(5000)).await;
        let token = jwt::generate_token(&config.jwt, user.id, &user.email, false).unwrap();
        let auth = ("Authorization", format!("Bearer {}", token));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(trade_routes),
        )
        .await;

        // stop loss au-dessus de l'entrée pour un achat: refusé
        let req = test::TestRequest::post()
            .uri("/trades")
            .insert_header(auth.clone())
            .set_json(json!({
                "asset": "gold", "trade_type": "buy",
                "entry_price": "2000", "quantity": "1", "stop_loss": "2100"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/trades")
            .insert_header(auth.clone())
            .set_json(json!({
                "asset": "gold", "trade_type": "buy",
                "entry_price": "2000", "quantity": "1",
                "stop_loss": "1900", "take_profit": "2100", "timeframe": "1d"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let trade: Value = test::read_body_json(resp).await;
        let id = trade["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/trades/{}/update-price", id))
            .insert_header(auth.clone())
            .set_json(json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/trades/{}/update-price", id))
            .insert_header(auth.clone())
            .set_json(json!({"current_price": "2150"}))
            .to_request();
        let closed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(closed["status"], "take_profit_hit");

        let req = test::TestRequest::get()
            .uri("/trades/history")
            .insert_header(auth.clone())
            .to_request();
        let history: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["close_reason"], "take_profit");
    }

    #[actix_web::test]
    async fn test_unknown_trade_is_404() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = create_user(&db, "nobody@example.com", dec!(0)).await;
        let token = jwt::generate_token(&config.jwt, user.id, &user.email, false).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(trade_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/trades/{}", Uuid::new_v4()))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
