use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::services::account_service::AccountService;
use crate::services::referral_service::ReferralService;

/// GET /api/referrals - Filleuls de l'utilisateur connecté
#[get("")]
pub async fn list_referrals(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let referrals = ReferralService::list(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(referrals))
}

#[get("/stats")]
pub async fn referral_stats(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let user = AccountService::get_user(db.get_ref(), auth_user.user_id).await?;
    let stats = ReferralService::stats(db.get_ref(), &user).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// POST /api/referrals/generate-code - Nouveau code de parrainage
#[post("/generate-code")]
pub async fn generate_code(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let code = ReferralService::regenerate_code(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "referral_code": code })))
}

/// POST /api/referrals/{id}/claim - Crédite la récompense une seule fois
#[post("/{id}/claim")]
pub async fn claim_reward(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let referral = ReferralService::claim(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(referral))
}

pub fn referral_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/referrals")
            .service(list_referrals)
            .service(referral_stats)
            .service(generate_code)
            .service(claim_reward),
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
    use serde_json::Value;

    #[actix_web::test]
    async fn test_claim_once_over_http() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let referrer = create_user(&db, "sponsor@example.com", dec!(0)).await;
        let referred = create_user(&db, "friend@example.com", dec!(0)).await;
        let referral = ReferralService::create_referral(&db, referrer.id, referred.id, dec!(5))
            .await
            .unwrap();
        let token = jwt::generate_token(&config.jwt, referrer.id, &referrer.email, false).unwrap();
        let auth = ("Authorization", format!("Bearer {}", token));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(referral_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/referrals/stats")
            .insert_header(auth.clone())
            .to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["total_referrals"], 1);
        assert_eq!(stats["pending_referrals"], 1);

        let uri = format!("/referrals/{}/claim", referral.id);
        let req = test::TestRequest::post().uri(&uri).insert_header(auth.clone()).to_request();
        let claimed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(claimed["reward_claimed"], true);
        assert_eq!(claimed["status"], "active");

        let req = test::TestRequest::post().uri(&uri).insert_header(auth.clone()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/referrals/generate-code")
            .insert_header(auth.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["referral_code"].as_str().unwrap().len(), 8);
    }
}
