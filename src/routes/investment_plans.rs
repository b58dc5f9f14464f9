use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::CreatePlanRequest;
use crate::services::investment_service::InvestmentService;

/// GET /api/investment-plans - Tous les plans de l'utilisateur
#[get("")]
pub async fn list_plans(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let plans = InvestmentService::list_plans(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(plans))
}

/// POST /api/investment-plans - Créer un plan (débite le solde)
#[post("")]
pub async fn create_plan(
    auth_user: AuthUser,
    body: web::Json<CreatePlanRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let plan = InvestmentService::create_plan(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(plan))
}

#[get("/active")]
pub async fn active_plans(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let plans = InvestmentService::active_plans(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(plans))
}

#[get("/completed")]
pub async fn completed_plans(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let plans = InvestmentService::completed_plans(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(plans))
}

#[get("/summary")]
pub async fn summary(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let plan_summary = InvestmentService::summary(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(plan_summary))
}

/// GET /api/investment-plans/{id} - Détail avec la projection mois par mois
#[get("/{id}")]
pub async fn get_plan(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let detail = InvestmentService::get_plan(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[post("/{id}/complete")]
pub async fn complete_plan(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let plan = InvestmentService::complete_plan(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan))
}

#[post("/{id}/cancel")]
pub async fn cancel_plan(
    auth_user: AuthUser,
    path: web::Path<Uuid>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let plan = InvestmentService::cancel_plan(db.get_ref(), auth_user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan))
}

pub fn investment_plan_routes(cfg: &mut web::ServiceConfig) {
    // Les chemins fixes avant /{id}
    cfg.service(
        web::scope("/investment-plans")
            .service(list_plans)
            .service(create_plan)
            .service(active_plans)
            .service(completed_plans)
            .service(summary)
            .service(get_plan)
            .service(complete_plan)
            .service(cancel_plan),
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
    async fn test_plan_lifecycle_over_http() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = create_user(&db, "plans@example.com", dec!(1000)).await;
        let token = jwt::generate_token(&config.jwt, user.id, &user.email, false).unwrap();
        let auth = ("Authorization", format!("Bearer {}", token));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(investment_plan_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/investment-plans")
            .insert_header(auth.clone())
            .set_json(json!({"plan_type": "advance", "initial_amount": "100", "period_months": 3}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let plan: Value = test::read_body_json(resp).await;
        let id = plan["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/investment-plans/{}", id))
            .insert_header(auth.clone())
            .to_request();
        let detail: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(detail["monthly_breakdown"].as_array().unwrap().len(), 3);

        let req = test::TestRequest::get()
            .uri("/investment-plans/active")
            .insert_header(auth.clone())
            .to_request();
        let active: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(active.as_array().unwrap().len(), 1);

        // période non écoulée
        let req = test::TestRequest::post()
            .uri(&format!("/investment-plans/{}/complete", id))
            .insert_header(auth.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/investment-plans/{}/cancel", id))
            .insert_header(auth.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri(&format!("/investment-plans/{}/complete", id))
            .insert_header(auth.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_invalid_period_is_rejected() {
        let db = memory_db().await;
        let config = AppConfig::for_tests();
        let user = create_user(&db, "period@example.com", dec!(1000)).await;
        let token = jwt::generate_token(&config.jwt, user.id, &user.email, false).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(investment_plan_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/investment-plans")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({"plan_type": "basic", "initial_amount": "100", "period_months": 61}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
