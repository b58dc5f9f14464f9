use actix_web::{get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{BalanceResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::services::account_service::AccountService;

/// POST /api/auth/register - Créer un compte (PUBLIC)
#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let response = AccountService::register(db.get_ref(), config.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// POST /api/auth/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let response = AccountService::login(db.get_ref(), config.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/auth/me - Profil de l'utilisateur connecté (PROTÉGÉE)
#[get("/me")]
pub async fn me(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let user = AccountService::get_user(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// PUT /api/auth/profile - Modifier nom / téléphone (PROTÉGÉE)
#[put("/profile")]
pub async fn update_profile(
    auth_user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = AccountService::update_profile(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /api/auth/change-password - Changer son mot de passe (PROTÉGÉE)
#[post("/change-password")]
pub async fn change_password(
    auth_user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    AccountService::change_password(db.get_ref(), auth_user.user_id, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

/// GET /api/auth/balance - Solde courant (PROTÉGÉE)
#[get("/balance")]
pub async fn balance(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let user = AccountService::get_user(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { balance: user.balance }))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(me)
            .service(update_profile)
            .service(change_password)
            .service(balance),
    );
}
