use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::users;
use crate::utils::jwt;

/// Structure qui contient les infos de l'utilisateur authentifié
/// Utilisée comme extracteur dans les routes protégées
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub is_staff: bool,
}

/// Utilisateur authentifié ET membre du staff (routes /api/admin)
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl AdminUser {
    pub fn user_id(&self) -> i32 {
        self.0.user_id
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // 1. Récupérer la config JWT partagée par l'application
    let config = req
        .app_data::<web::Data<AppConfig>>()
        .ok_or_else(|| AppError::Internal("Application config not registered".to_string()))?;

    // 2. Extraire le header Authorization
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

    // 3. Extraire le token (format: "Bearer <token>")
    let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized(
            "Invalid Authorization format (expected: Bearer <token>)".to_string(),
        )
    })?;

    // 4. Vérifier le token JWT
    let claims = jwt::verify_token(&config.jwt, token).map_err(AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
        is_staff: claims.is_staff,
    })
}

/// Recharge le compte à chaque requête: un compte suspendu ou rétrogradé
/// perd l'accès immédiatement, même avec un token encore valide
async fn load_account(
    token_user: Result<AuthUser, AppError>,
    db: Option<web::Data<DatabaseConnection>>,
) -> Result<AuthUser, AppError> {
    let token_user = token_user?;
    let db = db.ok_or_else(|| AppError::Internal("Database connection not registered".to_string()))?;

    let account = users::Entity::find_by_id(token_user.user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    if !account.is_active {
        return Err(AppError::Forbidden("Account is suspended".to_string()));
    }

    Ok(AuthUser {
        user_id: account.id,
        email: account.email,
        is_staff: account.is_staff,
    })
}

/// Implémentation de FromRequest pour AuthUser
/// Cela permet à Actix-Web d'extraire automatiquement AuthUser des requêtes
impl FromRequest for AuthUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token_user = authenticate(req);
        let db = req.app_data::<web::Data<DatabaseConnection>>().cloned();

        Box::pin(async move { load_account(token_user, db).await.map_err(Error::from) })
    }
}

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token_user = authenticate(req);
        let db = req.app_data::<web::Data<DatabaseConnection>>().cloned();

        Box::pin(async move {
            // is_staff lu en base, pas dans le token
            let user = load_account(token_user, db).await?;
            if user.is_staff {
                Ok(AdminUser(user))
            } else {
                Err(Error::from(AppError::Forbidden("Admin access required".to_string())))
            }
        })
    }
}
