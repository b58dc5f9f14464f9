use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::errors::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{CreateTransactionRequest, TransactionFilter};
use crate::services::transaction_service::TransactionService;

/// GET /api/transactions?transaction_type=deposit&status=pending
#[get("")]
pub async fn list_transactions(
    auth_user: AuthUser,
    query: web::Query<TransactionFilter>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transactions = TransactionService::list_for_user(db.get_ref(), auth_user.user_id, &query).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

/// POST /api/transactions/deposit - En attente de validation admin
#[post("/deposit")]
pub async fn deposit(
    auth_user: AuthUser,
    body: web::Json<CreateTransactionRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transaction = TransactionService::deposit(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(transaction))
}

/// POST /api/transactions/withdraw - Débit immédiat, remboursé si rejeté
#[post("/withdraw")]
pub async fn withdraw(
    auth_user: AuthUser,
    body: web::Json<CreateTransactionRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transaction = TransactionService::withdraw(db.get_ref(), auth_user.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(transaction))
}

pub fn transaction_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/transactions")
            .service(list_transactions)
            .service(deposit)
            .service(withdraw),
    );
}
