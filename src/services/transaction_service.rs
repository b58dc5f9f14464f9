use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};
use validator::Validate;

use crate::errors::AppError;
use crate::models::dto::{CreateTransactionRequest, TransactionFilter};
use crate::models::enums::{NotificationKind, TransactionStatus, TransactionType};
use crate::models::transaction;
use crate::services::notification_service::NotificationService;
use crate::services::wallet_service::{LedgerEntry, WalletService};
use crate::utils::money::round2;

pub struct TransactionService;

impl TransactionService {
    /// Demande de dépôt: aucun mouvement de solde avant validation admin
    pub async fn deposit(
        db: &DatabaseConnection,
        user_id: i32,
        request: CreateTransactionRequest,
    ) -> Result<transaction::Model, AppError> {
        let entry = Self::pending_entry(user_id, TransactionType::Deposit, request)?;

        let txn = db.begin().await?;
        let deposit = WalletService::record(&txn, entry).await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Info,
            "Deposit requested",
            format!("Your deposit of {} ({}) is pending", deposit.amount, deposit.reference),
        )
        .await?;
        txn.commit().await?;

        Ok(deposit)
    }

    /// Demande de retrait: le montant est débité immédiatement, remboursé en cas de rejet
    pub async fn withdraw(
        db: &DatabaseConnection,
        user_id: i32,
        request: CreateTransactionRequest,
    ) -> Result<transaction::Model, AppError> {
        let entry = Self::pending_entry(user_id, TransactionType::Withdrawal, request)?;

        let txn = db.begin().await?;
        WalletService::debit(&txn, user_id, entry.amount).await?;
        let withdrawal = WalletService::record(&txn, entry).await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Info,
            "Withdrawal requested",
            format!("Your withdrawal of {} ({}) is pending", withdrawal.amount, withdrawal.reference),
        )
        .await?;
        txn.commit().await?;

        Ok(withdrawal)
    }

    pub async fn list_for_user(
        db: &DatabaseConnection,
        user_id: i32,
        filter: &TransactionFilter,
    ) -> Result<Vec<transaction::Model>, AppError> {
        let query = transaction::Entity::find().filter(transaction::Column::UserId.eq(user_id));
        Ok(Self::apply_filter(query, filter)
            .order_by_desc(transaction::Column::CreatedAt)
            .order_by_desc(transaction::Column::Id)
            .all(db)
            .await?)
    }

    /// Toutes les transactions (admin)
    pub async fn list_all(
        db: &DatabaseConnection,
        filter: &TransactionFilter,
    ) -> Result<Vec<transaction::Model>, AppError> {
        Ok(Self::apply_filter(transaction::Entity::find(), filter)
            .order_by_desc(transaction::Column::CreatedAt)
            .order_by_desc(transaction::Column::Id)
            .all(db)
            .await?)
    }

    /// pending/processing → completed (un dépôt crédite net_amount)
    pub async fn approve(db: &DatabaseConnection, transaction_id: i32) -> Result<transaction::Model, AppError> {
        let txn = db.begin().await?;
        let pending = Self::find_resolvable(&txn, transaction_id).await?;

        // Statut d'abord: une seconde validation concurrente échoue avant de créditer
        let resolved = Self::resolve(&txn, pending.id, TransactionStatus::Completed).await?;
        if resolved.transaction_type == TransactionType::Deposit {
            WalletService::credit(&txn, resolved.user_id, resolved.net_amount).await?;
        }

        NotificationService::notify(
            &txn,
            resolved.user_id,
            NotificationKind::Success,
            "Transaction approved",
            format!(
                "Your {} of {} has been approved",
                resolved.transaction_type.to_value(),
                resolved.amount
            ),
        )
        .await?;
        txn.commit().await?;

        info!("Transaction {} approved", resolved.reference);
        Ok(resolved)
    }

    /// pending/processing → failed (un retrait est remboursé)
    pub async fn reject(db: &DatabaseConnection, transaction_id: i32) -> Result<transaction::Model, AppError> {
        let txn = db.begin().await?;
        let pending = Self::find_resolvable(&txn, transaction_id).await?;

        let resolved = Self::resolve(&txn, pending.id, TransactionStatus::Failed).await?;
        if resolved.transaction_type == TransactionType::Withdrawal {
            WalletService::credit(&txn, resolved.user_id, resolved.amount).await?;
        }

        NotificationService::notify(
            &txn,
            resolved.user_id,
            NotificationKind::Error,
            "Transaction rejected",
            format!(
                "Your {} of {} has been rejected",
                resolved.transaction_type.to_value(),
                resolved.amount
            ),
        )
        .await?;
        txn.commit().await?;

        info!("Transaction {} rejected", resolved.reference);
        Ok(resolved)
    }

    fn pending_entry(
        user_id: i32,
        transaction_type: TransactionType,
        request: CreateTransactionRequest,
    ) -> Result<LedgerEntry, AppError> {
        request.validate()?;
        let amount = round2(request.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("Amount must be greater than 0"));
        }

        Ok(LedgerEntry {
            user_id,
            transaction_type,
            amount,
            fee: Decimal::ZERO,
            status: TransactionStatus::Pending,
            payment_method: Some(request.payment_method),
            phone_number: request.phone_number,
            description: request.description,
        })
    }

    fn apply_filter(query: Select<transaction::Entity>, filter: &TransactionFilter) -> Select<transaction::Entity> {
        let mut query = query;
        if let Some(transaction_type) = filter.transaction_type {
            query = query.filter(transaction::Column::TransactionType.eq(transaction_type));
        }
        if let Some(status) = filter.status {
            query = query.filter(transaction::Column::Status.eq(status));
        }
        query
    }

    async fn find_resolvable<C: ConnectionTrait>(conn: &C, transaction_id: i32) -> Result<transaction::Model, AppError> {
        let found = transaction::Entity::find_by_id(transaction_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction not found"))?;

        if !matches!(
            found.transaction_type,
            TransactionType::Deposit | TransactionType::Withdrawal
        ) {
            return Err(AppError::validation("Only deposits and withdrawals can be reviewed"));
        }
        if !found.status.is_resolvable() {
            return Err(AppError::validation(format!(
                "Transaction is already {}",
                found.status.to_value()
            )));
        }
        Ok(found)
    }

    // UPDATE ... WHERE status IN (pending, processing): une seule résolution passe
    async fn resolve<C: ConnectionTrait>(
        conn: &C,
        transaction_id: i32,
        status: TransactionStatus,
    ) -> Result<transaction::Model, AppError> {
        let result = transaction::Entity::update_many()
            .col_expr(transaction::Column::Status, Expr::value(status))
            .col_expr(transaction::Column::CompletedAt, Expr::value(Some(Utc::now())))
            .filter(transaction::Column::Id.eq(transaction_id))
            .filter(
                transaction::Column::Status.is_in([TransactionStatus::Pending, TransactionStatus::Processing]),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            warn!("Transaction {} was resolved concurrently", transaction_id);
            return Err(AppError::validation("Transaction was already resolved"));
        }

        transaction::Entity::find_by_id(transaction_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction not found"))
    }
}
