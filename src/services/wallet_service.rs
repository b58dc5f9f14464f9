use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::enums::{PaymentMethod, TransactionStatus, TransactionType};
use crate::models::{transaction, users};
use crate::utils::money::MAX_AMOUNT;

pub struct WalletService;

/// Ligne à écrire dans le journal des transactions
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub user_id: i32,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub phone_number: Option<String>,
    pub description: Option<String>,
}

impl LedgerEntry {
    /// Écriture interne (plan, crypto, parrainage): directement "completed"
    pub fn completed(user_id: i32, transaction_type: TransactionType, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            user_id,
            transaction_type,
            amount,
            fee: Decimal::ZERO,
            status: TransactionStatus::Completed,
            payment_method: None,
            phone_number: None,
            description: Some(description.into()),
        }
    }
}

fn reference_prefix(transaction_type: TransactionType) -> &'static str {
    match transaction_type {
        TransactionType::Deposit => "DEP",
        TransactionType::Withdrawal => "WDR",
        TransactionType::Investment => "INV",
        TransactionType::Profit => "PRF",
        TransactionType::ReferralBonus => "REF",
        TransactionType::CryptoBuy => "CBY",
        TransactionType::CryptoSell => "CSL",
        TransactionType::Refund => "RFD",
    }
}

impl WalletService {
    /// Solde actuel d'un utilisateur
    pub async fn get_balance<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<Decimal, AppError> {
        let user = users::Entity::find_by_id(user_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(user.balance)
    }

    /// Vérifie si l'utilisateur a assez de fonds pour un montant donné
    pub async fn has_sufficient_funds<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        required_amount: Decimal,
    ) -> Result<bool, AppError> {
        let balance = Self::get_balance(conn, user_id).await?;
        Ok(balance >= required_amount)
    }

    /// Erreur détaillée en cas de fonds insuffisants
    pub async fn insufficient_funds<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        required_amount: Decimal,
    ) -> Result<AppError, AppError> {
        let available = Self::get_balance(conn, user_id).await?;
        Ok(AppError::InsufficientFunds {
            available,
            required: required_amount,
        })
    }

    /// Débite le solde en UNE requête conditionnelle:
    ///   UPDATE users SET balance = balance - x WHERE id = ? AND balance >= x
    /// Deux requêtes concurrentes ne peuvent donc pas rendre le solde négatif.
    /// Retourne le nouveau solde.
    pub async fn debit<C: ConnectionTrait>(conn: &C, user_id: i32, amount: Decimal) -> Result<Decimal, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("Amount must be greater than 0"));
        }

        let result = users::Entity::update_many()
            .col_expr(users::Column::Balance, Expr::col(users::Column::Balance).sub(amount))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::Balance.gte(amount))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let err = Self::insufficient_funds(conn, user_id, amount).await?;
            warn!("Debit refused for user {}: {}", user_id, err);
            return Err(err);
        }

        Self::get_balance(conn, user_id).await
    }

    /// Crédite le solde (même principe: une seule requête UPDATE)
    /// Le solde ne dépasse jamais MAX_AMOUNT, la borne de la colonne
    pub async fn credit<C: ConnectionTrait>(conn: &C, user_id: i32, amount: Decimal) -> Result<Decimal, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("Amount must be greater than 0"));
        }

        let result = users::Entity::update_many()
            .col_expr(users::Column::Balance, Expr::col(users::Column::Balance).add(amount))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::Balance.lte(MAX_AMOUNT - amount))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            // get_balance renvoie 404 si l'utilisateur n'existe pas
            let balance = Self::get_balance(conn, user_id).await?;
            warn!("Credit of {} refused for user {}: balance {} at limit", amount, user_id, balance);
            return Err(AppError::validation("Balance limit exceeded"));
        }

        Self::get_balance(conn, user_id).await
    }

    /// Ajoute une ligne au journal des transactions
    pub async fn record<C: ConnectionTrait>(conn: &C, entry: LedgerEntry) -> Result<transaction::Model, AppError> {
        let now = Utc::now();
        let reference = format!(
            "{}-{}",
            reference_prefix(entry.transaction_type),
            Uuid::new_v4().simple()
        )
        .to_uppercase();

        let completed_at = if entry.status == TransactionStatus::Completed {
            Some(now)
        } else {
            None
        };

        let model = transaction::ActiveModel {
            user_id: Set(entry.user_id),
            transaction_type: Set(entry.transaction_type),
            payment_method: Set(entry.payment_method),
            amount: Set(entry.amount),
            fee: Set(entry.fee),
            net_amount: Set(entry.amount - entry.fee),
            status: Set(entry.status),
            reference: Set(reference),
            phone_number: Set(entry.phone_number),
            description: Set(entry.description),
            created_at: Set(now),
            completed_at: Set(completed_at),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        info!(
            "Ledger {:?} {} for user {} ({:?})",
            model.transaction_type, model.amount, model.user_id, model.status
        );
        Ok(model)
    }
}
