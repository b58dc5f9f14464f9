use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::dto::ReferralStatsResponse;
use crate::models::enums::{NotificationKind, ReferralStatus, TransactionType};
use crate::models::{referral, users};
use crate::services::notification_service::NotificationService;
use crate::services::wallet_service::{LedgerEntry, WalletService};

pub const REFERRAL_CODE_LEN: usize = 8;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct ReferralService;

/// Code de parrainage aléatoire (8 caractères majuscules/chiffres)
pub fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

impl ReferralService {
    /// Génère un code qui n'existe pas encore en base
    pub async fn unique_code<C: ConnectionTrait>(conn: &C) -> Result<String, AppError> {
        for _ in 0..10 {
            let code = random_code();
            let taken = users::Entity::find()
                .filter(users::Column::ReferralCode.eq(code.as_str()))
                .count(conn)
                .await?
                > 0;
            if !taken {
                return Ok(code);
            }
        }
        Err(AppError::Internal("Could not generate a unique referral code".to_string()))
    }

    /// Parrain correspondant à un code saisi à l'inscription
    pub async fn find_referrer<C: ConnectionTrait>(conn: &C, code: &str) -> Result<users::Model, AppError> {
        users::Entity::find()
            .filter(users::Column::ReferralCode.eq(code.trim().to_uppercase()))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::validation("Invalid referral code"))
    }

    /// Enregistre un parrainage "pending" pour le nouvel utilisateur
    pub async fn create_referral<C: ConnectionTrait>(
        conn: &C,
        referrer_id: i32,
        referred_user_id: i32,
        reward_amount: Decimal,
    ) -> Result<referral::Model, AppError> {
        let now = Utc::now();
        let model = referral::ActiveModel {
            id: Set(Uuid::new_v4()),
            referrer_id: Set(referrer_id),
            referred_user_id: Set(referred_user_id),
            reward_amount: Set(reward_amount),
            reward_claimed: Set(false),
            status: Set(ReferralStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        NotificationService::notify(
            conn,
            referrer_id,
            NotificationKind::Info,
            "New referral",
            format!("A new user joined with your referral code. Reward: {}", reward_amount),
        )
        .await?;

        Ok(model)
    }

    pub async fn list(db: &DatabaseConnection, user_id: i32) -> Result<Vec<referral::Model>, AppError> {
        Ok(referral::Entity::find()
            .filter(referral::Column::ReferrerId.eq(user_id))
            .order_by_desc(referral::Column::CreatedAt)
            .all(db)
            .await?)
    }

    pub async fn stats(db: &DatabaseConnection, user: &users::Model) -> Result<ReferralStatsResponse, AppError> {
        let referrals = Self::list(db, user.id).await?;

        let total_earned: Decimal = referrals
            .iter()
            .filter(|r| r.reward_claimed)
            .map(|r| r.reward_amount)
            .sum();
        let unclaimed_rewards: Decimal = referrals
            .iter()
            .filter(|r| !r.reward_claimed)
            .map(|r| r.reward_amount)
            .sum();

        Ok(ReferralStatsResponse {
            referral_code: user.referral_code.clone(),
            total_referrals: referrals.len(),
            pending_referrals: referrals.iter().filter(|r| r.status == ReferralStatus::Pending).count(),
            active_referrals: referrals.iter().filter(|r| r.status == ReferralStatus::Active).count(),
            total_earned,
            unclaimed_rewards,
        })
    }

    /// Crédite la récompense au parrain, une seule fois
    pub async fn claim(db: &DatabaseConnection, user_id: i32, referral_id: Uuid) -> Result<referral::Model, AppError> {
        let txn = db.begin().await?;

        let existing = referral::Entity::find_by_id(referral_id)
            .filter(referral::Column::ReferrerId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Referral not found"))?;

        // Marquage conditionnel: deux réclamations simultanées ne créditent qu'une fois
        let result = referral::Entity::update_many()
            .col_expr(referral::Column::RewardClaimed, Expr::value(true))
            .col_expr(referral::Column::Status, Expr::value(ReferralStatus::Active))
            .col_expr(referral::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(referral::Column::Id.eq(referral_id))
            .filter(referral::Column::RewardClaimed.eq(false))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            warn!("Referral {} already claimed by user {}", referral_id, user_id);
            return Err(AppError::validation("Reward already claimed"));
        }

        let reward = existing.reward_amount;
        WalletService::credit(&txn, user_id, reward).await?;
        WalletService::record(
            &txn,
            LedgerEntry::completed(user_id, TransactionType::ReferralBonus, reward, "Referral reward"),
        )
        .await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Success,
            "Referral reward claimed",
            format!("{} has been added to your balance", reward),
        )
        .await?;

        let claimed = referral::Entity::find_by_id(referral_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Referral not found"))?;

        txn.commit().await?;

        info!("Referral {} claimed by user {} ({})", referral_id, user_id, reward);
        Ok(claimed)
    }

    /// Remplace le code de parrainage de l'utilisateur
    pub async fn regenerate_code(db: &DatabaseConnection, user_id: i32) -> Result<String, AppError> {
        let user = users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let code = Self::unique_code(db).await?;
        let mut active: users::ActiveModel = user.into();
        active.referral_code = Set(code.clone());
        active.update(db).await?;

        NotificationService::notify(
            db,
            user_id,
            NotificationKind::Info,
            "Referral code updated",
            format!("Your new referral code is: {}", code),
        )
        .await?;

        Ok(code)
    }
}
