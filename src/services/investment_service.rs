use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::dto::{CreatePlanRequest, PlanSummaryResponse};
use crate::models::enums::{NotificationKind, PlanStatus, TransactionType};
use crate::models::investment_plan;
use crate::services::growth::{self, MonthlyGrowth};
use crate::services::notification_service::NotificationService;
use crate::services::wallet_service::{LedgerEntry, WalletService};
use crate::utils::money::round2;

pub struct InvestmentService;

/// Plan avec la projection mensuelle décodée (GET /investment-plans/{id})
#[derive(Debug, Serialize)]
pub struct PlanDetail {
    #[serde(flatten)]
    pub plan: investment_plan::Model,
    pub monthly_breakdown: Vec<MonthlyGrowth>,
}

/// start + n mois, jour ramené à la fin du mois si nécessaire (31 jan + 1 → 28/29 fév)
pub fn plan_end_date(start: DateTime<Utc>, period_months: i32) -> Result<DateTime<Utc>, AppError> {
    let months = u32::try_from(period_months)
        .map_err(|_| AppError::validation("period_months must be positive"))?;
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| AppError::validation("Plan end date out of range"))
}

impl InvestmentService {
    /// Crée un plan: débite initial_amount, fige la projection et journalise
    pub async fn create_plan(
        db: &DatabaseConnection,
        user_id: i32,
        request: CreatePlanRequest,
    ) -> Result<investment_plan::Model, AppError> {
        // 1. Taux selon le type de plan puis projection
        request.validate()?;
        let growth_rate = growth::resolve_growth_rate(request.plan_type, request.growth_rate)
            .map_err(AppError::Validation)?;
        let initial_amount = round2(request.initial_amount);
        let projection = growth::project(initial_amount, growth_rate, request.period_months)
            .map_err(AppError::Validation)?;

        let monthly_growth = serde_json::to_value(&projection.months)
            .map_err(|e| AppError::Internal(format!("Failed to encode projection: {}", e)))?;

        let start_date = Utc::now();
        let end_date = plan_end_date(start_date, request.period_months)?;

        // 2. Débit + plan + journal dans la même transaction
        let txn = db.begin().await?;

        WalletService::debit(&txn, user_id, initial_amount).await?;

        let plan = investment_plan::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            plan_type: Set(request.plan_type),
            status: Set(PlanStatus::Active),
            initial_amount: Set(initial_amount),
            period_months: Set(request.period_months),
            growth_rate: Set(growth_rate),
            total_return: Set(projection.total_return),
            final_amount: Set(projection.final_amount),
            monthly_growth: Set(monthly_growth),
            start_date: Set(start_date),
            end_date: Set(end_date),
            completed_at: Set(None),
            created_at: Set(start_date),
            updated_at: Set(start_date),
        }
        .insert(&txn)
        .await?;

        WalletService::record(
            &txn,
            LedgerEntry::completed(
                user_id,
                TransactionType::Investment,
                initial_amount,
                format!("{} plan investment ({} months)", plan.plan_type.to_value(), plan.period_months),
            ),
        )
        .await?;

        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Success,
            "Investment plan created",
            format!(
                "Your {} plan of {} is active. Projected final amount: {}",
                plan.plan_type.to_value(),
                plan.initial_amount,
                plan.final_amount
            ),
        )
        .await?;

        txn.commit().await?;

        info!(
            "Plan {} created for user {}: {} @ {}% x {} months",
            plan.id, user_id, initial_amount, growth_rate, plan.period_months
        );
        Ok(plan)
    }

    pub async fn list_plans(db: &DatabaseConnection, user_id: i32) -> Result<Vec<investment_plan::Model>, AppError> {
        Self::find_plans(db, user_id, None).await
    }

    pub async fn active_plans(db: &DatabaseConnection, user_id: i32) -> Result<Vec<investment_plan::Model>, AppError> {
        Self::find_plans(db, user_id, Some(PlanStatus::Active)).await
    }

    pub async fn completed_plans(
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Vec<investment_plan::Model>, AppError> {
        Self::find_plans(db, user_id, Some(PlanStatus::Completed)).await
    }

    pub async fn get_plan(db: &DatabaseConnection, user_id: i32, plan_id: Uuid) -> Result<PlanDetail, AppError> {
        let plan = Self::find_owned(db, user_id, plan_id).await?;
        let monthly_breakdown: Vec<MonthlyGrowth> = serde_json::from_value(plan.monthly_growth.clone())
            .map_err(|e| AppError::Internal(format!("Corrupted monthly_growth for plan {}: {}", plan.id, e)))?;

        Ok(PlanDetail { plan, monthly_breakdown })
    }

    pub async fn summary(db: &DatabaseConnection, user_id: i32) -> Result<PlanSummaryResponse, AppError> {
        let plans = Self::list_plans(db, user_id).await?;

        let total_invested: Decimal = plans.iter().map(|p| p.initial_amount).sum();
        let total_returns: Decimal = plans.iter().map(|p| p.total_return).sum();
        let active_plans = plans.iter().filter(|p| p.status == PlanStatus::Active).count();
        let completed_plans = plans.iter().filter(|p| p.status == PlanStatus::Completed).count();

        Ok(PlanSummaryResponse {
            total_invested: round2(total_invested),
            total_returns: round2(total_returns),
            active_plans,
            completed_plans,
            total_plans: plans.len(),
        })
    }

    /// active → completed: crédite final_amount, seulement à partir de end_date
    pub async fn complete_plan(
        db: &DatabaseConnection,
        user_id: i32,
        plan_id: Uuid,
    ) -> Result<investment_plan::Model, AppError> {
        let txn = db.begin().await?;
        let plan = Self::find_active(&txn, user_id, plan_id).await?;

        let now = Utc::now();
        if now < plan.end_date {
            warn!("Early completion refused for plan {} (ends {})", plan.id, plan.end_date);
            return Err(AppError::validation(format!(
                "Plan cannot be completed before its end date ({})",
                plan.end_date.format("%Y-%m-%d")
            )));
        }

        let payout = plan.final_amount;
        let plan = Self::leave_active(&txn, plan.id, PlanStatus::Completed, Some(now)).await?;

        WalletService::credit(&txn, user_id, payout).await?;
        WalletService::record(
            &txn,
            LedgerEntry::completed(user_id, TransactionType::Profit, payout, format!("Plan {} payout", plan.id)),
        )
        .await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Success,
            "Investment plan completed",
            format!("{} has been credited to your balance", payout),
        )
        .await?;

        txn.commit().await?;

        info!("Plan {} completed, {} credited to user {}", plan.id, payout, user_id);
        Ok(plan)
    }

    /// active → cancelled: rembourse initial_amount
    pub async fn cancel_plan(
        db: &DatabaseConnection,
        user_id: i32,
        plan_id: Uuid,
    ) -> Result<investment_plan::Model, AppError> {
        let txn = db.begin().await?;
        let plan = Self::find_active(&txn, user_id, plan_id).await?;
        let refund = plan.initial_amount;
        let plan = Self::leave_active(&txn, plan.id, PlanStatus::Cancelled, None).await?;

        WalletService::credit(&txn, user_id, refund).await?;
        WalletService::record(
            &txn,
            LedgerEntry::completed(user_id, TransactionType::Refund, refund, format!("Plan {} cancelled", plan.id)),
        )
        .await?;
        NotificationService::notify(
            &txn,
            user_id,
            NotificationKind::Info,
            "Investment plan cancelled",
            format!("{} has been refunded to your balance", refund),
        )
        .await?;

        txn.commit().await?;

        info!("Plan {} cancelled, {} refunded to user {}", plan.id, refund, user_id);
        Ok(plan)
    }

    // Transition conditionnelle: seule la requête qui voit encore "active" l'emporte,
    // une complétion et une annulation simultanées ne paient donc qu'une fois
    async fn leave_active<C: ConnectionTrait>(
        conn: &C,
        plan_id: Uuid,
        status: PlanStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<investment_plan::Model, AppError> {
        let result = investment_plan::Entity::update_many()
            .col_expr(investment_plan::Column::Status, Expr::value(status))
            .col_expr(investment_plan::Column::CompletedAt, Expr::value(completed_at))
            .col_expr(investment_plan::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(investment_plan::Column::Id.eq(plan_id))
            .filter(investment_plan::Column::Status.eq(PlanStatus::Active))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::validation("Plan is no longer active"));
        }

        investment_plan::Entity::find_by_id(plan_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("Investment plan not found"))
    }

    async fn find_plans(
        db: &DatabaseConnection,
        user_id: i32,
        status: Option<PlanStatus>,
    ) -> Result<Vec<investment_plan::Model>, AppError> {
        let mut query = investment_plan::Entity::find().filter(investment_plan::Column::UserId.eq(user_id));
        if let Some(status) = status {
            query = query.filter(investment_plan::Column::Status.eq(status));
        }

        Ok(query
            .order_by_desc(investment_plan::Column::CreatedAt)
            .all(db)
            .await?)
    }

    async fn find_owned<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        plan_id: Uuid,
    ) -> Result<investment_plan::Model, AppError> {
        investment_plan::Entity::find_by_id(plan_id)
            .filter(investment_plan::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("Investment plan not found"))
    }

    async fn find_active<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        plan_id: Uuid,
    ) -> Result<investment_plan::Model, AppError> {
        let plan = Self::find_owned(conn, user_id, plan_id).await?;
        if plan.status != PlanStatus::Active {
            return Err(AppError::validation(format!(
                "Plan is already {}",
                plan.status.to_value()
            )));
        }
        Ok(plan)
    }
}
