// Data Transfer Objects pour les requêtes et réponses structurées
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::crypto_price;
use super::enums::{
    Asset, CloseReason, PaymentMethod, PlanType, Timeframe, TradeType, TransactionStatus,
    TransactionType,
};

// ---------------------------------------------------------------------------
// Plans d'investissement
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    pub plan_type: PlanType,
    pub initial_amount: Decimal,
    #[validate(range(min = 1, max = 60, message = "period_months must be between 1 and 60"))]
    pub period_months: i32,
    pub growth_rate: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct PlanSummaryResponse {
    pub total_invested: Decimal,
    pub total_returns: Decimal,
    pub active_plans: usize,
    pub completed_plans: usize,
    pub total_plans: usize,
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTradeRequest {
    pub asset: Asset,
    pub trade_type: TradeType,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Deserialize)]
pub struct CloseTradeRequest {
    pub exit_price: Decimal,
    #[serde(default = "default_close_reason")]
    pub close_reason: CloseReason,
}

fn default_close_reason() -> CloseReason {
    CloseReason::Manual
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub current_price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Crypto
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCryptoPriceRequest {
    #[validate(length(min = 1, max = 10, message = "Coin is required"))]
    pub coin: String,
    pub name: Option<String>,
    pub buy_price: Option<Decimal>,
    pub sell_price: Option<Decimal>,
    #[serde(default, alias = "change24h")]
    pub change_24h: Option<Decimal>,
    #[serde(default, alias = "change7d")]
    pub change_7d: Option<Decimal>,
    #[serde(default, alias = "change30d")]
    pub change_30d: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdatePricesRequest {
    #[serde(default)]
    pub prices: Vec<UpdateCryptoPriceRequest>,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateError {
    pub coin: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub success: bool,
    pub message: String,
    pub updated: Vec<String>,
    pub errors: Vec<BulkUpdateError>,
}

#[derive(Debug, Serialize)]
pub struct CryptoPriceResponse {
    pub id: i32,
    pub coin: String,
    pub name: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub spread: Decimal,
    pub spread_percentage: Decimal,
    pub change_24h: Decimal,
    pub change_7d: Decimal,
    pub change_30d: Decimal,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
}

impl From<crypto_price::Model> for CryptoPriceResponse {
    fn from(price: crypto_price::Model) -> Self {
        Self {
            spread: price.spread(),
            spread_percentage: price.spread_percentage(),
            id: price.id,
            coin: price.coin,
            name: price.name,
            buy_price: price.buy_price,
            sell_price: price.sell_price,
            change_24h: price.change_24h,
            change_7d: price.change_7d,
            change_30d: price.change_30d,
            is_active: price.is_active,
            last_updated: price.last_updated,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BuyCryptoRequest {
    #[validate(length(min = 1, max = 10))]
    pub coin: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SellCryptoRequest {
    #[validate(length(min = 1, max = 10))]
    pub coin: String,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CryptoTradeResponse {
    pub coin: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
    pub realized_pnl: Option<Decimal>,
    pub new_balance: Decimal,
    pub holding_quantity: Decimal,
}

#[derive(Debug, Serialize)]
pub struct HoldingResponse {
    pub coin: String,
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_percentage: Decimal,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 8, max = 20, message = "Invalid phone number"))]
    pub phone_number: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

// ---------------------------------------------------------------------------
// Parrainage
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ReferralStatsResponse {
    pub referral_code: String,
    pub total_referrals: usize,
    pub pending_referrals: usize,
    pub active_referrals: usize,
    pub total_earned: Decimal,
    pub unclaimed_rewards: Decimal,
}

// ---------------------------------------------------------------------------
// Comptes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
    #[validate(length(min = 8, max = 20, message = "Invalid phone number"))]
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(length(min = 8, max = 20, message = "Invalid phone number"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: super::users::Model,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}
