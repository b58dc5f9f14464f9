pub mod admin;
pub mod auth;
pub mod crypto;
pub mod health;
pub mod investment_plans;
pub mod notifications;
pub mod referrals;
pub mod trade;
pub mod transactions;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(investment_plans::investment_plan_routes)
            .configure(trade::trade_routes)
            .configure(crypto::crypto_routes)
            .configure(transactions::transaction_routes)
            .configure(referrals::referral_routes)
            .configure(notifications::notification_routes)
            .configure(admin::admin_routes),
    );
}
