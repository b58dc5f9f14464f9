pub mod account_service;
pub mod crypto_price_service;
pub mod crypto_trade_service;
pub mod growth;
pub mod investment_service;
pub mod notification_service;
pub mod price_feed;
pub mod referral_service;
pub mod trade_service;
pub mod transaction_service;
pub mod wallet_service;
