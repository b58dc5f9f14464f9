// Source externe des prix de marché (CoinGecko /simple/price)

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::utils::money::round2;

/// Identifiants CoinGecko → (symbole, nom affiché)
pub const COIN_MAPPING: &[(&str, &str, &str)] = &[
    ("bitcoin", "BTC", "Bitcoin"),
    ("ethereum", "ETH", "Ethereum"),
    ("binancecoin", "BNB", "Binance Coin"),
    ("cardano", "ADA", "Cardano"),
    ("solana", "SOL", "Solana"),
    ("polkadot", "DOT", "Polkadot"),
];

/// Prix de marché d'une crypto
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub coin: String,
    pub name: String,
    pub price: Decimal,
    pub change_24h: Decimal,
    pub change_7d: Decimal,
    pub change_30d: Decimal,
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AppError>;
}

#[derive(Debug, Deserialize)]
struct CoinGeckoQuote {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    usd_7d_change: Option<f64>,
    usd_30d_change: Option<f64>,
}

fn to_decimal(value: Option<f64>, dp: u32) -> Decimal {
    value
        .and_then(|v| Decimal::try_from(v).ok())
        .map(|d| d.round_dp(dp))
        .unwrap_or(Decimal::ZERO)
}

/// Convertit la réponse JSON de CoinGecko en cotations
/// Les pièces inconnues ou sans prix positif sont ignorées
pub fn parse_simple_price(body: &str) -> Result<Vec<MarketQuote>, AppError> {
    let raw: HashMap<String, CoinGeckoQuote> = serde_json::from_str(body)
        .map_err(|e| AppError::Internal(format!("Invalid price feed payload: {}", e)))?;

    let mut quotes = Vec::new();
    for (gecko_id, symbol, name) in COIN_MAPPING {
        let Some(quote) = raw.get(*gecko_id) else {
            continue;
        };

        let price = round2(to_decimal(quote.usd, 8));
        if price <= Decimal::ZERO {
            warn!("Ignoring {} quote without a positive price", symbol);
            continue;
        }

        quotes.push(MarketQuote {
            coin: symbol.to_string(),
            name: name.to_string(),
            price,
            change_24h: to_decimal(quote.usd_24h_change, 4),
            change_7d: to_decimal(quote.usd_7d_change, 4),
            change_30d: to_decimal(quote.usd_30d_change, 4),
        });
    }

    Ok(quotes)
}

#[derive(Clone)]
pub struct CoinGeckoFeed {
    client: Client,
    url: String,
}

impl CoinGeckoFeed {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AppError> {
        let ids: Vec<&str> = COIN_MAPPING.iter().map(|(id, _, _)| *id).collect();
        let ids = ids.join(",");

        let body = self
            .client
            .get(&self.url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
                ("include_7d_change", "true"),
                ("include_30d_change", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let quotes = parse_simple_price(&body)?;
        debug!("Price feed returned {} quotes", quotes.len());
        Ok(quotes)
    }
}
