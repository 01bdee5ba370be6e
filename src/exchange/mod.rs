//! USD/sat exchange rate source.
//!
//! The rate endpoint returns a bare BTC-per-USD price, which is converted
//! to satoshis-per-USD by multiplying by 100,000,000 (sats per BTC).

use crate::config::ExchangeConfig;

const SATS_PER_BTC: f64 = 100_000_000.0;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("request to exchange rate source failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("exchange rate source returned a non-numeric price: {0}")]
    InvalidPrice(String),
}

/// Fetches the current sat/USD exchange rate over HTTP.
#[derive(Clone)]
pub struct ExchangeRateSource {
    client: reqwest::Client,
    rate_url: String,
}

impl ExchangeRateSource {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            rate_url: config.rate_url.clone(),
        }
    }

    /// Returns the number of satoshis one USD buys, rounded to the nearest
    /// integer.
    pub async fn sat_per_usd(&self) -> Result<i64, ExchangeError> {
        let response = self.client.get(&self.rate_url).send().await?;
        let body = response.error_for_status()?.text().await?;

        let btc_per_usd: f64 = body
            .trim()
            .parse()
            .map_err(|_| ExchangeError::InvalidPrice(body.clone()))?;

        Ok((btc_per_usd * SATS_PER_BTC).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_btc_per_usd_into_sats_per_usd() {
        // At 0.000025 BTC/USD, one USD buys 2,500 sats.
        let btc_per_usd = 0.000025_f64;
        let sat_per_usd = (btc_per_usd * SATS_PER_BTC).round() as i64;
        assert_eq!(sat_per_usd, 2_500);
    }
}
