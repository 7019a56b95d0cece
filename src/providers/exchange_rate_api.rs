use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::core::rates::{FetchError, RateProvider, RateSnapshot};

const USER_AGENT: &str = concat!("fxconv/", env!("CARGO_PKG_VERSION"));

/// Fetches rates from ExchangeRate-API's `latest` endpoint.
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn latest_url(&self, base_currency: &str) -> String {
        format!("{}/{}/latest/{}", self.base_url, self.api_key, base_currency)
    }

    // Keeps the API key out of logs.
    fn redacted_url(&self, base_currency: &str) -> String {
        format!("{}/***/latest/{}", self.base_url, base_currency)
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    base_code: Option<String>,
    conversion_rates: Option<HashMap<String, f64>>,
    time_last_update_unix: Option<i64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

impl LatestRatesResponse {
    fn into_snapshot(self) -> Result<RateSnapshot, FetchError> {
        if self.result != "success" {
            return Err(FetchError::Provider(self.error_type));
        }

        let base_code = self
            .base_code
            .ok_or_else(|| FetchError::Parse("missing field `base_code`".to_string()))?;
        let rates = self
            .conversion_rates
            .ok_or_else(|| FetchError::Parse("missing field `conversion_rates`".to_string()))?;
        let updated_at = self
            .time_last_update_unix
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        Ok(RateSnapshot::new(base_code, rates).with_updated_at(updated_at))
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() || err.is_redirect()
    {
        FetchError::Network(err.to_string())
    } else if err.is_builder() {
        FetchError::InvalidRequest(err.to_string())
    } else {
        FetchError::Parse(err.to_string())
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    #[instrument(
        name = "ExchangeRateFetch",
        skip(self),
        fields(base = %base_currency)
    )]
    async fn fetch_rates(&self, base_currency: &str) -> Result<RateSnapshot, FetchError> {
        debug!("Requesting rates from {}", self.redacted_url(base_currency));

        let response = self
            .client
            .get(self.latest_url(base_currency))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        debug!(%status, "Received rates response");

        let text = response.text().await.map_err(classify)?;

        if !status.is_success() {
            // The provider reports bad keys, unknown codes and quota problems
            // with a JSON body next to a 4xx status.
            let error_type = serde_json::from_str::<LatestRatesResponse>(&text)
                .ok()
                .and_then(|body| body.error_type)
                .unwrap_or_else(|| format!("HTTP error: {status}"));
            return Err(FetchError::Provider(Some(error_type)));
        }

        let data: LatestRatesResponse = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                error!(error = ?e, response = %text, "Failed to parse rates response");
                return Err(FetchError::Parse(e.to_string()));
            }
        };

        data.into_snapshot()
    }
}
