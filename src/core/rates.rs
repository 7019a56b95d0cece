//! Exchange rate snapshots and the provider port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Rates for one base currency at one point in time.
///
/// Each rate is the value of one unit of `base_currency` expressed in the
/// keyed currency. Keys are unique and kept in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub base_currency: String,
    pub rates: BTreeMap<String, f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    /// Builds a snapshot, discarding entries that are not positive finite numbers.
    pub fn new<I>(base_currency: impl Into<String>, rates: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let rates = rates
            .into_iter()
            .filter(|(code, rate)| {
                let valid = rate.is_finite() && *rate > 0.0;
                if !valid {
                    debug!(%code, rate, "Discarding invalid rate");
                }
                valid
            })
            .collect();

        Self {
            base_currency: base_currency.into(),
            rates,
            updated_at: None,
        }
    }

    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    /// Currency codes in ascending order.
    pub fn currencies(&self) -> Vec<String> {
        self.rates.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The endpoint could not be reached or the transfer broke off.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered but reported a failure.
    #[error("{}", .0.as_deref().unwrap_or("provider error"))]
    Provider(Option<String>),

    #[error("failed to parse rates response: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, base_currency: &str) -> Result<RateSnapshot, FetchError>;
}
