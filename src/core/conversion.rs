//! Currency conversion service
//!
//! [`ConversionService`] wraps a single [`RateProvider`] fetch with the
//! fallback policy the front ends rely on: neither operation ever fails,
//! every problem is turned into a message for the user.
//!
//! Calls are independent. Two overlapping `convert` calls each fetch their
//! own snapshot and publish their own states; nothing orders or cancels them.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::error::ServiceError;
use super::rates::{RateProvider, RateSnapshot};

/// Base used to discover which currencies the provider knows about.
pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// Shown when the provider's currency catalog can't be fetched.
pub const FALLBACK_CURRENCIES: [&str; 7] = ["USD", "EUR", "GBP", "JPY", "MXN", "CAD", "AUD"];

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: f64,
    pub from_currency: String,
    pub to_currency: String,
}

impl ConversionRequest {
    pub fn new(amount: f64, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            amount,
            from_currency: from.into(),
            to_currency: to.into(),
        }
    }
}

/// A successful conversion. Displays as `"100.00 USD = 90.00 EUR"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub from_currency: String,
    pub converted_amount: f64,
    pub to_currency: String,
}

impl Conversion {
    /// Looks up the target rate in `snapshot` and applies it to the request amount.
    pub fn from_snapshot(
        snapshot: &RateSnapshot,
        request: &ConversionRequest,
    ) -> Result<Self, ServiceError> {
        let rate = snapshot
            .rate(&request.to_currency)
            .ok_or_else(|| ServiceError::RateNotFound {
                from: request.from_currency.clone(),
                to: request.to_currency.clone(),
            })?;

        Ok(Self {
            amount: request.amount,
            from_currency: request.from_currency.clone(),
            converted_amount: request.amount * rate,
            to_currency: request.to_currency.clone(),
        })
    }
}

/// Formats `value` with two decimals, rounding halves away from zero on the
/// shortest decimal form of the float (`0.125` -> `"0.13"`, `1.005` -> `"1.01"`).
pub fn format_amount(value: f64) -> String {
    match Decimal::from_str(&value.to_string()) {
        Ok(decimal) => format!(
            "{:.2}",
            decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        ),
        // Outside Decimal's range; no midpoint can be seen at this magnitude.
        Err(_) => format!("{value:.2}"),
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} = {} {}",
            format_amount(self.amount),
            self.from_currency,
            format_amount(self.converted_amount),
            self.to_currency
        )
    }
}

/// State published while a conversion runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversionState {
    pub loading: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl ConversionState {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    pub fn succeeded(result: String) -> Self {
        Self {
            loading: false,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            loading: false,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

impl From<Result<Conversion, ServiceError>> for ConversionState {
    fn from(outcome: Result<Conversion, ServiceError>) -> Self {
        match outcome {
            Ok(conversion) => ConversionState::succeeded(conversion.to_string()),
            Err(e) => ConversionState::failed(e.to_string()),
        }
    }
}

/// Receives the state transitions of a `convert` call.
pub trait StateObserver: Send + Sync {
    fn publish(&self, state: ConversionState);
}

impl<F> StateObserver for F
where
    F: Fn(ConversionState) + Send + Sync,
{
    fn publish(&self, state: ConversionState) {
        self(state)
    }
}

/// Currency codes offered to the user, with a notice when the list is degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyList {
    pub codes: Vec<String>,
    pub notice: Option<String>,
    /// When the provider last refreshed the catalog, if known.
    pub as_of: Option<DateTime<Utc>>,
}

impl CurrencyList {
    fn fallback(notice: String) -> Self {
        let mut codes: Vec<String> = FALLBACK_CURRENCIES.iter().map(|c| c.to_string()).collect();
        codes.sort();
        Self {
            codes,
            notice: Some(notice),
            as_of: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.notice.is_some()
    }
}

#[derive(Clone)]
pub struct ConversionService {
    provider: Arc<dyn RateProvider>,
}

impl ConversionService {
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self { provider }
    }

    /// Lists the currencies known to the provider, falling back to a fixed
    /// set of common currencies when the catalog can't be fetched.
    #[instrument(name = "ListCurrencies", skip(self))]
    pub async fn list_available_currencies(&self) -> CurrencyList {
        match self.provider.fetch_rates(DEFAULT_BASE_CURRENCY).await {
            Ok(snapshot) => {
                debug!(count = snapshot.rates.len(), "Fetched currency catalog");
                CurrencyList {
                    codes: snapshot.currencies(),
                    notice: None,
                    as_of: snapshot.updated_at,
                }
            }
            Err(e) => {
                warn!(error = %e, "Using fallback currency list");
                CurrencyList::fallback(ServiceError::from(e).to_string())
            }
        }
    }

    /// Converts `request.amount` and reports progress to `observer`.
    ///
    /// The observer always sees exactly two states: `loading` first, then a
    /// final state with `loading == false` carrying either the formatted
    /// result or an error message. The final state is also returned.
    #[instrument(
        name = "Convert",
        skip(self, observer),
        fields(from = %request.from_currency, to = %request.to_currency)
    )]
    pub async fn convert(
        &self,
        request: ConversionRequest,
        observer: &dyn StateObserver,
    ) -> ConversionState {
        observer.publish(ConversionState::loading());

        let outcome = self.try_convert(&request).await;
        if let Err(e) = &outcome {
            debug!(error = ?e, "Conversion failed");
        }

        let state = ConversionState::from(outcome);
        observer.publish(state.clone());
        state
    }

    async fn try_convert(&self, request: &ConversionRequest) -> Result<Conversion, ServiceError> {
        let snapshot = self.provider.fetch_rates(&request.from_currency).await?;
        Conversion::from_snapshot(&snapshot, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticRateProvider {
        snapshots: HashMap<String, RateSnapshot>,
        calls: AtomicUsize,
    }

    impl StaticRateProvider {
        fn new(snapshots: Vec<RateSnapshot>) -> Self {
            Self {
                snapshots: snapshots
                    .into_iter()
                    .map(|s| (s.base_currency.clone(), s))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RateProvider for StaticRateProvider {
        async fn fetch_rates(&self, base_currency: &str) -> Result<RateSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.snapshots
                .get(base_currency)
                .cloned()
                .ok_or_else(|| FetchError::Provider(Some("unsupported-code".to_string())))
        }
    }

    struct FailingRateProvider(FetchError);

    #[async_trait]
    impl RateProvider for FailingRateProvider {
        async fn fetch_rates(&self, _base_currency: &str) -> Result<RateSnapshot, FetchError> {
            Err(self.0.clone())
        }
    }

    fn snapshot(base: &str, rates: &[(&str, f64)]) -> RateSnapshot {
        RateSnapshot::new(base, rates.iter().map(|(c, r)| (c.to_string(), *r)))
    }

    fn service_with(provider: impl RateProvider + 'static) -> ConversionService {
        ConversionService::new(Arc::new(provider))
    }

    fn usd_service() -> ConversionService {
        service_with(StaticRateProvider::new(vec![snapshot(
            "USD",
            &[("USD", 1.0), ("EUR", 0.9), ("JPY", 151.37), ("GBP", 0.79)],
        )]))
    }

    /// Records every published state.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<ConversionState>>);

    impl Recorder {
        fn states(&self) -> Vec<ConversionState> {
            self.0.lock().unwrap().clone()
        }
    }

    impl StateObserver for Recorder {
        fn publish(&self, state: ConversionState) {
            self.0.lock().unwrap().push(state);
        }
    }

    #[tokio::test]
    async fn test_convert_formats_result() {
        let service = service_with(StaticRateProvider::new(vec![snapshot(
            "USD",
            &[("EUR", 0.9)],
        )]));
        let recorder = Recorder::default();

        let state = service
            .convert(ConversionRequest::new(100.0, "USD", "EUR"), &recorder)
            .await;

        assert_eq!(state.result.as_deref(), Some("100.00 USD = 90.00 EUR"));
        assert!(state.error.is_none());
        assert_eq!(
            recorder.states(),
            vec![
                ConversionState::loading(),
                ConversionState::succeeded("100.00 USD = 90.00 EUR".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_convert_same_currency_is_identity() {
        let service = usd_service();
        for amount in [0.01, 1.0, 12.345, 999_999.99] {
            let state = service
                .convert(ConversionRequest::new(amount, "USD", "USD"), &|_: ConversionState| {})
                .await;
            let text = state.result.expect("conversion should succeed");
            let (lhs, rhs) = text.split_once(" = ").unwrap();
            assert_eq!(lhs.trim_end_matches(" USD"), rhs.trim_end_matches(" USD"));
        }
    }

    #[tokio::test]
    async fn test_convert_rounds_to_two_decimals() {
        let service = usd_service();

        let state = service
            .convert(ConversionRequest::new(2.0, "USD", "JPY"), &|_: ConversionState| {})
            .await;
        assert_eq!(state.result.as_deref(), Some("2.00 USD = 302.74 JPY"));
        assert!(state.is_success());

        let state = service
            .convert(ConversionRequest::new(3.0, "USD", "GBP"), &|_: ConversionState| {})
            .await;
        assert_eq!(state.result.as_deref(), Some("3.00 USD = 2.37 GBP"));
    }

    #[tokio::test]
    async fn test_convert_zero_amount() {
        let service = usd_service();
        let state = service
            .convert(ConversionRequest::new(0.0, "USD", "JPY"), &|_: ConversionState| {})
            .await;
        assert_eq!(state.result.as_deref(), Some("0.00 USD = 0.00 JPY"));
    }

    #[tokio::test]
    async fn test_convert_rate_not_found() {
        let service = usd_service();
        let recorder = Recorder::default();

        let state = service
            .convert(ConversionRequest::new(10.0, "USD", "XYZ"), &recorder)
            .await;

        assert!(!state.loading);
        assert!(state.result.is_none());
        assert!(
            state
                .error
                .as_deref()
                .unwrap()
                .contains("exchange rate not found")
        );
        let states = recorder.states();
        assert_eq!(states.len(), 2);
        assert!(states[0].loading);
        assert!(!states[1].loading);
    }

    #[tokio::test]
    async fn test_convert_connectivity_failure() {
        let service = service_with(FailingRateProvider(FetchError::Network(
            "connection refused".to_string(),
        )));
        let recorder = Recorder::default();

        let state = service
            .convert(ConversionRequest::new(10.0, "USD", "EUR"), &recorder)
            .await;

        assert_eq!(
            state,
            ConversionState::failed(
                "connection error, please check your internet connection.".to_string()
            )
        );
        assert_eq!(recorder.states().last(), Some(&state));
    }

    #[tokio::test]
    async fn test_convert_unknown_failure_carries_message() {
        let service = service_with(FailingRateProvider(FetchError::Parse(
            "missing field `conversion_rates`".to_string(),
        )));
        let state = service
            .convert(ConversionRequest::new(10.0, "USD", "EUR"), &|_: ConversionState| {})
            .await;
        let error = state.error.unwrap();
        assert!(error.starts_with("error: "));
        assert!(error.contains("conversion_rates"));

        let service = service_with(FailingRateProvider(FetchError::Provider(None)));
        let state = service
            .convert(ConversionRequest::new(10.0, "USD", "EUR"), &|_: ConversionState| {})
            .await;
        assert_eq!(state.error.as_deref(), Some("error: unknown error"));
    }

    #[tokio::test]
    async fn test_convert_uses_from_currency_as_base() {
        let service = service_with(StaticRateProvider::new(vec![
            snapshot("USD", &[("EUR", 0.9)]),
            snapshot("EUR", &[("USD", 1.1)]),
        ]));

        let state = service
            .convert(ConversionRequest::new(10.0, "EUR", "USD"), &|_: ConversionState| {})
            .await;
        assert_eq!(state.result.as_deref(), Some("10.00 EUR = 11.00 USD"));

        let state = service
            .convert(ConversionRequest::new(10.0, "GBP", "USD"), &|_: ConversionState| {})
            .await;
        assert_eq!(state.error.as_deref(), Some("error: unsupported-code"));
    }

    #[tokio::test]
    async fn test_overlapping_conversions_complete_independently() {
        let provider = Arc::new(StaticRateProvider::new(vec![snapshot(
            "USD",
            &[("EUR", 0.9), ("GBP", 0.79)],
        )]));
        let service = ConversionService::new(provider.clone());
        let first = Recorder::default();
        let second = Recorder::default();

        let (a, b) = tokio::join!(
            service.convert(ConversionRequest::new(100.0, "USD", "EUR"), &first),
            service.convert(ConversionRequest::new(100.0, "USD", "GBP"), &second),
        );

        assert_eq!(a.result.as_deref(), Some("100.00 USD = 90.00 EUR"));
        assert_eq!(b.result.as_deref(), Some("100.00 USD = 79.00 GBP"));
        assert_eq!(first.states().len(), 2);
        assert_eq!(second.states().len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_currencies_sorted() {
        let service = usd_service();
        let list = service.list_available_currencies().await;

        assert_eq!(list.codes, vec!["EUR", "GBP", "JPY", "USD"]);
        assert!(list.notice.is_none());
        assert!(!list.is_fallback());
    }

    #[tokio::test]
    async fn test_list_currencies_connectivity_fallback() {
        let service = service_with(FailingRateProvider(FetchError::Network(
            "timed out".to_string(),
        )));
        let list = service.list_available_currencies().await;

        assert_eq!(
            list.codes,
            vec!["AUD", "CAD", "EUR", "GBP", "JPY", "MXN", "USD"]
        );
        assert_eq!(
            list.notice.as_deref(),
            Some("connection error, please check your internet connection.")
        );
    }

    #[tokio::test]
    async fn test_list_currencies_generic_fallback() {
        let service = service_with(FailingRateProvider(FetchError::Provider(Some(
            "invalid-key".to_string(),
        ))));
        let list = service.list_available_currencies().await;

        assert_eq!(list.codes.len(), FALLBACK_CURRENCIES.len());
        assert_eq!(list.notice.as_deref(), Some("error: invalid-key"));
        assert!(list.as_of.is_none());

        let service = service_with(FailingRateProvider(FetchError::Provider(None)));
        let list = service.list_available_currencies().await;
        assert_eq!(list.notice.as_deref(), Some("error: unknown error"));
    }

    #[test]
    fn test_conversion_from_snapshot() {
        let snap = snapshot("USD", &[("MXN", 17.05)]);
        let conversion =
            Conversion::from_snapshot(&snap, &ConversionRequest::new(2.0, "USD", "MXN")).unwrap();
        assert_eq!(conversion.converted_amount, 2.0 * 17.05);
        assert_eq!(conversion.to_string(), "2.00 USD = 34.10 MXN");

        let err = Conversion::from_snapshot(&snap, &ConversionRequest::new(2.0, "USD", "CAD"))
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::RateNotFound {
                from: "USD".to_string(),
                to: "CAD".to_string()
            }
        );
    }

    #[test]
    fn test_amounts_round_half_up() {
        let snap = snapshot("USD", &[("X", 1.0), ("EUR", 0.5)]);
        let cases = [
            (0.125, "0.13"),
            (0.375, "0.38"),
            (1.005, "1.01"),
            (2.675, "2.68"),
            (0.045, "0.05"),
        ];
        for (amount, expected) in cases {
            let conversion =
                Conversion::from_snapshot(&snap, &ConversionRequest::new(amount, "USD", "X"))
                    .unwrap();
            assert_eq!(
                conversion.to_string(),
                format!("{expected} USD = {expected} X")
            );
        }

        let conversion =
            Conversion::from_snapshot(&snap, &ConversionRequest::new(0.25, "USD", "EUR")).unwrap();
        assert_eq!(conversion.to_string(), "0.25 USD = 0.13 EUR");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(90.0), "90.00");
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(2.0 * 17.05), "34.10");
        assert_eq!(format_amount(1234567.891), "1234567.89");
        assert_eq!(format_amount(1e30), format!("{:.2}", 1e30));
    }
}
