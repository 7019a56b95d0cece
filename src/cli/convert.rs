use super::ui;
use crate::core::{ConversionRequest, ConversionService, ConversionState, StateObserver};
use anyhow::{Result, bail};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parses the amount typed by the user. Amounts are finite and not negative.
pub fn parse_amount(input: &str) -> Result<f64> {
    let input = input.trim();
    if input.is_empty() {
        bail!("please enter an amount");
    }
    match input.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount.abs()),
        _ => bail!("please enter a valid amount"),
    }
}

fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim();
    if code.is_empty() {
        bail!("currency code must not be empty");
    }
    Ok(code.to_uppercase())
}

/// Builds one request per target currency. `swap` exchanges source and
/// target and needs exactly one target.
pub fn build_requests(
    amount: f64,
    from: &str,
    targets: &[String],
    swap: bool,
) -> Result<Vec<ConversionRequest>> {
    let from = normalize_code(from)?;
    let targets = targets
        .iter()
        .map(|t| normalize_code(t))
        .collect::<Result<Vec<_>>>()?;

    if targets.is_empty() {
        bail!("at least one target currency is required");
    }

    if swap {
        let [to] = targets.as_slice() else {
            bail!("--swap needs exactly one target currency");
        };
        return Ok(vec![ConversionRequest::new(amount, to.clone(), from)]);
    }

    Ok(targets
        .into_iter()
        .map(|to| ConversionRequest::new(amount, from.clone(), to))
        .collect())
}

/// Keeps the spinner visible while any conversion is still loading.
struct SpinnerObserver {
    pending: AtomicUsize,
    spinner: ProgressBar,
}

impl StateObserver for SpinnerObserver {
    fn publish(&self, state: ConversionState) {
        if state.loading {
            self.pending.fetch_add(1, Ordering::SeqCst);
        } else if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.spinner.finish_and_clear();
        }
    }
}

/// Runs every request concurrently and returns the final states in request order.
pub async fn convert_all(
    service: &ConversionService,
    requests: Vec<ConversionRequest>,
    observer: &dyn StateObserver,
) -> Vec<ConversionState> {
    let futures = requests
        .into_iter()
        .map(|request| service.convert(request, observer));
    join_all(futures).await
}

/// The line to print for a final state, and whether it goes to stdout.
fn outcome_line(state: &ConversionState) -> Option<(bool, &str)> {
    if state.is_success() {
        state.result.as_deref().map(|result| (true, result))
    } else {
        state.error.as_deref().map(|error| (false, error))
    }
}

pub async fn run(
    service: &ConversionService,
    amount: &str,
    from: &str,
    targets: &[String],
    swap: bool,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let requests = build_requests(amount, from, targets, swap)?;

    let observer = SpinnerObserver {
        pending: AtomicUsize::new(0),
        spinner: ui::new_spinner("Converting..."),
    };
    let states = convert_all(service, requests, &observer).await;
    observer.spinner.finish_and_clear();

    for state in &states {
        match outcome_line(state) {
            Some((true, line)) => println!("{}", ui::style_text(line, ui::StyleType::Result)),
            Some((false, line)) => eprintln!("{}", ui::style_text(line, ui::StyleType::Error)),
            None => {}
        }
    }

    Ok(())
}
