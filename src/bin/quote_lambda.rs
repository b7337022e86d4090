//! AWS Lambda handler for single-person quotes
//!
//! Accepts `{table_id, age}` or `{table_id, birth_date, on?}` and returns the
//! matching faixa and its monthly premium. Resolution failures come back in
//! the `error` field rather than failing the invocation.

use chrono::{NaiveDate, Utc};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use plan_proposals::pricing::loader::{load_catalog, DEFAULT_CATALOG_PATH};
use plan_proposals::pricing::{age_on, PricingCatalog};
use plan_proposals::PricingError;

/// Input of one quote
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub table_id: u64,

    /// Age in completed years; takes precedence over `birth_date`
    #[serde(default)]
    pub age: Option<u32>,

    #[serde(default)]
    pub birth_date: Option<NaiveDate>,

    /// Quote date for `birth_date` (default: today, UTC)
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

/// Output of one quote
#[derive(Debug, Serialize, Default)]
pub struct QuoteResponse {
    pub table_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faixa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why a quote could not be produced
#[derive(Debug, thiserror::Error)]
enum QuoteFailure {
    #[error("invalid request: provide either age or birth_date")]
    MissingAge,

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

fn resolve(catalog: &PricingCatalog, request: &QuoteRequest, today: NaiveDate) -> Result<(u32, String, f64), QuoteFailure> {
    let age = match (request.age, request.birth_date) {
        (Some(age), _) => age,
        (None, Some(birth)) => age_on(birth, request.on.unwrap_or(today))?,
        (None, None) => return Err(QuoteFailure::MissingAge),
    };
    let bracket = catalog.resolve_bracket_for_age(request.table_id, age)?;
    Ok((age, bracket.label.clone(), bracket.value))
}

/// Price a request; failures are reported in the response
fn quote(catalog: &PricingCatalog, request: &QuoteRequest, today: NaiveDate) -> QuoteResponse {
    match resolve(catalog, request, today) {
        Ok((age, faixa, value)) => QuoteResponse {
            table_id: request.table_id,
            age: Some(age),
            faixa: Some(faixa),
            value: Some(value),
            error: None,
        },
        Err(e) => {
            warn!("quote on table {} failed: {}", request.table_id, e);
            QuoteResponse {
                table_id: request.table_id,
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    }
}

async fn handler(catalog: &PricingCatalog, event: LambdaEvent<QuoteRequest>) -> Result<QuoteResponse, Error> {
    let (request, _context) = event.into_parts();
    Ok(quote(catalog, &request, Utc::now().date_naive()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let path = std::env::var("PORTAL_CATALOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH));
    let catalog = load_catalog(&path)?;
    info!("catalog loaded from {} ({} tables)", path.display(), catalog.tables().count());

    let catalog = &catalog;
    run(service_fn(move |event: LambdaEvent<QuoteRequest>| async move {
        handler(catalog, event).await
    }))
    .await
}
