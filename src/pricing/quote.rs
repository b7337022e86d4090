//! Census quoting: price a list of applicants against one table
//!
//! Used by brokers to quote a whole group (company staff, a family) at once.

use chrono::NaiveDate;
use csv::Reader;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{age_on, PricingCatalog};
use crate::error::PricingError;

/// One census line
#[derive(Debug, Clone, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub birth_date: NaiveDate,
}

/// Quote result for one applicant; failures are kept per line
#[derive(Debug, Clone, Serialize)]
pub struct QuoteLine {
    pub name: String,
    pub age: Option<u32>,
    pub faixa: Option<String>,
    pub value: Option<f64>,
    pub error: Option<String>,
}

impl QuoteLine {
    pub fn is_priced(&self) -> bool {
        self.value.is_some()
    }
}

/// Load a census CSV with `name,birth_date` columns (dates as YYYY-MM-DD)
pub fn load_census<P: AsRef<Path>>(path: P) -> Result<Vec<Applicant>, PricingError> {
    let mut reader = Reader::from_path(path)?;
    let mut applicants = Vec::new();

    for result in reader.deserialize() {
        let applicant: Applicant = result?;
        applicants.push(applicant);
    }

    Ok(applicants)
}

/// Price every applicant on `on`, in parallel
///
/// Output order matches input order. One applicant's failure does not stop
/// the others.
pub fn quote_census(
    catalog: &PricingCatalog,
    table_id: u64,
    applicants: &[Applicant],
    on: NaiveDate,
) -> Vec<QuoteLine> {
    applicants
        .par_iter()
        .map(|applicant| {
            let age = age_on(applicant.birth_date, on).ok();
            match catalog.resolve_for_birth_date(table_id, applicant.birth_date, on) {
                Ok(bracket) => QuoteLine {
                    name: applicant.name.clone(),
                    age,
                    faixa: Some(bracket.label.clone()),
                    value: Some(bracket.value),
                    error: None,
                },
                Err(e) => QuoteLine {
                    name: applicant.name.clone(),
                    age,
                    faixa: None,
                    value: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect()
}
