//! Reporting view of the catalog grouped by table title
//!
//! This path works on raw bracket records, so a broken label or a dangling
//! table reference only affects its own entry.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{AgeRange, PricingTable};

/// A bracket as stored, label not yet validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketRecord {
    pub table_id: u64,
    pub faixa: String,
    pub value: f64,
}

/// One line of the grouped report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketSummary {
    pub faixa: String,
    pub value: f64,
    /// None when the label could not be parsed
    pub lower_bound: Option<u32>,
}

/// Group bracket records under their table's title
///
/// Tables that share a title are keyed as "<title> (#<id>)".
/// Within a title, summaries are ordered by lower bound; records with
/// malformed labels are kept at the end and logged. Records pointing at an
/// unknown table are grouped under "#<table_id>".
pub fn group_by_table(
    tables: &[PricingTable],
    brackets: &[BracketRecord],
) -> BTreeMap<String, Vec<BracketSummary>> {
    let mut title_uses: HashMap<&str, usize> = HashMap::new();
    for table in tables {
        *title_uses.entry(table.title.as_str()).or_default() += 1;
    }
    let titles: HashMap<u64, String> = tables
        .iter()
        .map(|t| {
            let title = if title_uses[t.title.as_str()] > 1 {
                format!("{} (#{})", t.title, t.id)
            } else {
                t.title.clone()
            };
            (t.id, title)
        })
        .collect();
    let mut grouped: BTreeMap<String, Vec<BracketSummary>> = BTreeMap::new();

    for record in brackets {
        let title = match titles.get(&record.table_id) {
            Some(title) => title.clone(),
            None => {
                warn!("bracket {:?} references unknown table {}", record.faixa, record.table_id);
                format!("#{}", record.table_id)
            }
        };

        let lower_bound = match AgeRange::parse(&record.faixa) {
            Ok(range) => Some(range.lower_bound()),
            Err(e) => {
                warn!("report: {}", e);
                None
            }
        };

        grouped.entry(title).or_default().push(BracketSummary {
            faixa: record.faixa.clone(),
            value: record.value,
            lower_bound,
        });
    }

    for summaries in grouped.values_mut() {
        summaries.sort_by_key(|s| s.lower_bound.unwrap_or(u32::MAX));
    }

    grouped
}
