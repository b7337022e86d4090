//! Age-bracket pricing: tables, brackets and premium resolution

mod bracket;
mod table;
mod report;
mod quote;
pub mod loader;

pub use bracket::{AgeRange, PricingBracket};
pub use table::PricingTable;
pub use report::{group_by_table, BracketRecord, BracketSummary};
pub use quote::{load_census, quote_census, Applicant, QuoteLine};

use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

use crate::error::PricingError;

/// Completed years between `birth_date` and `on`
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> Result<u32, PricingError> {
    on.years_since(birth_date)
        .ok_or(PricingError::BirthDateInFuture(birth_date))
}

/// Administrative catalog of pricing tables and their brackets
///
/// Brackets are kept ordered by lower bound within each table.
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    tables: BTreeMap<u64, PricingTable>,
    brackets: BTreeMap<u64, Vec<PricingBracket>>,
}

impl PricingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting malformed or duplicated brackets
    pub fn from_parts(
        tables: Vec<PricingTable>,
        brackets: Vec<PricingBracket>,
    ) -> Result<Self, PricingError> {
        let mut catalog = Self::new();
        for table in tables {
            catalog.add_table(table);
        }
        for bracket in brackets {
            catalog.insert_bracket(bracket)?;
        }
        Ok(catalog)
    }

    /// Add or replace a table's metadata; existing brackets are kept
    pub fn add_table(&mut self, table: PricingTable) {
        self.brackets.entry(table.id).or_default();
        self.tables.insert(table.id, table);
    }

    /// Insert a bracket whose label is new to its table
    pub fn insert_bracket(&mut self, bracket: PricingBracket) -> Result<(), PricingError> {
        let table_id = bracket.table_id;
        self.table(table_id)?;

        let brackets = self.brackets.entry(table_id).or_default();
        if brackets.iter().any(|b| b.label == bracket.label) {
            return Err(PricingError::DuplicateLabel {
                table_id,
                label: bracket.label,
            });
        }

        brackets.push(bracket);
        brackets.sort_by_key(|b| b.range().lower_bound());
        Ok(())
    }

    /// Insert a bracket or replace the value of the one with the same label
    ///
    /// Proposals keep their own price snapshot, so edits here never reach them.
    pub fn upsert_bracket(&mut self, bracket: PricingBracket) -> Result<(), PricingError> {
        let table_id = bracket.table_id;
        self.table(table_id)?;

        let brackets = self.brackets.entry(table_id).or_default();
        match brackets.iter_mut().find(|b| b.label == bracket.label) {
            Some(existing) => *existing = bracket,
            None => {
                brackets.push(bracket);
                brackets.sort_by_key(|b| b.range().lower_bound());
            }
        }
        Ok(())
    }

    pub fn set_table_active(&mut self, table_id: u64, active: bool) -> Result<(), PricingError> {
        let table = self
            .tables
            .get_mut(&table_id)
            .ok_or(PricingError::TableNotFound(table_id))?;
        table.active = active;
        Ok(())
    }

    pub fn table(&self, table_id: u64) -> Result<&PricingTable, PricingError> {
        self.tables
            .get(&table_id)
            .ok_or(PricingError::TableNotFound(table_id))
    }

    pub fn tables(&self) -> impl Iterator<Item = &PricingTable> {
        self.tables.values()
    }

    /// Brackets of a table ordered ascending by lower bound
    pub fn list_brackets_for_table(&self, table_id: u64) -> Result<&[PricingBracket], PricingError> {
        self.table(table_id)?;
        Ok(self
            .brackets
            .get(&table_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    fn quotable_brackets(&self, table_id: u64) -> Result<&[PricingBracket], PricingError> {
        if !self.table(table_id)?.active {
            return Err(PricingError::TableInactive(table_id));
        }
        self.list_brackets_for_table(table_id)
    }

    /// Find the single bracket whose range contains `age`
    ///
    /// Fails when no bracket covers the age; there is no default or nearest
    /// bracket. Overlapping brackets are reported as ambiguous.
    pub fn resolve_bracket_for_age(&self, table_id: u64, age: u32) -> Result<&PricingBracket, PricingError> {
        let brackets = self.quotable_brackets(table_id)?;
        let mut matching = brackets.iter().filter(|b| b.covers(age));

        let found = matching.next().ok_or_else(|| PricingError::BracketNotFound {
            table_id,
            query: format!("age {}", age),
        })?;

        let extra = matching.count();
        if extra > 0 {
            return Err(PricingError::AmbiguousBracket {
                table_id,
                age,
                count: extra + 1,
            });
        }

        debug!("table {} age {} -> {} ({:.2})", table_id, age, found.label, found.value);
        Ok(found)
    }

    /// Look up a premium by the exact stored bracket label
    pub fn resolve_value_for_faixa(&self, table_id: u64, label: &str) -> Result<f64, PricingError> {
        self.quotable_brackets(table_id)?
            .iter()
            .find(|b| b.label == label)
            .map(|b| b.value)
            .ok_or_else(|| PricingError::BracketNotFound {
                table_id,
                query: format!("label {:?}", label),
            })
    }

    /// Resolve by birth date, using the age in completed years on `on`
    pub fn resolve_for_birth_date(
        &self,
        table_id: u64,
        birth_date: NaiveDate,
        on: NaiveDate,
    ) -> Result<&PricingBracket, PricingError> {
        let age = age_on(birth_date, on)?;
        self.resolve_bracket_for_age(table_id, age)
    }

    /// Check that a table's brackets partition [0, ∞)
    ///
    /// Brackets must start at 0, leave no gaps, never overlap and end with an
    /// open-ended bracket.
    pub fn validate_coverage(&self, table_id: u64) -> Result<(), PricingError> {
        let brackets = self.list_brackets_for_table(table_id)?;
        if brackets.is_empty() {
            return Err(PricingError::EmptyTable(table_id));
        }

        let mut next_age: u32 = 0;
        let mut previous: Option<&PricingBracket> = None;

        for bracket in brackets {
            let range = bracket.range();

            if let Some(prev) = previous {
                if prev.range().is_open() || range.overlaps(&prev.range()) {
                    return Err(PricingError::CoverageOverlap {
                        table_id,
                        first: prev.label.clone(),
                        second: bracket.label.clone(),
                    });
                }
            }

            if range.lower_bound() > next_age {
                return Err(PricingError::CoverageGap {
                    table_id,
                    from: next_age,
                    to: range.lower_bound() - 1,
                });
            }

            match range.upper_bound() {
                Some(max) => next_age = max.saturating_add(1),
                None => next_age = u32::MAX,
            }
            previous = Some(bracket);
        }

        match previous {
            Some(last) if last.range().is_open() => Ok(()),
            _ => Err(PricingError::MissingOpenBracket(table_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Table 1 from the reference scenario, with a gap between 34 and 58
    fn scenario_catalog() -> PricingCatalog {
        let table = PricingTable::new(1, "Plano Referência", "Operadora Teste");
        let brackets = vec![
            PricingBracket::new(1, "59+", 400.0).unwrap(),
            PricingBracket::new(1, "0-18", 100.0).unwrap(),
            PricingBracket::new(1, "29-33", 200.0).unwrap(),
            PricingBracket::new(1, "19-28", 150.0).unwrap(),
        ];
        PricingCatalog::from_parts(vec![table], brackets).unwrap()
    }

    /// ANS-style ten brackets covering every age
    fn full_catalog() -> PricingCatalog {
        let table = PricingTable::new(7, "Plano Completo", "Operadora Teste");
        let labels = [
            "0-18", "19-23", "24-28", "29-33", "34-38", "39-43", "44-48", "49-53", "54-58", "59+",
        ];
        let brackets = labels
            .iter()
            .enumerate()
            .map(|(i, label)| PricingBracket::new(7, *label, 100.0 + 50.0 * i as f64).unwrap())
            .collect();
        PricingCatalog::from_parts(vec![table], brackets).unwrap()
    }

    #[test]
    fn test_scenario_resolution() {
        let catalog = scenario_catalog();

        assert_relative_eq!(catalog.resolve_bracket_for_age(1, 30).unwrap().value, 200.0);
        assert_relative_eq!(catalog.resolve_bracket_for_age(1, 70).unwrap().value, 400.0);
        assert_relative_eq!(catalog.resolve_bracket_for_age(1, 5).unwrap().value, 100.0);
        assert_relative_eq!(catalog.resolve_bracket_for_age(1, 0).unwrap().value, 100.0);
        assert_relative_eq!(catalog.resolve_bracket_for_age(1, 59).unwrap().value, 400.0);
    }

    #[test]
    fn test_uncovered_age_is_an_error() {
        let catalog = scenario_catalog();

        let err = catalog.resolve_bracket_for_age(1, 40).unwrap_err();
        assert!(matches!(err, PricingError::BracketNotFound { table_id: 1, .. }));
    }

    #[test]
    fn test_unknown_and_inactive_tables() {
        let mut catalog = scenario_catalog();
        assert!(matches!(
            catalog.resolve_bracket_for_age(99, 30),
            Err(PricingError::TableNotFound(99))
        ));

        catalog.set_table_active(1, false).unwrap();
        assert!(matches!(
            catalog.resolve_bracket_for_age(1, 30),
            Err(PricingError::TableInactive(1))
        ));
        assert!(matches!(
            catalog.resolve_value_for_faixa(1, "29-33"),
            Err(PricingError::TableInactive(1))
        ));
        // Listing stays available for administration
        assert_eq!(catalog.list_brackets_for_table(1).unwrap().len(), 4);
    }

    #[test]
    fn test_full_coverage_returns_exactly_one_bracket() {
        let catalog = full_catalog();
        assert!(catalog.validate_coverage(7).is_ok());

        for age in 0..=130 {
            let bracket = catalog.resolve_bracket_for_age(7, age).unwrap();
            assert!(bracket.covers(age), "age {} resolved to {}", age, bracket.label);
            let matches = catalog
                .list_brackets_for_table(7)
                .unwrap()
                .iter()
                .filter(|b| b.covers(age))
                .count();
            assert_eq!(matches, 1);
        }
    }

    #[test]
    fn test_faixa_lookup_agrees_with_age_lookup() {
        let catalog = full_catalog();

        for age in [0, 18, 19, 33, 45, 58, 59, 90] {
            let bracket = catalog.resolve_bracket_for_age(7, age).unwrap();
            let value = catalog.resolve_value_for_faixa(7, &bracket.label).unwrap();
            assert_relative_eq!(value, bracket.value);
        }

        assert!(matches!(
            catalog.resolve_value_for_faixa(7, "60-64"),
            Err(PricingError::BracketNotFound { .. })
        ));
        // Lookup is by exact stored label
        assert!(catalog.resolve_value_for_faixa(7, " 0-18").is_err());
    }

    #[test]
    fn test_list_is_ordered_by_lower_bound() {
        let catalog = scenario_catalog();
        let labels: Vec<&str> = catalog
            .list_brackets_for_table(1)
            .unwrap()
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, vec!["0-18", "19-28", "29-33", "59+"]);
    }

    #[test]
    fn test_coverage_gap_detected() {
        let catalog = scenario_catalog();
        match catalog.validate_coverage(1) {
            Err(PricingError::CoverageGap { from, to, .. }) => {
                assert_eq!(from, 34);
                assert_eq!(to, 58);
            }
            other => panic!("expected gap, got {:?}", other),
        }
    }

    #[test]
    fn test_coverage_overlap_and_missing_top() {
        let table = PricingTable::new(2, "Sobreposta", "Op");
        let catalog = PricingCatalog::from_parts(
            vec![table.clone()],
            vec![
                PricingBracket::new(2, "0-20", 10.0).unwrap(),
                PricingBracket::new(2, "18-30", 20.0).unwrap(),
                PricingBracket::new(2, "31+", 30.0).unwrap(),
            ],
        )
        .unwrap();
        assert!(matches!(
            catalog.validate_coverage(2),
            Err(PricingError::CoverageOverlap { .. })
        ));
        assert!(matches!(
            catalog.resolve_bracket_for_age(2, 19),
            Err(PricingError::AmbiguousBracket { count: 2, .. })
        ));

        let catalog = PricingCatalog::from_parts(
            vec![table],
            vec![
                PricingBracket::new(2, "0-20", 10.0).unwrap(),
                PricingBracket::new(2, "21-30", 20.0).unwrap(),
            ],
        )
        .unwrap();
        assert!(matches!(
            catalog.validate_coverage(2),
            Err(PricingError::MissingOpenBracket(2))
        ));
    }

    #[test]
    fn test_late_start_is_a_gap() {
        let catalog = PricingCatalog::from_parts(
            vec![PricingTable::new(3, "Adultos", "Op")],
            vec![PricingBracket::new(3, "18+", 10.0).unwrap()],
        )
        .unwrap();
        assert!(matches!(
            catalog.validate_coverage(3),
            Err(PricingError::CoverageGap { from: 0, to: 17, .. })
        ));

        let empty = PricingCatalog::from_parts(vec![PricingTable::new(4, "Vazia", "Op")], vec![]).unwrap();
        assert!(matches!(empty.validate_coverage(4), Err(PricingError::EmptyTable(4))));
    }

    #[test]
    fn test_duplicate_and_upsert() {
        let mut catalog = scenario_catalog();

        let dup = PricingBracket::new(1, "29-33", 999.0).unwrap();
        assert!(matches!(
            catalog.insert_bracket(dup.clone()),
            Err(PricingError::DuplicateLabel { .. })
        ));

        catalog.upsert_bracket(dup).unwrap();
        assert_relative_eq!(catalog.resolve_value_for_faixa(1, "29-33").unwrap(), 999.0);

        catalog
            .upsert_bracket(PricingBracket::new(1, "34-58", 300.0).unwrap())
            .unwrap();
        assert!(catalog.validate_coverage(1).is_ok());
        assert_relative_eq!(catalog.resolve_bracket_for_age(1, 40).unwrap().value, 300.0);

        let orphan = PricingBracket::new(42, "0-18", 1.0).unwrap();
        assert!(matches!(
            catalog.upsert_bracket(orphan),
            Err(PricingError::TableNotFound(42))
        ));
    }

    #[test]
    fn test_birth_date_resolution() {
        let catalog = scenario_catalog();
        let on = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        // Turns 30 on the quote date
        let birth = NaiveDate::from_ymd_opt(1996, 10, 16).unwrap();
        assert_eq!(age_on(birth, on).unwrap(), 30);
        assert_relative_eq!(catalog.resolve_for_birth_date(1, birth, on).unwrap().value, 200.0);

        // One day short of 19
        let birth = NaiveDate::from_ymd_opt(2007, 10, 17).unwrap();
        assert_eq!(age_on(birth, on).unwrap(), 18);
        assert_eq!(catalog.resolve_for_birth_date(1, birth, on).unwrap().label, "0-18");

        let future = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert!(matches!(
            catalog.resolve_for_birth_date(1, future, on),
            Err(PricingError::BirthDateInFuture(_))
        ));
    }
}
