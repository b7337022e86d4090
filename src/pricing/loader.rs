//! Catalog loading from CSV files and from store rows
//!
//! CSV layout (in data/catalog/):
//! - pricing_tables.csv: id,title,operator,plan_type,segmentation,coverage_areas,active
//!   (coverage_areas separated by ';')
//! - pricing_brackets.csv: table_id,faixa,value

use csv::Reader;
use serde::Deserialize;
use std::path::Path;

use super::{BracketRecord, PricingBracket, PricingCatalog, PricingTable};
use crate::error::PricingError;
use crate::store::{from_row, Filter, Order, Store};

/// Default path to the catalog directory
pub const DEFAULT_CATALOG_PATH: &str = "data/catalog";

/// Store table holding pricing table metadata
pub const TABLES: &str = "pricing_tables";

/// Store table holding brackets
pub const BRACKETS: &str = "pricing_brackets";

/// Raw CSV row of pricing_tables.csv
#[derive(Debug, Deserialize)]
struct TableCsvRow {
    id: u64,
    title: String,
    operator: String,
    #[serde(default)]
    plan_type: String,
    #[serde(default)]
    segmentation: String,
    #[serde(default)]
    coverage_areas: String,
    active: String,
}

impl TableCsvRow {
    fn to_table(self) -> Result<PricingTable, PricingError> {
        let active = match self.active.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "sim" => true,
            "false" | "0" | "no" | "nao" | "não" => false,
            other => {
                return Err(PricingError::MalformedRow(format!(
                    "table {}: unknown active flag {:?}",
                    self.id, other
                )))
            }
        };

        let coverage_areas = self
            .coverage_areas
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();

        Ok(PricingTable {
            id: self.id,
            title: self.title,
            operator: self.operator,
            plan_type: self.plan_type,
            segmentation: self.segmentation,
            coverage_areas,
            active,
        })
    }
}

/// Load table metadata from pricing_tables.csv
pub fn load_tables(path: &Path) -> Result<Vec<PricingTable>, PricingError> {
    let mut reader = Reader::from_path(path.join("pricing_tables.csv"))?;
    let mut tables = Vec::new();

    for result in reader.deserialize() {
        let row: TableCsvRow = result?;
        tables.push(row.to_table()?);
    }

    Ok(tables)
}

/// Load raw bracket records from pricing_brackets.csv, labels unchecked
pub fn load_bracket_records(path: &Path) -> Result<Vec<BracketRecord>, PricingError> {
    let mut reader = Reader::from_path(path.join("pricing_brackets.csv"))?;
    let mut records = Vec::new();

    for result in reader.deserialize() {
        let record: BracketRecord = result?;
        records.push(record);
    }

    Ok(records)
}

/// Build a catalog from tables and raw records, validating every label
pub fn build_catalog(
    tables: Vec<PricingTable>,
    records: Vec<BracketRecord>,
) -> Result<PricingCatalog, PricingError> {
    let brackets = records
        .into_iter()
        .map(|r| PricingBracket::new(r.table_id, r.faixa, r.value))
        .collect::<Result<Vec<_>, _>>()?;

    PricingCatalog::from_parts(tables, brackets)
}

/// Load the whole catalog from a directory
pub fn load_catalog(path: &Path) -> Result<PricingCatalog, PricingError> {
    build_catalog(load_tables(path)?, load_bracket_records(path)?)
}

/// Load the catalog from the default location
pub fn load_default_catalog() -> Result<PricingCatalog, PricingError> {
    load_catalog(Path::new(DEFAULT_CATALOG_PATH))
}

/// Load the catalog from the `pricing_tables` and `pricing_brackets` store tables
pub fn load_catalog_from_store(store: &dyn Store) -> Result<PricingCatalog, PricingError> {
    let tables = store
        .select(TABLES, &Filter::new(), Some(&Order::asc("id")))?
        .into_iter()
        .map(|row| from_row::<PricingTable>(TABLES, row))
        .collect::<Result<Vec<_>, _>>()?;

    let records = store
        .select(BRACKETS, &Filter::new(), None)?
        .into_iter()
        .map(|row| from_row::<BracketRecord>(BRACKETS, row))
        .collect::<Result<Vec<_>, _>>()?;

    build_catalog(tables, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{to_row, MemoryStore};
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_load_default_catalog() {
        let result = load_default_catalog();
        assert!(result.is_ok(), "Failed to load catalog: {:?}", result.err());

        let catalog = result.unwrap();
        assert!(catalog.tables().count() >= 2);

        // Every shipped active table must partition all ages
        for table in catalog.tables().filter(|t| t.active) {
            assert!(
                catalog.validate_coverage(table.id).is_ok(),
                "table {} has incomplete coverage",
                table.id
            );
        }

        let first = catalog.tables().next().unwrap();
        assert!(!first.coverage_areas.is_empty());
    }

    #[test]
    fn test_malformed_label_is_rejected() {
        let tables = vec![PricingTable::new(1, "T", "Op")];
        let records = vec![BracketRecord {
            table_id: 1,
            faixa: "dezoito".to_string(),
            value: 10.0,
        }];
        assert!(matches!(
            build_catalog(tables, records),
            Err(PricingError::MalformedLabel { .. })
        ));
    }

    #[test]
    fn test_load_from_store() {
        let mut store = MemoryStore::new();
        store
            .insert(TABLES, to_row(TABLES, &PricingTable::new(3, "Store", "Op")).unwrap())
            .unwrap();
        for (faixa, value) in [("0-43", 120.0), ("44+", 480.5)] {
            store
                .insert(BRACKETS, to_row(BRACKETS, &json!({"table_id": 3, "faixa": faixa, "value": value})).unwrap())
                .unwrap();
        }

        let catalog = load_catalog_from_store(&store).unwrap();
        assert_relative_eq!(catalog.resolve_bracket_for_age(3, 50).unwrap().value, 480.5);
    }

    #[test]
    fn test_store_row_shape_checked() {
        let mut store = MemoryStore::new();
        store
            .insert(TABLES, json!({"id": "not a number", "title": "x"}).as_object().cloned().unwrap())
            .unwrap();

        match load_catalog_from_store(&store) {
            Err(PricingError::Store(StoreError::Malformed { table, .. })) => assert_eq!(table, TABLES),
            other => panic!("expected malformed row, got {:?}", other),
        }
    }
}
