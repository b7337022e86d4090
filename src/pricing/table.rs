//! Pricing table metadata

use serde::{Deserialize, Serialize};

/// A named pricing table owned by the administrative catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    pub id: u64,

    /// Display title (e.g. "Amil S380 QC Empresarial")
    pub title: String,

    /// Health-plan operator
    pub operator: String,

    /// Plan type (e.g. "Empresarial", "Adesão", "Individual")
    pub plan_type: String,

    /// Segmentation (e.g. "Ambulatorial + Hospitalar")
    pub segmentation: String,

    /// Coverage-area tags (states or cities)
    #[serde(default)]
    pub coverage_areas: Vec<String>,

    /// Inactive tables cannot be quoted
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PricingTable {
    pub fn new(id: u64, title: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            operator: operator.into(),
            plan_type: String::new(),
            segmentation: String::new(),
            coverage_areas: Vec::new(),
            active: true,
        }
    }

    /// Check whether the table is sold in a coverage area (case-insensitive)
    pub fn covers_area(&self, area: &str) -> bool {
        self.coverage_areas
            .iter()
            .any(|a| a.trim().eq_ignore_ascii_case(area.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_area() {
        let mut table = PricingTable::new(1, "Plano Ouro", "Operadora X");
        table.coverage_areas = vec!["SP".to_string(), " rj ".to_string()];

        assert!(table.covers_area("sp"));
        assert!(table.covers_area("RJ"));
        assert!(!table.covers_area("MG"));
        assert!(table.active);
    }
}
