//! Proposal data structures

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::questionnaire::HealthAnswer;
use crate::error::PricingError;
use crate::pricing::{PricingBracket, PricingCatalog};

/// Lifecycle status of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Submitted, awaiting review
    Pending,
    /// Accepted by the back office
    Validated,
    /// Refused by the back office
    Rejected,
    /// Withdrawn by the broker or an administrator
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Validated => "validated",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Cancelled => "cancelled",
        }
    }

    /// No normal-flow transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }

    /// Normal-flow transitions: pending to any terminal status
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(self, ProposalStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinship of a dependent to the proposal holder
///
/// Serialized as snake_case names; deserialization also accepts the form labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Relationship {
    Spouse,
    Partner,
    Child,
    Stepchild,
    Parent,
    ParentInLaw,
    Sibling,
    Grandchild,
    Grandparent,
    Ward,
    Other,
    Unspecified,
}

impl Relationship {
    /// Parse the portal's form labels; unknown text is `Other`, blank is `Unspecified`
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "" => Relationship::Unspecified,
            "cônjuge" | "conjuge" | "esposo" | "esposa" | "spouse" => Relationship::Spouse,
            "companheiro" | "companheira" | "companheiro(a)" | "partner" => Relationship::Partner,
            "filho" | "filha" | "filho(a)" | "child" => Relationship::Child,
            "enteado" | "enteada" | "enteado(a)" | "stepchild" => Relationship::Stepchild,
            "pai" | "mãe" | "mae" | "pai/mãe" | "parent" => Relationship::Parent,
            "sogro" | "sogra" | "sogro(a)" | "parent_in_law" => Relationship::ParentInLaw,
            "irmão" | "irmao" | "irmã" | "irma" | "irmão(ã)" | "sibling" => Relationship::Sibling,
            "neto" | "neta" | "neto(a)" | "grandchild" => Relationship::Grandchild,
            "avô" | "avó" | "avo" | "avô/avó" | "grandparent" => Relationship::Grandparent,
            "tutelado" | "tutelada" | "tutelado(a)" | "ward" => Relationship::Ward,
            "não informado" | "nao informado" | "unspecified" => Relationship::Unspecified,
            _ => Relationship::Other,
        }
    }

    /// Form label
    pub fn label(&self) -> &'static str {
        match self {
            Relationship::Spouse => "Cônjuge",
            Relationship::Partner => "Companheiro(a)",
            Relationship::Child => "Filho(a)",
            Relationship::Stepchild => "Enteado(a)",
            Relationship::Parent => "Pai/Mãe",
            Relationship::ParentInLaw => "Sogro(a)",
            Relationship::Sibling => "Irmão(ã)",
            Relationship::Grandchild => "Neto(a)",
            Relationship::Grandparent => "Avô/Avó",
            Relationship::Ward => "Tutelado(a)",
            Relationship::Other => "Outro",
            Relationship::Unspecified => "Não informado",
        }
    }
}

impl From<String> for Relationship {
    fn from(label: String) -> Self {
        Relationship::from_label(&label)
    }
}

/// Price resolved from the catalog at quote time
///
/// Copied onto the proposal; later catalog edits do not change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub table_id: u64,
    pub faixa: String,
    pub value: f64,
}

impl From<&PricingBracket> for PriceSnapshot {
    fn from(bracket: &PricingBracket) -> Self {
        Self {
            table_id: bracket.table_id,
            faixa: bracket.label.clone(),
            value: bracket.value,
        }
    }
}

/// Identity and contact of the proposal holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    /// CPF, formatted or not
    pub cpf: String,
    pub birth_date: NaiveDate,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A person covered under the proposal's plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependent {
    pub name: String,
    #[serde(default)]
    pub cpf: Option<String>,
    pub birth_date: NaiveDate,
    pub relationship: Relationship,
    /// Resolved with the holder's table; required at submission
    #[serde(default)]
    pub price: Option<PriceSnapshot>,
}

/// Proposal as filled in by the broker, before submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub client: ClientIdentity,
    /// Holder's resolved price; required at submission
    #[serde(default)]
    pub price: Option<PriceSnapshot>,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
    #[serde(default)]
    pub health_answers: Vec<HealthAnswer>,
}

impl ProposalDraft {
    pub fn new(client: ClientIdentity) -> Self {
        Self {
            client,
            price: None,
            dependents: Vec::new(),
            health_answers: Vec::new(),
        }
    }

    /// Resolve holder and dependent prices from `table_id` by age on `on`
    pub fn price_with(
        &mut self,
        catalog: &PricingCatalog,
        table_id: u64,
        on: NaiveDate,
    ) -> Result<(), PricingError> {
        let holder = catalog.resolve_for_birth_date(table_id, self.client.birth_date, on)?;
        let mut dependent_prices = Vec::with_capacity(self.dependents.len());
        for dependent in &self.dependents {
            let bracket = catalog.resolve_for_birth_date(table_id, dependent.birth_date, on)?;
            dependent_prices.push(PriceSnapshot::from(bracket));
        }

        self.price = Some(PriceSnapshot::from(holder));
        for (dependent, price) in self.dependents.iter_mut().zip(dependent_prices) {
            dependent.price = Some(price);
        }
        Ok(())
    }
}

/// A submitted proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub client: ClientIdentity,
    /// Holder's price snapshot
    pub price: PriceSnapshot,
    pub status: ProposalStatus,
    pub cancellation_reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub dependents: Vec<Dependent>,
    pub health_answers: Vec<HealthAnswer>,
}

impl Proposal {
    /// Monthly premium of the holder plus every dependent
    pub fn total_premium(&self) -> f64 {
        self.price.value
            + self
                .dependents
                .iter()
                .filter_map(|d| d.price.as_ref())
                .map(|p| p.value)
                .sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PricingTable;
    use approx::assert_relative_eq;

    #[test]
    fn test_status_transitions() {
        use ProposalStatus::*;

        assert!(Pending.can_transition_to(Validated));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Validated, Rejected, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Validated, Rejected, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_serde_matches_as_str() {
        for status in [
            ProposalStatus::Pending,
            ProposalStatus::Validated,
            ProposalStatus::Rejected,
            ProposalStatus::Cancelled,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
        }
    }

    #[test]
    fn test_relationship_labels() {
        assert_eq!(Relationship::from_label("Cônjuge"), Relationship::Spouse);
        assert_eq!(Relationship::from_label(" filha "), Relationship::Child);
        assert_eq!(Relationship::from_label("Sogro(a)"), Relationship::ParentInLaw);
        assert_eq!(Relationship::from_label("Primo"), Relationship::Other);
        assert_eq!(Relationship::from_label(""), Relationship::Unspecified);
        assert_eq!(Relationship::from_label(Relationship::Grandparent.label()), Relationship::Grandparent);
    }

    #[test]
    fn test_relationship_serde_accepts_names_and_labels() {
        for relationship in [
            Relationship::Spouse,
            Relationship::Partner,
            Relationship::Child,
            Relationship::Stepchild,
            Relationship::Parent,
            Relationship::ParentInLaw,
            Relationship::Sibling,
            Relationship::Grandchild,
            Relationship::Grandparent,
            Relationship::Ward,
            Relationship::Other,
            Relationship::Unspecified,
        ] {
            let json = serde_json::to_string(&relationship).unwrap();
            let back: Relationship = serde_json::from_str(&json).unwrap();
            assert_eq!(back, relationship);
        }

        let dependent: Dependent = serde_json::from_str(
            r#"{"name": "Rita", "birth_date": "1960-05-02", "relationship": "Sogro(a)"}"#,
        )
        .unwrap();
        assert_eq!(dependent.relationship, Relationship::ParentInLaw);
        assert_eq!(serde_json::to_value(&dependent.relationship).unwrap(), "parent_in_law");
    }

    #[test]
    fn test_price_with_snapshots_holder_and_dependents() {
        let catalog = crate::pricing::PricingCatalog::from_parts(
            vec![PricingTable::new(1, "Familiar", "Op")],
            vec![
                PricingBracket::new(1, "0-18", 100.0).unwrap(),
                PricingBracket::new(1, "19-58", 250.0).unwrap(),
                PricingBracket::new(1, "59+", 400.0).unwrap(),
            ],
        )
        .unwrap();

        let mut draft = ProposalDraft::new(ClientIdentity {
            name: "Maria Souza".into(),
            cpf: "111.444.777-35".into(),
            birth_date: NaiveDate::from_ymd_opt(1985, 4, 12).unwrap(),
            email: "maria@exemplo.com".into(),
            phone: None,
        });
        draft.dependents.push(Dependent {
            name: "João Souza".into(),
            cpf: None,
            birth_date: NaiveDate::from_ymd_opt(2016, 8, 1).unwrap(),
            relationship: Relationship::Child,
            price: None,
        });

        let on = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        draft.price_with(&catalog, 1, on).unwrap();

        assert_eq!(draft.price.as_ref().unwrap().faixa, "19-58");
        assert_eq!(draft.dependents[0].price.as_ref().unwrap().faixa, "0-18");
        assert_relative_eq!(draft.dependents[0].price.as_ref().unwrap().value, 100.0);
    }

    #[test]
    fn test_price_with_leaves_draft_untouched_on_failure() {
        let catalog = crate::pricing::PricingCatalog::from_parts(
            vec![PricingTable::new(1, "Adultos", "Op")],
            vec![PricingBracket::new(1, "18+", 300.0).unwrap()],
        )
        .unwrap();

        let mut draft = ProposalDraft::new(ClientIdentity {
            name: "Carlos".into(),
            cpf: "11144477735".into(),
            birth_date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            email: "carlos@exemplo.com".into(),
            phone: None,
        });
        draft.dependents.push(Dependent {
            name: "Bebê".into(),
            cpf: None,
            birth_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            relationship: Relationship::Child,
            price: None,
        });

        let on = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert!(draft.price_with(&catalog, 1, on).is_err());
        assert!(draft.price.is_none());
    }
}
