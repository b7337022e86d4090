//! Broker proposals: drafts, submitted records and their lifecycle

mod data;
mod lifecycle;
pub mod questionnaire;

pub use data::{ClientIdentity, Dependent, PriceSnapshot, Proposal, ProposalDraft, ProposalStatus, Relationship};
pub use lifecycle::{
    validate_draft, CancelOutcome, CancellationSchema, ProposalService, SubmitReceipt, CANCELLATION_COLUMNS,
    DEPENDENTS, HEALTH_ANSWERS, LEGACY_REASON_COLUMN, PROPOSALS,
};
pub use questionnaire::HealthAnswer;
