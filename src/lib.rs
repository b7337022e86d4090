//! Plan Proposals - pricing and proposal core for a health-plan broker portal
//!
//! This library provides:
//! - Age-bracket ("faixa etária") pricing tables and premium resolution
//! - Census quoting and catalog reports
//! - Proposal submission, review and cancellation over a pluggable store
//! - CPF validation and formatting

pub mod config;
pub mod cpf;
pub mod error;
pub mod notify;
pub mod pricing;
pub mod proposal;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::PortalConfig;
pub use error::{PricingError, ProposalError, StoreError};
pub use pricing::{PricingBracket, PricingCatalog, PricingTable};
pub use proposal::{Proposal, ProposalDraft, ProposalService, ProposalStatus};
pub use store::{MemoryStore, Store};
