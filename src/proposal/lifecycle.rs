//! Proposal lifecycle: submission, review decisions and cancellation
//!
//! Statuses move from `pending` to one terminal status. Administrators can
//! re-open a terminal proposal. Every store call goes through the retry
//! policy; no operation spans a transaction, so a multi-step failure is
//! reported and never taken as success.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::data::{ClientIdentity, Dependent, PriceSnapshot, Proposal, ProposalDraft, ProposalStatus};
use super::questionnaire::{validate_answers, HealthAnswer};
use crate::config::PortalConfig;
use crate::cpf::{strip_cpf, validate_cpf};
use crate::error::{ProposalError, StoreError};
use crate::notify::Mailer;
use crate::session::{Action, Resource, Session};
use crate::store::{from_row, to_row, Filter, Order, RetryPolicy, Row, Store};

pub const PROPOSALS: &str = "proposals";
pub const DEPENDENTS: &str = "dependents";
pub const HEALTH_ANSWERS: &str = "health_answers";

/// Columns added by the cancellation migration
pub const CANCELLATION_COLUMNS: [&str; 2] = ["cancellation_reason", "cancelled_at"];

/// Column older schemas use to hold a cancellation reason
pub const LEGACY_REASON_COLUMN: &str = "rejection_reason";

/// Which proposals layout a cancellation was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationSchema {
    /// Dedicated `cancellation_reason` and `cancelled_at` columns
    Primary,
    /// Reason stored in `rejection_reason`, no timestamp column
    Legacy,
}

/// Result of a cancel request
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled {
        schema: CancellationSchema,
        reason: String,
    },
    /// Nothing was written
    AlreadyCancelled,
}

/// Result of a submission
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub proposal: Proposal,
    /// Whether the confirmation email went out
    pub notified: bool,
}

/// Stored layout of a proposal row
#[derive(Debug, Serialize, Deserialize)]
struct ProposalRow {
    id: u64,
    name: String,
    cpf: String,
    birth_date: NaiveDate,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    table_id: u64,
    faixa: String,
    premium: f64,
    status: ProposalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProposalRow {
    /// Cancelled under the legacy layout, reason held in `rejection_reason`
    fn is_legacy_cancellation(&self) -> bool {
        self.status == ProposalStatus::Cancelled
            && self.cancellation_reason.is_none()
            && self.rejection_reason.is_some()
    }

    fn into_proposal(self, dependents: Vec<Dependent>, health_answers: Vec<HealthAnswer>) -> Proposal {
        // Legacy layout keeps the cancellation reason in rejection_reason
        let (cancellation_reason, rejection_reason) = match (self.status, self.cancellation_reason) {
            (ProposalStatus::Cancelled, None) => (self.rejection_reason, None),
            (_, reason) => (reason, self.rejection_reason),
        };

        Proposal {
            id: self.id,
            client: ClientIdentity {
                name: self.name,
                cpf: self.cpf,
                birth_date: self.birth_date,
                email: self.email,
                phone: self.phone,
            },
            price: PriceSnapshot {
                table_id: self.table_id,
                faixa: self.faixa,
                value: self.premium,
            },
            status: self.status,
            cancellation_reason,
            rejection_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            cancelled_at: self.cancelled_at,
            dependents,
            health_answers,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DependentRow {
    proposal_id: u64,
    #[serde(flatten)]
    dependent: Dependent,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerRow {
    proposal_id: u64,
    #[serde(flatten)]
    answer: HealthAnswer,
}

fn timestamp(at: DateTime<Utc>) -> Result<Value, ProposalError> {
    Ok(serde_json::to_value(at).map_err(StoreError::from)?)
}

fn patch<const N: usize>(entries: [(&str, Value); N]) -> Row {
    entries
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

fn by_id(id: u64) -> Filter {
    Filter::new().eq("id", id)
}

fn by_proposal(id: u64) -> Filter {
    Filter::new().eq("proposal_id", id)
}

/// Reject drafts with missing identity fields, a bad CPF or unpriced lives
pub fn validate_draft(draft: &ProposalDraft, today: NaiveDate) -> Result<(), ProposalError> {
    let invalid = |reason: String| Err(ProposalError::Validation(reason));
    let client = &draft.client;

    if client.name.trim().is_empty() {
        return invalid("client name is required".to_string());
    }
    if !validate_cpf(&client.cpf) {
        return invalid(format!("CPF {:?} is invalid", client.cpf));
    }
    let email = client.email.trim();
    if email.is_empty() || !email.contains('@') || email.contains(char::is_whitespace) {
        return invalid(format!("email {:?} is invalid", client.email));
    }
    if client.birth_date > today {
        return invalid(format!("birth date {} is in the future", client.birth_date));
    }

    let Some(price) = &draft.price else {
        return invalid("no resolved price attached".to_string());
    };
    if !price.value.is_finite() || price.value < 0.0 {
        return invalid(format!("premium {} is not a valid amount", price.value));
    }

    for dependent in &draft.dependents {
        if dependent.name.trim().is_empty() {
            return invalid("dependent name is required".to_string());
        }
        if let Some(cpf) = &dependent.cpf {
            if !validate_cpf(cpf) {
                return invalid(format!("CPF {:?} of dependent {} is invalid", cpf, dependent.name));
            }
        }
        if dependent.birth_date > today {
            return invalid(format!("birth date of dependent {} is in the future", dependent.name));
        }
        match &dependent.price {
            None => return invalid(format!("dependent {} has no resolved price", dependent.name)),
            Some(p) if p.table_id != price.table_id => {
                return invalid(format!(
                    "dependent {} priced on table {} but holder on table {}",
                    dependent.name, p.table_id, price.table_id
                ))
            }
            Some(p) if !p.value.is_finite() || p.value < 0.0 => {
                return invalid(format!("premium {} of dependent {} is not a valid amount", p.value, dependent.name))
            }
            Some(_) => {}
        }
    }

    validate_answers(&draft.health_answers)
}

/// Proposal operations over a store and a mailer
pub struct ProposalService<S: Store, M: Mailer> {
    store: S,
    mailer: M,
    retry: RetryPolicy,
    default_cancel_reason: String,
}

impl<S: Store, M: Mailer> ProposalService<S, M> {
    pub fn new(store: S, mailer: M) -> Self {
        Self::with_config(store, mailer, &PortalConfig::default())
    }

    pub fn with_config(store: S, mailer: M, config: &PortalConfig) -> Self {
        Self {
            store,
            mailer,
            retry: config.retry,
            default_cancel_reason: config.default_cancel_reason.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Validate and persist a draft as a `pending` proposal, then notify the client
    pub fn submit(&mut self, draft: ProposalDraft) -> Result<SubmitReceipt, ProposalError> {
        let now = Utc::now();
        validate_draft(&draft, now.date_naive())?;

        let ProposalDraft {
            client,
            price,
            dependents,
            health_answers,
        } = draft;
        let price = price.ok_or_else(|| ProposalError::Validation("no resolved price attached".to_string()))?;

        let id = self.next_id()?;
        let row = ProposalRow {
            id,
            name: client.name.trim().to_string(),
            cpf: strip_cpf(&client.cpf),
            birth_date: client.birth_date,
            email: client.email.trim().to_string(),
            phone: client.phone,
            table_id: price.table_id,
            faixa: price.faixa,
            premium: price.value,
            status: ProposalStatus::Pending,
            cancellation_reason: None,
            cancelled_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        let row = to_row(PROPOSALS, &row)?;
        self.retry.run("insert proposal", || self.store.insert(PROPOSALS, row.clone()))?;

        if let Err(e) = self.insert_children(id, dependents, health_answers) {
            warn!("proposal {}: children not stored, removing partial record: {}", id, e);
            self.remove_records(id);
            return Err(e);
        }

        let proposal = self.get(id)?;
        info!(
            "proposal {} submitted for table {} faixa {} ({:.2}/month total)",
            id,
            proposal.price.table_id,
            proposal.price.faixa,
            proposal.total_premium()
        );

        let notified = self
            .mailer
            .send(&proposal.client.email, &proposal.client.name, proposal.id);
        if !notified {
            warn!("proposal {}: confirmation email to {} failed", id, proposal.client.email);
        }

        Ok(SubmitReceipt { proposal, notified })
    }

    fn insert_children(
        &mut self,
        id: u64,
        dependents: Vec<Dependent>,
        health_answers: Vec<HealthAnswer>,
    ) -> Result<(), ProposalError> {
        for dependent in dependents {
            let dependent = Dependent {
                cpf: dependent.cpf.as_deref().map(strip_cpf),
                ..dependent
            };
            let row = to_row(DEPENDENTS, &DependentRow { proposal_id: id, dependent })?;
            self.retry.run("insert dependent", || self.store.insert(DEPENDENTS, row.clone()))?;
        }
        for answer in health_answers {
            let row = to_row(HEALTH_ANSWERS, &AnswerRow { proposal_id: id, answer })?;
            self.retry.run("insert health answer", || self.store.insert(HEALTH_ANSWERS, row.clone()))?;
        }
        Ok(())
    }

    /// Best-effort removal of a proposal and its children
    fn remove_records(&mut self, id: u64) {
        for (table, filter) in [
            (DEPENDENTS, by_proposal(id)),
            (HEALTH_ANSWERS, by_proposal(id)),
            (PROPOSALS, by_id(id)),
        ] {
            if let Err(e) = self.retry.run("cleanup", || self.store.delete(table, &filter)) {
                warn!("proposal {}: could not clean {}: {}", id, table, e);
            }
        }
    }

    fn next_id(&self) -> Result<u64, ProposalError> {
        let rows = self
            .retry
            .run("select proposal ids", || self.store.select(PROPOSALS, &Filter::new(), Some(&Order::desc("id"))))?;
        let last = rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(last + 1)
    }

    /// Load a proposal with its dependents and health answers
    pub fn get(&self, id: u64) -> Result<Proposal, ProposalError> {
        let row = self.load_row(id)?;
        self.assemble(row)
    }

    fn load_row(&self, id: u64) -> Result<ProposalRow, ProposalError> {
        let row = self
            .retry
            .run("select proposal", || self.store.select(PROPOSALS, &by_id(id), None))?
            .into_iter()
            .next()
            .ok_or(ProposalError::NotFound(id))?;
        Ok(from_row(PROPOSALS, row)?)
    }

    /// All proposals, optionally restricted to one status, ordered by id
    pub fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>, ProposalError> {
        let filter = match status {
            Some(status) => Filter::new().eq("status", status.as_str()),
            None => Filter::new(),
        };
        let rows = self
            .retry
            .run("list proposals", || self.store.select(PROPOSALS, &filter, Some(&Order::asc("id"))))?;

        rows.into_iter()
            .map(|row| {
                let row: ProposalRow = from_row(PROPOSALS, row)?;
                self.assemble(row)
            })
            .collect()
    }

    fn assemble(&self, row: ProposalRow) -> Result<Proposal, ProposalError> {
        let id = row.id;
        let dependents = self
            .retry
            .run("select dependents", || self.store.select(DEPENDENTS, &by_proposal(id), None))?
            .into_iter()
            .map(|r| from_row::<DependentRow>(DEPENDENTS, r).map(|d| d.dependent))
            .collect::<Result<Vec<_>, _>>()?;
        let health_answers = self
            .retry
            .run("select health answers", || {
                self.store
                    .select(HEALTH_ANSWERS, &by_proposal(id), Some(&Order::asc("question")))
            })?
            .into_iter()
            .map(|r| from_row::<AnswerRow>(HEALTH_ANSWERS, r).map(|a| a.answer))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(row.into_proposal(dependents, health_answers))
    }

    /// Ask the store which cancellation layout the proposals table has
    ///
    /// None when the store cannot describe its columns.
    pub fn detect_cancellation_schema(&self) -> Result<Option<CancellationSchema>, ProposalError> {
        let columns = self.retry.run("read proposals columns", || self.store.columns(PROPOSALS))?;
        Ok(columns.map(|columns| {
            let has_all = CANCELLATION_COLUMNS
                .iter()
                .all(|needed| columns.iter().any(|c| c == needed));
            if has_all {
                CancellationSchema::Primary
            } else {
                CancellationSchema::Legacy
            }
        }))
    }

    /// Cancel a pending proposal
    ///
    /// A blank or missing reason records the default administrative reason.
    /// Cancelling an already cancelled proposal writes nothing. When the store
    /// cannot be inspected, the primary layout is tried first and only a
    /// schema-level failure leads to one legacy attempt.
    pub fn cancel(&mut self, id: u64, reason: Option<&str>) -> Result<CancelOutcome, ProposalError> {
        let current = self.get(id)?;
        match current.status {
            ProposalStatus::Pending => {}
            ProposalStatus::Cancelled => {
                info!("proposal {} already cancelled, nothing to do", id);
                return Ok(CancelOutcome::AlreadyCancelled);
            }
            other => {
                return Err(ProposalError::InvalidTransition {
                    id,
                    from: other,
                    to: ProposalStatus::Cancelled,
                })
            }
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.default_cancel_reason.as_str())
            .to_string();

        let schema = match self.detect_cancellation_schema()? {
            Some(CancellationSchema::Primary) => {
                self.cancel_primary(id, &reason)?;
                CancellationSchema::Primary
            }
            Some(CancellationSchema::Legacy) => {
                debug!("proposals table has no cancellation columns, using {}", LEGACY_REASON_COLUMN);
                self.cancel_legacy(id, &reason)?;
                CancellationSchema::Legacy
            }
            None => match self.cancel_primary(id, &reason) {
                Ok(()) => CancellationSchema::Primary,
                Err(ProposalError::SchemaCompatibility(e)) => {
                    warn!("proposal {}: primary cancellation rejected ({}), retrying with legacy layout", id, e);
                    self.cancel_legacy(id, &reason)?;
                    CancellationSchema::Legacy
                }
                Err(e) => return Err(e),
            },
        };

        info!("proposal {} cancelled ({:?} layout): {}", id, schema, reason);
        Ok(CancelOutcome::Cancelled { schema, reason })
    }

    fn cancel_primary(&mut self, id: u64, reason: &str) -> Result<(), ProposalError> {
        let now = timestamp(Utc::now())?;
        let patch = patch([
            ("status", Value::from(ProposalStatus::Cancelled.as_str())),
            ("cancellation_reason", Value::from(reason)),
            ("cancelled_at", now.clone()),
            ("updated_at", now),
        ]);
        let filter = by_id(id).eq("status", ProposalStatus::Pending.as_str());

        match self
            .retry
            .run("cancel proposal", || self.store.update(PROPOSALS, &patch, &filter))
        {
            Ok(0) => Err(self.stale(id, ProposalStatus::Cancelled)),
            Ok(_) => Ok(()),
            Err(e) if e.is_schema() => Err(ProposalError::SchemaCompatibility(e)),
            Err(e) => Err(e.into()),
        }
    }

    fn cancel_legacy(&mut self, id: u64, reason: &str) -> Result<(), ProposalError> {
        let patch = patch([
            ("status", Value::from(ProposalStatus::Cancelled.as_str())),
            (LEGACY_REASON_COLUMN, Value::from(reason)),
            ("updated_at", timestamp(Utc::now())?),
        ]);
        let filter = by_id(id).eq("status", ProposalStatus::Pending.as_str());

        let changed = self
            .retry
            .run("cancel proposal (legacy)", || self.store.update(PROPOSALS, &patch, &filter))?;
        if changed == 0 {
            return Err(self.stale(id, ProposalStatus::Cancelled));
        }
        Ok(())
    }

    /// Error for an update that matched nothing
    fn stale(&self, id: u64, to: ProposalStatus) -> ProposalError {
        match self.get(id) {
            Ok(current) => ProposalError::InvalidTransition {
                id,
                from: current.status,
                to,
            },
            Err(e) => e,
        }
    }

    /// Accept a pending proposal
    pub fn validate(&mut self, session: &Session, id: u64) -> Result<Proposal, ProposalError> {
        session.require(Resource::Proposals, Action::Administer)?;
        self.decide(id, ProposalStatus::Validated, None)
    }

    /// Refuse a pending proposal; a reason is required
    pub fn reject(&mut self, session: &Session, id: u64, reason: &str) -> Result<Proposal, ProposalError> {
        session.require(Resource::Proposals, Action::Administer)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ProposalError::Validation("a rejection reason is required".to_string()));
        }
        self.decide(id, ProposalStatus::Rejected, Some(reason))
    }

    fn decide(&mut self, id: u64, to: ProposalStatus, reason: Option<&str>) -> Result<Proposal, ProposalError> {
        let current = self.get(id)?;
        if !current.status.can_transition_to(to) {
            return Err(ProposalError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        let mut changes = patch([
            ("status", Value::from(to.as_str())),
            ("updated_at", timestamp(Utc::now())?),
        ]);
        if let Some(reason) = reason {
            changes.insert(LEGACY_REASON_COLUMN.to_string(), Value::from(reason));
        }
        let filter = by_id(id).eq("status", current.status.as_str());

        let changed = self
            .retry
            .run("update proposal status", || self.store.update(PROPOSALS, &changes, &filter))?;
        if changed == 0 {
            return Err(self.stale(id, to));
        }

        info!("proposal {} {} -> {}", id, current.status, to);
        self.get(id)
    }

    /// Administrative re-open of a terminal proposal back to `pending`
    ///
    /// The price snapshot is kept; recorded reasons stay as history, except a
    /// legacy-layout cancellation reason, which sits in `rejection_reason` and
    /// is cleared so it does not read back as a rejection.
    pub fn reopen(&mut self, session: &Session, id: u64) -> Result<Proposal, ProposalError> {
        session.require(Resource::Proposals, Action::Administer)?;

        let current = self.load_row(id)?;
        if !current.status.is_terminal() {
            return Err(ProposalError::InvalidTransition {
                id,
                from: current.status,
                to: ProposalStatus::Pending,
            });
        }

        let mut changes = patch([
            ("status", Value::from(ProposalStatus::Pending.as_str())),
            ("updated_at", timestamp(Utc::now())?),
        ]);
        if current.is_legacy_cancellation() {
            debug!("proposal {}: dropping legacy cancellation reason on reopen", id);
            changes.insert(LEGACY_REASON_COLUMN.to_string(), Value::Null);
        }
        let filter = by_id(id).eq("status", current.status.as_str());

        let changed = self
            .retry
            .run("reopen proposal", || self.store.update(PROPOSALS, &changes, &filter))?;
        if changed == 0 {
            return Err(self.stale(id, ProposalStatus::Pending));
        }

        info!("proposal {} reopened by {} (was {})", id, session.user, current.status);
        self.get(id)
    }

    /// Delete a proposal together with its dependents and health answers
    pub fn delete(&mut self, session: &Session, id: u64) -> Result<(), ProposalError> {
        session.require(Resource::Proposals, Action::Administer)?;
        self.get(id)?;

        self.retry
            .run("delete dependents", || self.store.delete(DEPENDENTS, &by_proposal(id)))?;
        self.retry
            .run("delete health answers", || self.store.delete(HEALTH_ANSWERS, &by_proposal(id)))?;
        self.retry
            .run("delete proposal", || self.store.delete(PROPOSALS, &by_id(id)))?;

        info!("proposal {} deleted by {}", id, session.user);
        Ok(())
    }
}
