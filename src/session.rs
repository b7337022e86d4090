//! Operator sessions and resource permissions
//!
//! A session is loaded explicitly (login writes it, logout clears it) and
//! passed into the operations that need it.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProposalError, StoreError};

/// Default location of the CLI session file
pub const DEFAULT_SESSION_PATH: &str = ".portal_session.json";

/// Operator role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Back-office staff: catalog edits and proposal review
    Admin,
    /// Submits and follows its own proposals
    Broker,
    /// Read-only access
    Viewer,
}

/// Resource kinds guarded by permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Proposals,
    PricingTables,
    Dependents,
    Questionnaire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    /// Review decisions: validate, reject, reopen, delete
    Administer,
}

impl Role {
    /// Permission matrix
    pub fn allows(self, resource: Resource, action: Action) -> bool {
        match (self, resource, action) {
            (Role::Admin, _, _) => true,

            (Role::Broker, _, Action::Read) => true,
            (Role::Broker, Resource::Proposals, Action::Write) => true,
            (Role::Broker, Resource::Dependents, Action::Write) => true,
            (Role::Broker, Resource::Questionnaire, Action::Write) => true,
            (Role::Broker, Resource::PricingTables, Action::Write) => false,
            (Role::Broker, _, Action::Administer) => false,

            (Role::Viewer, _, Action::Read) => true,
            (Role::Viewer, _, Action::Write | Action::Administer) => false,
        }
    }
}

/// An authenticated operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub role: Role,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
            started_at: Utc::now(),
        }
    }

    /// Fail with `Unauthorized` unless the role allows `action` on `resource`
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), ProposalError> {
        if self.role.allows(resource, action) {
            Ok(())
        } else {
            Err(ProposalError::Unauthorized(format!(
                "{:?} {:?} as {} ({:?})",
                action, resource, self.user, self.role
            )))
        }
    }
}

/// Source of the current session
pub trait SessionProvider {
    fn session(&self) -> Option<Session>;
}

/// Check there is a session and that it allows the action
pub fn require_session(
    provider: &dyn SessionProvider,
    resource: Resource,
    action: Action,
) -> Result<Session, ProposalError> {
    let session = provider
        .session()
        .ok_or_else(|| ProposalError::Unauthorized(format!("{:?} {:?} without a session", action, resource)))?;
    session.require(resource, action)?;
    Ok(session)
}

/// Session persisted in a JSON file
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<Option<Session>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Login
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    /// Logout; clearing an absent session is fine
    pub fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl SessionProvider for SessionFile {
    fn session(&self) -> Option<Session> {
        match self.load() {
            Ok(session) => session,
            Err(e) => {
                warn!("ignoring unreadable session file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl SessionProvider for Option<Session> {
    fn session(&self) -> Option<Session> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_matrix() {
        assert!(Role::Admin.allows(Resource::PricingTables, Action::Write));
        assert!(Role::Admin.allows(Resource::Proposals, Action::Administer));

        assert!(Role::Broker.allows(Resource::Proposals, Action::Write));
        assert!(Role::Broker.allows(Resource::PricingTables, Action::Read));
        assert!(!Role::Broker.allows(Resource::PricingTables, Action::Write));
        assert!(!Role::Broker.allows(Resource::Proposals, Action::Administer));

        assert!(Role::Viewer.allows(Resource::Questionnaire, Action::Read));
        assert!(!Role::Viewer.allows(Resource::Dependents, Action::Write));
    }

    #[test]
    fn test_require_session() {
        let none: Option<Session> = None;
        assert!(matches!(
            require_session(&none, Resource::Proposals, Action::Read),
            Err(ProposalError::Unauthorized(_))
        ));

        let broker = Some(Session::new("corretor@exemplo.com", Role::Broker));
        assert!(require_session(&broker, Resource::Proposals, Action::Write).is_ok());
        assert!(matches!(
            require_session(&broker, Resource::Proposals, Action::Administer),
            Err(ProposalError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_session_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));

        assert!(file.session().is_none());

        let session = Session::new("admin@exemplo.com", Role::Admin);
        file.save(&session).unwrap();
        assert_eq!(file.session(), Some(session));

        file.clear().unwrap();
        assert!(file.session().is_none());
        file.clear().unwrap();
    }

    #[test]
    fn test_corrupt_session_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert!(SessionFile::new(&path).session().is_none());
    }
}
