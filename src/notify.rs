//! Proposal notifications

use log::info;

/// Email sender contract
///
/// Anything other than `true` is a failed delivery.
pub trait Mailer {
    fn send(&self, to: &str, recipient_name: &str, proposal_id: u64) -> bool;
}

/// Mailer that only logs the notice; used where no provider is configured
#[derive(Debug, Clone)]
pub struct LogMailer {
    pub sender: String,
}

impl LogMailer {
    pub fn new(sender: impl Into<String>) -> Self {
        Self { sender: sender.into() }
    }
}

impl Default for LogMailer {
    fn default() -> Self {
        Self::new(DEFAULT_SENDER)
    }
}

/// Sender address used when none is configured
pub const DEFAULT_SENDER: &str = "propostas@portal.local";

impl Mailer for LogMailer {
    fn send(&self, to: &str, recipient_name: &str, proposal_id: u64) -> bool {
        if to.trim().is_empty() {
            return false;
        }
        info!(
            "mail {} -> {} <{}>: proposta #{} recebida",
            self.sender, recipient_name, to, proposal_id
        );
        true
    }
}
