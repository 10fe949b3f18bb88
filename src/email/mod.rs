//! Outbound notification port.
//!
//! The pipeline only ever asks for "send this template to this address";
//! delivery is fire-and-forget and failures are logged, never surfaced.

pub mod smtp;

use std::sync::Mutex;

/// The account-lifecycle notifications the pipeline can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    ConfirmAccount,
    RecoverAccount,
    NewRecoveryToken,
    ChangeEmail,
    DeleteAccount,
}

impl Template {
    pub fn subject(self) -> &'static str {
        match self {
            Template::ConfirmAccount => "Confirm your Agora account",
            Template::RecoverAccount => "Recover your Agora account",
            Template::NewRecoveryToken => "New recovery token",
            Template::ChangeEmail => "Confirm your new Agora email",
            Template::DeleteAccount => "Confirm deletion of your Agora account",
        }
    }

    /// Plain-text body. `param` is a confirmation URL for the link-bearing
    /// templates and the fresh backup code for NewRecoveryToken.
    pub fn body(self, param: &str) -> String {
        match self {
            Template::ConfirmAccount => format!(
                "Confirm your new Agora account by visiting the following page:\n{param}"
            ),
            Template::RecoverAccount => format!(
                "Recover your Agora account by visiting the following page:\n{param}"
            ),
            Template::NewRecoveryToken => format!(
                "You have recently changed your email or used your former recovery token.\n\
                 Here is your new recovery token: {param}"
            ),
            Template::ChangeEmail => format!(
                "Confirm that this is your new email for your Agora account by visiting \
                 the following page:\n{param}"
            ),
            Template::DeleteAccount => format!(
                "Visit the following page to confirm the deletion of your Agora account:\n{param}"
            ),
        }
    }
}

/// Notification port. Implementations must not block the caller on delivery
/// and must not surface delivery failures.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, template: Template, param: &str);
}

/// A recorded outbound message.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub template: Template,
    pub param: String,
}

/// In-memory mailer for tests and local development: records instead of
/// delivering.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, to: &str, template: Template, param: &str) {
        tracing::info!("mail (recorded): to={} subject={:?}", to, template.subject());
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            template,
            param: param.to_string(),
        });
    }
}
