//! SMTP delivery via lettre.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{Mailer, Template};
use crate::config::SmtpConfig;

/// Real SMTP mailer. Each send happens on its own thread so the request
/// path never waits on the relay; failures are logged and dropped.
pub struct SmtpMailer {
    config: SmtpConfig,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid from address: {}", e))?;
        Ok(Self { config, from })
    }

    fn deliver(config: &SmtpConfig, from: Mailbox, to: &str, template: Template, param: &str) {
        let to: Mailbox = match to.parse() {
            Ok(mb) => mb,
            Err(e) => {
                tracing::warn!("undeliverable recipient {}: {}", to, e);
                return;
            }
        };

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(template.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(template.body(param));
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("failed to build email: {}", e);
                return;
            }
        };

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = match SmtpTransport::relay(&config.host) {
            Ok(builder) => builder.credentials(creds).port(config.port).build(),
            Err(e) => {
                tracing::error!("smtp relay setup failed: {}", e);
                return;
            }
        };

        match transport.send(&message) {
            Ok(_) => tracing::info!("email sent: {:?}", template),
            Err(e) => tracing::error!("email send failed: {}", e),
        }
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, template: Template, param: &str) {
        if self.config.mock {
            tracing::info!(
                "mock email: to={} subject={:?} param={}",
                to,
                template.subject(),
                param
            );
            return;
        }

        let config = self.config.clone();
        let from = self.from.clone();
        let to = to.to_string();
        let param = param.to_string();
        std::thread::spawn(move || {
            Self::deliver(&config, from, &to, template, &param);
        });
    }
}
