use anyhow::Result;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;

/// Best-effort SMTP notification of server faults to the admin list.
#[derive(Clone)]
pub struct ErrorMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    admins: Vec<Mailbox>,
}

impl ErrorMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        };
        builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from: Mailbox = config.from.parse()?;
        let admins = config
            .admins
            .iter()
            .map(|addr| addr.parse())
            .collect::<Result<Vec<Mailbox>, _>>()?;

        Ok(Self {
            transport: builder.build(),
            from,
            admins,
        })
    }

    pub async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        for admin in &self.admins {
            let message = Message::builder()
                .from(self.from.clone())
                .to(admin.clone())
                .subject(subject)
                .body(body.to_string())?;
            self.transport.send(message).await?;
        }
        Ok(())
    }
}
