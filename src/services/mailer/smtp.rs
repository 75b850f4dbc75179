use crate::services::mailer::{EmailMessage, MailError, MailResult, Mailer};
use crate::services::states::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, cfg: &SmtpConfig) -> MailResult<Self> {
        let mut builder = if cfg.use_tls {
            let tls = TlsParameters::new(host.to_owned())
                .map_err(|e| MailError::InvalidConfig(format!("TLS configuration error: {e}")))?;
            // 465 is implicit TLS, everything else negotiates STARTTLS
            if cfg.port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                    .map_err(|e| MailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                    .port(cfg.port)
                    .tls(Tls::Wrapper(tls))
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| MailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                    .port(cfg.port)
                    .tls(Tls::Required(tls))
            }
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(cfg.port)
        };
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }
        let from = format!("{} <{}>", cfg.from_name, cfg.from_address)
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidConfig(format!("invalid from address: {e}")))?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, address: &str, msg: &EmailMessage) -> MailResult<()> {
        let to = address
            .parse::<Mailbox>()
            .map_err(|e| MailError::SendFailed(format!("invalid recipient {address}: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(msg.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(msg.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(msg.html.clone()),
                    ),
            )
            .map_err(|e| MailError::Construct(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
