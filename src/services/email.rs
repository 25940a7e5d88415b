//! Email service for verification links, password resets and notifications

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::waitlist::AvailabilityNotice,
};

/// A plain-text message ready to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivery backend for outgoing email
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, email: &OutgoingEmail) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Puthi Pallab");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let mut builder = Message::builder()
            .from(from_mailbox.clone())
            .subject(email.subject.as_str());

        // Several recipients never see each other's addresses
        match email.to.as_slice() {
            [] => return Err(AppError::Internal("Email has no recipient".to_string())),
            [single] => {
                let to = Mailbox::from_str(single)
                    .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;
                builder = builder.to(to);
            }
            many => {
                builder = builder.to(from_mailbox);
                for address in many {
                    let bcc = Mailbox::from_str(address)
                        .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;
                    builder = builder.bcc(bcc);
                }
            }
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><p>{}</p></body></html>"#,
                                email.body.replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        let message = self.build_message(&email)?;
        let transport = self.transport()?;

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        tracing::debug!(subject = %email.subject, recipients = email.to.len(), "Email sent");
        Ok(())
    }
}

/// Composes library emails and hands them to the configured [`Mailer`]
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    contact_inbox: String,
    token_ttl_minutes: i64,
}

impl EmailService {
    /// `token_ttl_minutes` is only quoted in subjects; expiry is enforced by the store
    pub fn new(mailer: Arc<dyn Mailer>, config: &EmailConfig, token_ttl_minutes: i64) -> Self {
        Self {
            mailer,
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            contact_inbox: config.contact_inbox.clone(),
            token_ttl_minutes,
        }
    }

    pub fn verification_email(&self, to: &str, token: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: vec![to.to_string()],
            subject: format!(
                "Your email verification token (valid for {} min)",
                self.token_ttl_minutes
            ),
            body: format!(
                "Welcome to Puthi Pallab! Please verify your email address by opening the link below.\n{}/verify-email/{}",
                self.frontend_url, token
            ),
        }
    }

    pub fn password_reset_email(&self, to: &str, token: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: vec![to.to_string()],
            subject: format!(
                "Your password reset token (valid for {} min)",
                self.token_ttl_minutes
            ),
            body: format!(
                "Forgot your password? Set a new one here:\n{}/reset-password/{}\nIf you didn't forget your password, please ignore this email!",
                self.frontend_url, token
            ),
        }
    }

    pub fn availability_email(&self, notice: &AvailabilityNotice) -> OutgoingEmail {
        OutgoingEmail {
            to: notice.recipients.clone(),
            subject: format!("The book {} - is now available", notice.book_title),
            body: format!(
                "The book \"{}\", you were waiting for is now available. Visit the library as soon as possible to borrow it.",
                notice.book_title
            ),
        }
    }

    pub fn contact_email(&self, message: &ContactMessage) -> OutgoingEmail {
        OutgoingEmail {
            to: vec![self.contact_inbox.clone()],
            subject: "New Message from Puthi Pallab Library".to_string(),
            body: format!(
                "Name: {}\nEmail: {}\nSubject: {}\nMessage: {}",
                message.name, message.email, message.subject, message.message
            ),
        }
    }

    pub async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        self.mailer.send(email).await
    }
}

/// A visitor message from the public contact form
#[derive(Debug, Clone, serde::Deserialize, validator::Validate, utoipa::ToSchema)]
pub struct ContactMessage {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

impl EmailService {
    /// Relay a contact form message to the library inbox
    pub async fn send_contact_message(&self, message: &ContactMessage) -> AppResult<()> {
        self.send(self.contact_email(message)).await.map_err(|e| {
            tracing::error!("Failed to relay contact message: {}", e);
            AppError::Internal("Something went wrong, please try again later".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            frontend_url: "https://library.example/".to_string(),
            contact_inbox: "desk@library.example".to_string(),
            ..EmailConfig::default()
        }
    }

    #[test]
    fn test_links_use_frontend_url() {
        let service = EmailService::new(Arc::new(MockMailer::new()), &config(), 10);

        let email = service.verification_email("a@example.com", "abc123");
        assert_eq!(email.to, vec!["a@example.com".to_string()]);
        assert!(email.body.contains("https://library.example/verify-email/abc123"));

        let email = service.password_reset_email("a@example.com", "def456");
        assert!(email.body.contains("https://library.example/reset-password/def456"));
    }

    #[test]
    fn test_subjects_quote_configured_token_lifetime() {
        let service = EmailService::new(Arc::new(MockMailer::new()), &config(), 30);

        let email = service.verification_email("a@example.com", "abc123");
        assert!(email.subject.contains("valid for 30 min"));

        let email = service.password_reset_email("a@example.com", "def456");
        assert!(email.subject.contains("valid for 30 min"));
    }

    #[test]
    fn test_availability_email_names_book_and_all_recipients() {
        let service = EmailService::new(Arc::new(MockMailer::new()), &config(), 10);
        let notice = AvailabilityNotice {
            book_title: "Debdas".to_string(),
            recipients: vec!["x@example.com".to_string(), "y@example.com".to_string()],
        };

        let email = service.availability_email(&notice);
        assert_eq!(email.to.len(), 2);
        assert!(email.subject.contains("Debdas"));
    }

    #[tokio::test]
    async fn test_contact_message_goes_to_inbox() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| email.to == vec!["desk@library.example".to_string()])
            .times(1)
            .returning(|_| Ok(()));
        let service = EmailService::new(Arc::new(mailer), &config(), 10);

        let message = ContactMessage {
            name: "Parves".to_string(),
            email: "parves@example.com".to_string(),
            subject: "Opening hours".to_string(),
            message: "Are you open on Friday?".to_string(),
        };
        assert!(service.send_contact_message(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_contact_failure_is_generic() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(AppError::Internal("smtp down: 10.0.0.5".to_string())));
        let service = EmailService::new(Arc::new(mailer), &config(), 10);

        let message = ContactMessage {
            name: "Parves".to_string(),
            email: "parves@example.com".to_string(),
            subject: "Hi".to_string(),
            message: "Hello".to_string(),
        };
        match service.send_contact_message(&message).await {
            Err(AppError::Internal(msg)) => assert!(!msg.contains("10.0.0.5")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_smtp_message_hides_recipients_from_each_other() {
        let mailer = SmtpMailer::new(config());
        let email = OutgoingEmail {
            to: vec!["x@example.com".to_string(), "y@example.com".to_string()],
            subject: "Back in stock".to_string(),
            body: "Come get it".to_string(),
        };
        let formatted = String::from_utf8(mailer.build_message(&email).unwrap().formatted()).unwrap();
        assert!(!formatted.contains("To: x@example.com"));
        assert!(mailer
            .build_message(&OutgoingEmail { to: vec![], ..email })
            .is_err());
    }
}
