//! SMTP delivery of the rendered report.
//!
//! One message per run: HTML body plus the CSV attachment, submitted over
//! STARTTLS with username/password credentials. Delivery failure is the
//! caller's problem to log, not to crash on — the run is over either way.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::{EmailConfig, SmtpConfig};
use crate::error::{Error, Result};
use crate::report::{CSV_ATTACHMENT_NAME, Report};

/// Assembles the outbound message: HTML body + CSV attachment.
pub fn build_message(smtp: &SmtpConfig, email: &EmailConfig, report: &Report) -> Result<Message> {
    let from: Mailbox = smtp
        .username
        .parse()
        .map_err(|e| Error::Mail(format!("bad sender address '{}': {}", smtp.username, e)))?;

    let mut builder = Message::builder().from(from).subject(email.subject.clone());
    for recipient in &email.to {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| Error::Mail(format!("bad recipient '{}': {}", recipient, e)))?;
        builder = builder.to(to);
    }

    let csv_type =
        ContentType::parse("text/csv").map_err(|e| Error::Mail(format!("content type: {}", e)))?;

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::html(report.html.clone()))
                .singlepart(
                    Attachment::new(CSV_ATTACHMENT_NAME.to_string())
                        .body(report.csv.clone(), csv_type),
                ),
        )
        .map_err(|e| Error::Mail(format!("message assembly: {}", e)))
}

/// Delivers the report over an authenticated STARTTLS session.
pub fn send_report(smtp: &SmtpConfig, email: &EmailConfig, report: &Report) -> Result<()> {
    let message = build_message(smtp, email, report)?;

    let mailer = SmtpTransport::starttls_relay(&smtp.host)
        .map_err(|e| Error::Mail(format!("SMTP setup for {}: {}", smtp.host, e)))?
        .port(smtp.port)
        .credentials(Credentials::new(
            smtp.username.clone(),
            smtp.password.clone(),
        ))
        .build();

    mailer
        .send(&message)
        .map_err(|e| Error::Mail(format!("SMTP delivery: {}", e)))?;

    info!("report sent to {} recipient(s)", email.to.len());
    Ok(())
}
