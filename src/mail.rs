use async_trait::async_trait;

use crate::db::models::{Comment, Post, User};
use crate::ids::ObjectId;

#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outgoing mail. Delivery is out of scope for this service; the default
/// mailer logs what it would have sent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()>;
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "Mail:\n{}", message.body);
        Ok(())
    }
}

/// How a reporter appears in moderation mail: `@username (id)` for users,
/// the bare id for anything else.
pub fn reporter_label(id: &ObjectId, user: Option<&User>) -> String {
    match user {
        Some(user) => format!("@{} ({})", user.username, user.id),
        None => format!("({})", id),
    }
}

pub fn user_report(to: &str, target: &User, reporter: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: format!("Signalement de l'utilisateur @{}", target.username),
        body: format!(
            "L'utilisateur @{} ({}) a été signalé par {}.",
            target.username, target.id, reporter
        ),
    }
}

pub fn comment_report(to: &str, post: &Post, comment: &Comment, reporter: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: format!("Signalement d'un commentaire sur \"{}\"", post.title),
        body: format!(
            "Le commentaire {} de l'utilisateur {} sur la publication {} a été signalé par {}.\n\
             Signalements: {}\n\n{}",
            comment.id,
            comment.user,
            post.id,
            reporter,
            comment.reports,
            comment.content
        ),
    }
}

/// Send without making the caller wait; failures are logged.
pub fn send_detached(mailer: std::sync::Arc<dyn Mailer>, message: MailMessage) {
    tokio::spawn(async move {
        let subject = message.subject.clone();
        if let Err(e) = mailer.send(message).await {
            tracing::warn!(subject = %subject, error = %e, "Failed to send mail");
        }
    });
}
