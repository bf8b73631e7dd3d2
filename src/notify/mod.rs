//! Notifications fanned out after events, posts and comment tags are
//! created. Dispatch runs on a detached task: the request that triggered it
//! never waits, and failures are only logged.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::db;
use crate::db::models::{Association, Comment, Event, NotificationKind, NotificationUser, Post, User};
use crate::error::AppResult;
use crate::ids::ObjectId;
use crate::repo::notifications::{self, NewNotification};
use crate::state::DbPool;

/// Delivers a push message to devices. Real transports live outside this
/// crate; the default one just logs.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, devices: &[NotificationUser], message: &str) -> anyhow::Result<()>;
}

pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn push(&self, devices: &[NotificationUser], message: &str) -> anyhow::Result<()> {
        tracing::info!(devices = devices.len(), "Push: {}", message);
        Ok(())
    }
}

/// Where a broadcast goes: every user, or one tagged user.
#[derive(Debug, Clone)]
enum Audience {
    Everyone,
    User(ObjectId),
}

#[derive(Clone)]
pub struct Notifier {
    db: DbPool,
    transport: Arc<dyn PushTransport>,
    enabled: bool,
}

impl Notifier {
    pub fn new(db: DbPool, transport: Arc<dyn PushTransport>, enabled: bool) -> Self {
        Self {
            db,
            transport,
            enabled,
        }
    }

    pub fn notify_event(&self, association: &Association, event: &Event) {
        let message = event_message(&association.name, &event.name);
        self.spawn(
            Audience::Everyone,
            NewNotification {
                sender: association.id.clone(),
                content: event.id.clone(),
                comment: None,
                message,
                kind: NotificationKind::Event,
                date: Utc::now(),
            },
        );
    }

    pub fn notify_post(&self, association: &Association, post: &Post) {
        let message = post_message(&association.name);
        self.spawn(
            Audience::Everyone,
            NewNotification {
                sender: association.id.clone(),
                content: post.id.clone(),
                comment: None,
                message,
                kind: NotificationKind::Post,
                date: Utc::now(),
            },
        );
    }

    /// One notification per tagged user of `comment`.
    pub fn notify_tags(&self, author: &User, post: &Post, comment: &Comment) {
        for tag in &comment.tags {
            let message = tag_message(&author.username, &post.title);
            self.spawn(
                Audience::User(tag.user.clone()),
                NewNotification {
                    sender: author.id.clone(),
                    content: post.id.clone(),
                    comment: Some(comment.id.clone()),
                    message,
                    kind: NotificationKind::Tag,
                    date: Utc::now(),
                },
            );
        }
    }

    fn spawn(&self, audience: Audience, notification: NewNotification) {
        if !self.enabled {
            tracing::debug!(content = %notification.content, "Notifications disabled, skipping");
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.dispatch(&audience, &notification).await {
                tracing::warn!(
                    content = %notification.content,
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        });
    }

    /// Store the notifications, then push to the registered devices.
    async fn dispatch(&self, audience: &Audience, notification: &NewNotification) -> anyhow::Result<()> {
        let db = self.db.clone();
        let (audience, notification) = (audience.clone(), notification.clone());
        let message = notification.message.clone();

        let devices = tokio::task::spawn_blocking(move || store(&db, &audience, &notification))
            .await??;

        if !devices.is_empty() {
            self.transport.push(&devices, &message).await?;
        }
        Ok(())
    }
}

fn event_message(association: &str, event: &str) -> String {
    format!("@{} t'invite à {} 📅", association.to_lowercase(), event)
}

fn post_message(association: &str) -> String {
    format!("@{} a posté une nouvelle news 📰", association)
}

fn tag_message(username: &str, title: &str) -> String {
    format!("@{} t'a taggé sur \"{}\"", username, title)
}

fn store(
    pool: &DbPool,
    audience: &Audience,
    notification: &NewNotification,
) -> AppResult<Vec<NotificationUser>> {
    db::transaction(pool, |conn| match audience {
        Audience::Everyone => {
            let stored = notifications::insert_for_all_users(conn, notification)?;
            if stored == 0 {
                return Ok(Vec::new());
            }
            let devices = notifications::devices(conn, None)?;
            Ok(devices
                .into_iter()
                .filter(|d| d.user_id != notification.sender)
                .collect())
        }
        Audience::User(user) => {
            if !notifications::insert_for_user(conn, user, notification)? {
                return Ok(Vec::new());
            }
            notifications::devices(conn, Some(user))
        }
    })
}
