use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::models::{Notification, NotificationKind, NotificationUser, NotificationUserInput};
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;
use crate::repo::{exists, users};

fn from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(6)?;
    let kind = NotificationKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown notification kind {kind:?}").into(),
        )
    })?;
    Ok(Notification {
        id: row.get(0)?,
        sender: row.get(1)?,
        receiver: row.get(2)?,
        content: row.get(3)?,
        comment: row.get(4)?,
        message: row.get(5)?,
        kind,
        date: row.get(7)?,
    })
}

/// The content still exists, and for a tag so does the comment carrying it.
fn content_exists(conn: &Connection, new: &NewNotification) -> AppResult<bool> {
    match (new.kind, &new.comment) {
        (NotificationKind::Event, _) => {
            exists(conn, "SELECT COUNT(*) > 0 FROM events WHERE id = ?1", &[&new.content])
        }
        (NotificationKind::Tag, Some(comment)) => exists(
            conn,
            "SELECT COUNT(*) > 0 FROM comments WHERE id = ?1 AND post_id = ?2",
            &[comment, &new.content],
        ),
        (NotificationKind::Post | NotificationKind::Tag, _) => {
            exists(conn, "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1", &[&new.content])
        }
    }
}

/// A notification that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub sender: ObjectId,
    pub content: ObjectId,
    pub comment: Option<ObjectId>,
    pub message: String,
    pub kind: NotificationKind,
    pub date: DateTime<Utc>,
}

fn insert_row(conn: &Connection, receiver: &ObjectId, new: &NewNotification) -> AppResult<()> {
    conn.execute(
        "INSERT INTO notifications (id, sender, receiver, content, comment_id, message, kind, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            ObjectId::generate(),
            new.sender,
            receiver,
            new.content,
            new.comment,
            new.message,
            new.kind.as_str(),
            new.date,
        ],
    )?;
    Ok(())
}

/// Store one notification per user. Returns the number stored, which is
/// zero when the content has been deleted in the meantime.
pub fn insert_for_all_users(conn: &Connection, new: &NewNotification) -> AppResult<usize> {
    if !content_exists(conn, new)? {
        return Ok(0);
    }
    let receivers = crate::repo::id_list(
        conn,
        "SELECT id FROM users WHERE id <> ?1 ORDER BY rowid",
        &new.sender,
    )?;
    for receiver in &receivers {
        insert_row(conn, receiver, new)?;
    }
    Ok(receivers.len())
}

/// Store a notification for a single user; false when either the receiver
/// or the content is gone.
pub fn insert_for_user(
    conn: &Connection,
    receiver: &ObjectId,
    new: &NewNotification,
) -> AppResult<bool> {
    if !content_exists(conn, new)? || users::find(conn, receiver)?.is_none() {
        return Ok(false);
    }
    insert_row(conn, receiver, new)?;
    Ok(true)
}

/// Notifications received by `user`, newest first.
pub fn list_for_user(conn: &Connection, user: &ObjectId) -> AppResult<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender, receiver, content, comment_id, message, kind, date
         FROM notifications WHERE receiver = ?1 ORDER BY date DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([user], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, user: &ObjectId, id: &ObjectId) -> AppResult<()> {
    let removed = conn.execute(
        "DELETE FROM notifications WHERE id = ?1 AND receiver = ?2",
        params![id, user],
    )?;
    if removed == 0 {
        return Err(AppError::not_found("Notification"));
    }
    Ok(())
}

pub(crate) fn delete_for_content(conn: &Connection, content: &ObjectId) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM notifications WHERE content = ?1", [content])?;
    Ok(removed)
}

pub(crate) fn delete_for_comment(conn: &Connection, comment: &ObjectId) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM notifications WHERE comment_id = ?1", [comment])?;
    Ok(removed)
}

/// Everything the user sent or received.
pub(crate) fn delete_for_user(conn: &Connection, user: &ObjectId) -> AppResult<usize> {
    let removed = conn.execute(
        "DELETE FROM notifications WHERE receiver = ?1 OR sender = ?1",
        [user],
    )?;
    Ok(removed)
}

// -- Device registrations --

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationUser> {
    Ok(NotificationUser {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token: row.get(2)?,
        os: row.get(3)?,
    })
}

/// Register a push device. Registering the same token again only updates
/// its OS.
pub fn register_device(conn: &Connection, input: &NotificationUserInput) -> AppResult<NotificationUser> {
    if input.token.is_empty() {
        return Err(AppError::BadRequest("Device token is required".into()));
    }
    users::ensure_exists(conn, &input.user_id)?;

    conn.execute(
        "INSERT INTO notification_users (id, user_id, token, os) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, token) DO UPDATE SET os = excluded.os",
        params![ObjectId::generate(), input.user_id, input.token, input.os],
    )?;
    let device = conn.query_row(
        "SELECT id, user_id, token, os FROM notification_users WHERE user_id = ?1 AND token = ?2",
        params![input.user_id, input.token],
        device_from_row,
    )?;
    Ok(device)
}

/// Devices of every user, or of one user when `user` is given.
pub fn devices(conn: &Connection, user: Option<&ObjectId>) -> AppResult<Vec<NotificationUser>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, token, os FROM notification_users
         WHERE ?1 IS NULL OR user_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([user], device_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn delete_devices_for_user(conn: &Connection, user: &ObjectId) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM notification_users WHERE user_id = ?1", [user])?;
    Ok(removed)
}
