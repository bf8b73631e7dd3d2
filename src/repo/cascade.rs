//! Deletion of top-level entities together with everything that points at
//! them. Each cascade is one transaction: either every dependent is gone
//! and the entity with it, or nothing changed.

use rusqlite::Connection;

use crate::db;
use crate::error::AppResult;
use crate::ids::ObjectId;
use crate::repo::{association_users, associations, credentials, events, notifications, posts, users};
use crate::state::DbPool;

/// Returns the ids of the login accounts removed with the association.
pub fn delete_association(pool: &DbPool, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    run(pool, "association", id, association)
}

pub fn delete_event(pool: &DbPool, id: &ObjectId) -> AppResult<()> {
    run(pool, "event", id, event)
}

pub fn delete_post(pool: &DbPool, id: &ObjectId) -> AppResult<()> {
    run(pool, "post", id, post)
}

pub fn delete_user(pool: &DbPool, id: &ObjectId) -> AppResult<()> {
    run(pool, "user", id, user)
}

fn run<T>(
    pool: &DbPool,
    what: &'static str,
    id: &ObjectId,
    cascade: fn(&Connection, &ObjectId) -> AppResult<T>,
) -> AppResult<T> {
    match db::transaction(pool, |conn| cascade(conn, id)) {
        Ok(done) => {
            tracing::info!(id = %id, "Deleted {} and its dependents", what);
            Ok(done)
        }
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Failed to delete {}", what);
            Err(e)
        }
    }
}

/// Owned events, owned posts, login accounts, then the association.
pub(crate) fn association(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    let found = associations::get(conn, id)?;
    for event_id in &found.events {
        event(conn, event_id)?;
    }
    for post_id in &found.posts {
        post(conn, post_id)?;
    }
    let accounts = association_users::delete_for_association(conn, id)?;
    associations::remove(conn, id)?;
    Ok(accounts)
}

pub(crate) fn event(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    let found = events::get(conn, id)?;
    notifications::delete_for_content(conn, id)?;
    associations::remove_event(conn, &found.association, id)?;
    for user in &found.participants {
        events::unlink_participant(conn, id, user)?;
    }
    events::remove(conn, id)
}

pub(crate) fn post(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    let found = posts::get(conn, id)?;
    notifications::delete_for_content(conn, id)?;
    associations::remove_post(conn, &found.association, id)?;
    for user in &found.likes {
        posts::unlink_like(conn, id, user)?;
    }
    // Comments and their tags go with the post row
    posts::remove(conn, id)
}

pub(crate) fn user(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    let found = users::get(conn, id)?;
    credentials::delete_for_user(conn, id)?;
    notifications::delete_for_user(conn, id)?;
    notifications::delete_devices_for_user(conn, id)?;
    posts::delete_tags_for_user(conn, id)?;
    posts::delete_comments_for_user(conn, id)?;
    for event_id in &found.events {
        events::unlink_participant(conn, event_id, id)?;
    }
    for post_id in &found.posts_liked {
        posts::unlink_like(conn, post_id, id)?;
    }
    users::remove(conn, id)
}
