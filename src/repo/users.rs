use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{User, UserInput};
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;
use crate::repo::{contains_pattern, exists, id_list};

const COLUMNS: &str =
    "id, name, username, description, email, email_public, promotion, gender";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        description: row.get(3)?,
        email: row.get(4)?,
        email_public: row.get(5)?,
        promotion: row.get(6)?,
        gender: row.get(7)?,
        events: Vec::new(),
        posts_liked: Vec::new(),
    })
}

fn load_edges(conn: &Connection, mut user: User) -> AppResult<User> {
    user.events = event_ids(conn, &user.id)?;
    user.posts_liked = liked_post_ids(conn, &user.id)?;
    Ok(user)
}

fn collect(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|u| load_edges(conn, u)).collect()
}

pub fn event_ids(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    id_list(
        conn,
        "SELECT event_id FROM user_events WHERE user_id = ?1 ORDER BY rowid",
        id,
    )
}

pub fn liked_post_ids(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    id_list(
        conn,
        "SELECT post_id FROM user_posts_liked WHERE user_id = ?1 ORDER BY rowid",
        id,
    )
}

/// Create a user with an empty profile. Usernames are stored lower-cased and
/// compared case-insensitively.
pub fn create(conn: &Connection, username: &str) -> AppResult<User> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    if find_by_username(conn, &username)?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let id = ObjectId::generate();
    conn.execute(
        "INSERT INTO users (id, username) VALUES (?1, ?2)",
        params![id, username],
    )?;
    tracing::info!(user = %id, username = %username, "User created");
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &ObjectId) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    user.map(|u| load_edges(conn, u)).transpose()
}

pub fn get(conn: &Connection, id: &ObjectId) -> AppResult<User> {
    find(conn, id)?.ok_or_else(|| AppError::not_found("User"))
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE"),
            [username],
            from_row,
        )
        .optional()?;
    user.map(|u| load_edges(conn, u)).transpose()
}

pub fn ensure_exists(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    if exists(conn, "SELECT COUNT(*) > 0 FROM users WHERE id = ?1", &[id])? {
        Ok(())
    } else {
        Err(AppError::not_found("User"))
    }
}

pub fn list(conn: &Connection) -> AppResult<Vec<User>> {
    collect(
        conn,
        &format!("SELECT {COLUMNS} FROM users ORDER BY username"),
        [],
    )
}

/// Update the profile fields. Promotion and gender are validated against
/// their closed lists; relationship sets are never touched.
pub fn update(conn: &Connection, id: &ObjectId, input: &UserInput) -> AppResult<User> {
    input.validate()?;
    let changed = conn.execute(
        "UPDATE users SET name = ?2, description = ?3, email = ?4, email_public = ?5,
                promotion = ?6, gender = ?7
         WHERE id = ?1",
        params![
            id,
            input.name,
            input.description,
            input.email,
            input.email_public,
            input.promotion,
            input.gender,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("User"));
    }
    get(conn, id)
}

/// Case-insensitive substring match on username or display name.
pub fn search(conn: &Connection, term: &str) -> AppResult<Vec<User>> {
    collect(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM users
             WHERE username LIKE ?1 ESCAPE '\\' OR name LIKE ?1 ESCAPE '\\'
             ORDER BY username"
        ),
        [contains_pattern(term)],
    )
}

pub(crate) fn remove(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    Ok(())
}

// -- User side of the participant and like edges --

pub(crate) fn add_event(conn: &Connection, id: &ObjectId, event: &ObjectId) -> AppResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_events (user_id, event_id) VALUES (?1, ?2)",
        params![id, event],
    )?;
    Ok(())
}

pub(crate) fn remove_event(conn: &Connection, id: &ObjectId, event: &ObjectId) -> AppResult<()> {
    conn.execute(
        "DELETE FROM user_events WHERE user_id = ?1 AND event_id = ?2",
        params![id, event],
    )?;
    Ok(())
}

pub(crate) fn add_liked_post(conn: &Connection, id: &ObjectId, post: &ObjectId) -> AppResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_posts_liked (user_id, post_id) VALUES (?1, ?2)",
        params![id, post],
    )?;
    Ok(())
}

pub(crate) fn remove_liked_post(
    conn: &Connection,
    id: &ObjectId,
    post: &ObjectId,
) -> AppResult<()> {
    conn.execute(
        "DELETE FROM user_posts_liked WHERE user_id = ?1 AND post_id = ?2",
        params![id, post],
    )?;
    Ok(())
}
