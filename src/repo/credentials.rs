use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::Credentials;
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Credentials> {
    Ok(Credentials {
        id: row.get(0)?,
        username: row.get(1)?,
        auth_token: row.get(2)?,
        user: row.get(3)?,
        device: row.get(4)?,
    })
}

/// Store a fresh credentials record for `user`, dropping whatever record the
/// username had before. At most one record exists per username.
pub fn replace(
    conn: &Connection,
    username: &str,
    user: &ObjectId,
    device: &str,
) -> AppResult<Credentials> {
    let username = username.trim().to_lowercase();
    conn.execute(
        "DELETE FROM credentials WHERE username = ?1 COLLATE NOCASE",
        [&username],
    )?;

    let credentials = Credentials {
        id: ObjectId::generate(),
        username,
        auth_token: uuid::Uuid::new_v4().to_string(),
        user: user.clone(),
        device: device.to_string(),
    };
    conn.execute(
        "INSERT INTO credentials (id, username, auth_token, user_id, device)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            credentials.id,
            credentials.username,
            credentials.auth_token,
            credentials.user,
            credentials.device,
        ],
    )?;
    Ok(credentials)
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<Credentials>> {
    let credentials = conn
        .query_row(
            "SELECT id, username, auth_token, user_id, device FROM credentials
             WHERE username = ?1 COLLATE NOCASE",
            [username.trim()],
            from_row,
        )
        .optional()?;
    Ok(credentials)
}

/// Match a username against its stored auth token.
pub fn check_login(conn: &Connection, username: &str, auth_token: &str) -> AppResult<Credentials> {
    match find_by_username(conn, username)? {
        Some(credentials) if !auth_token.is_empty() && credentials.auth_token == auth_token => {
            Ok(credentials)
        }
        _ => Err(AppError::Unauthenticated),
    }
}

pub fn delete_for_user(conn: &Connection, user: &ObjectId) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM credentials WHERE user_id = ?1", [user])?;
    Ok(removed)
}
