use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Event, EventInput, Rgb, User};
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;
use crate::repo::{associations, contains_pattern, id_list, json_column, users};

const COLUMNS: &str = "id, name, association_id, description, status, palette, selected_color, \
                       date_start, date_end, image, bg_color, fg_color";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let palette: Vec<Rgb> = json_column(row, 5)?;
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        association: row.get(2)?,
        description: row.get(3)?,
        participants: Vec::new(),
        status: row.get(4)?,
        palette,
        selected_color: row.get(6)?,
        date_start: row.get(7)?,
        date_end: row.get(8)?,
        image: row.get(9)?,
        bg_color: row.get(10)?,
        fg_color: row.get(11)?,
    })
}

fn load_edges(conn: &Connection, mut event: Event) -> AppResult<Event> {
    event.participants = participant_ids(conn, &event.id)?;
    Ok(event)
}

fn collect(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> AppResult<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|e| load_edges(conn, e)).collect()
}

pub fn participant_ids(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    id_list(
        conn,
        "SELECT user_id FROM event_participants WHERE event_id = ?1 ORDER BY rowid",
        id,
    )
}

/// Insert the event and link it into its association's event set.
pub fn create(conn: &Connection, input: &EventInput) -> AppResult<Event> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Event name is required".into()));
    }
    // NotFound before any write when the association is unknown
    associations::get(conn, &input.association)?;

    let id = ObjectId::generate();
    conn.execute(
        "INSERT INTO events (id, name, association_id, description, status, palette,
                             selected_color, date_start, date_end, image, bg_color, fg_color)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            input.name,
            input.association,
            input.description,
            input.status,
            serde_json::to_string(&input.palette)?,
            input.selected_color,
            input.date_start,
            input.date_end,
            input.image,
            input.bg_color,
            input.fg_color,
        ],
    )?;
    associations::add_event(conn, &input.association, &id)?;

    tracing::info!(event = %id, association = %input.association, "Event created");
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &ObjectId) -> AppResult<Option<Event>> {
    let event = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM events WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    event.map(|e| load_edges(conn, e)).transpose()
}

pub fn get(conn: &Connection, id: &ObjectId) -> AppResult<Event> {
    find(conn, id)?.ok_or_else(|| AppError::not_found("Event"))
}

/// Events that have not ended yet, soonest first.
pub fn list_future(conn: &Connection, now: DateTime<Utc>) -> AppResult<Vec<Event>> {
    collect(
        conn,
        &format!("SELECT {COLUMNS} FROM events WHERE date_end > ?1 ORDER BY date_start"),
        [now],
    )
}

pub fn search(conn: &Connection, term: &str) -> AppResult<Vec<Event>> {
    collect(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM events
             WHERE name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'
             ORDER BY date_start DESC"
        ),
        [contains_pattern(term)],
    )
}

/// Overwrite the editable fields. The owning association and the
/// participant set stay as they are.
pub fn update(conn: &Connection, id: &ObjectId, input: &EventInput) -> AppResult<Event> {
    let changed = conn.execute(
        "UPDATE events SET name = ?2, description = ?3, status = ?4, palette = ?5,
                selected_color = ?6, date_start = ?7, date_end = ?8, image = ?9,
                bg_color = ?10, fg_color = ?11
         WHERE id = ?1",
        params![
            id,
            input.name,
            input.description,
            input.status,
            serde_json::to_string(&input.palette)?,
            input.selected_color,
            input.date_start,
            input.date_end,
            input.image,
            input.bg_color,
            input.fg_color,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Event"));
    }
    get(conn, id)
}

pub(crate) fn remove(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
    Ok(())
}

/// Add `user` to the event's participants and the event to the user's
/// events. Adding twice changes nothing.
pub fn add_participant(
    conn: &Connection,
    id: &ObjectId,
    user: &ObjectId,
) -> AppResult<(Event, User)> {
    get(conn, id)?;
    users::ensure_exists(conn, user)?;

    conn.execute(
        "INSERT OR IGNORE INTO event_participants (event_id, user_id) VALUES (?1, ?2)",
        params![id, user],
    )?;
    users::add_event(conn, user, id)?;
    Ok((get(conn, id)?, users::get(conn, user)?))
}

pub fn remove_participant(
    conn: &Connection,
    id: &ObjectId,
    user: &ObjectId,
) -> AppResult<(Event, User)> {
    get(conn, id)?;
    users::ensure_exists(conn, user)?;

    unlink_participant(conn, id, user)?;
    Ok((get(conn, id)?, users::get(conn, user)?))
}

/// Drop both sides of the participant edge without any existence checks.
pub(crate) fn unlink_participant(conn: &Connection, id: &ObjectId, user: &ObjectId) -> AppResult<()> {
    conn.execute(
        "DELETE FROM event_participants WHERE event_id = ?1 AND user_id = ?2",
        params![id, user],
    )?;
    users::remove_event(conn, user, id)?;
    Ok(())
}
