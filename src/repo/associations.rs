use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Association, AssociationInput, Rgb};
use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;
use crate::repo::{id_list, json_column};

const COLUMNS: &str = "id, name, email, description, palette, selected_color, profile, cover, \
                       bg_color, fg_color";

/// Association row without its relationship sets.
fn from_row(row: &Row<'_>) -> rusqlite::Result<Association> {
    let palette: Vec<Rgb> = json_column(row, 4)?;
    Ok(Association {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        description: row.get(3)?,
        events: Vec::new(),
        posts: Vec::new(),
        palette,
        selected_color: row.get(5)?,
        profile: row.get(6)?,
        cover: row.get(7)?,
        bg_color: row.get(8)?,
        fg_color: row.get(9)?,
    })
}

fn load_edges(conn: &Connection, mut association: Association) -> AppResult<Association> {
    association.events = event_ids(conn, &association.id)?;
    association.posts = post_ids(conn, &association.id)?;
    Ok(association)
}

pub fn event_ids(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    id_list(
        conn,
        "SELECT event_id FROM association_events WHERE association_id = ?1 ORDER BY rowid",
        id,
    )
}

pub fn post_ids(conn: &Connection, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    id_list(
        conn,
        "SELECT post_id FROM association_posts WHERE association_id = ?1 ORDER BY rowid",
        id,
    )
}

pub fn create(conn: &Connection, input: &AssociationInput) -> AppResult<Association> {
    let id = ObjectId::generate();
    conn.execute(
        "INSERT INTO associations (id, name, email, description, palette, selected_color,
                                   profile, cover, bg_color, fg_color)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            input.name,
            input.email.to_lowercase(),
            input.description,
            serde_json::to_string(&input.palette)?,
            input.selected_color,
            input.profile,
            input.cover,
            input.bg_color,
            input.fg_color,
        ],
    )?;
    tracing::info!(association = %id, name = %input.name, "Association created");
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &ObjectId) -> AppResult<Option<Association>> {
    let association = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM associations WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    association.map(|a| load_edges(conn, a)).transpose()
}

pub fn get(conn: &Connection, id: &ObjectId) -> AppResult<Association> {
    find(conn, id)?.ok_or_else(|| AppError::not_found("Association"))
}

pub fn list(conn: &Connection) -> AppResult<Vec<Association>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM associations ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|a| load_edges(conn, a)).collect()
}

/// Overwrite the editable fields. Event and post sets are never touched here.
pub fn update(conn: &Connection, id: &ObjectId, input: &AssociationInput) -> AppResult<Association> {
    let changed = conn.execute(
        "UPDATE associations SET name = ?2, email = ?3, description = ?4, palette = ?5,
                selected_color = ?6, profile = ?7, cover = ?8, bg_color = ?9, fg_color = ?10
         WHERE id = ?1",
        params![
            id,
            input.name,
            input.email.to_lowercase(),
            input.description,
            serde_json::to_string(&input.palette)?,
            input.selected_color,
            input.profile,
            input.cover,
            input.bg_color,
            input.fg_color,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Association"));
    }
    get(conn, id)
}

/// Remove the association row itself. Callers detach dependents first; see
/// `cascade::delete_association`.
pub(crate) fn remove(conn: &Connection, id: &ObjectId) -> AppResult<()> {
    conn.execute("DELETE FROM associations WHERE id = ?1", [id])?;
    Ok(())
}

// -- Relationship edges (set semantics) --

pub fn add_event(conn: &Connection, id: &ObjectId, event: &ObjectId) -> AppResult<Association> {
    conn.execute(
        "INSERT OR IGNORE INTO association_events (association_id, event_id) VALUES (?1, ?2)",
        params![id, event],
    )?;
    get(conn, id)
}

pub fn remove_event(conn: &Connection, id: &ObjectId, event: &ObjectId) -> AppResult<()> {
    conn.execute(
        "DELETE FROM association_events WHERE association_id = ?1 AND event_id = ?2",
        params![id, event],
    )?;
    Ok(())
}

pub fn add_post(conn: &Connection, id: &ObjectId, post: &ObjectId) -> AppResult<Association> {
    conn.execute(
        "INSERT OR IGNORE INTO association_posts (association_id, post_id) VALUES (?1, ?2)",
        params![id, post],
    )?;
    get(conn, id)
}

pub fn remove_post(conn: &Connection, id: &ObjectId, post: &ObjectId) -> AppResult<()> {
    conn.execute(
        "DELETE FROM association_posts WHERE association_id = ?1 AND post_id = ?2",
        params![id, post],
    )?;
    Ok(())
}
