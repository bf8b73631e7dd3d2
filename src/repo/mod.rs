//! Entity persistence. Every function takes a plain `&Connection` so callers
//! decide the transaction boundary; the relationship-changing operations are
//! always invoked through `db::transaction` by their callers.

pub mod association_users;
pub mod associations;
pub mod cascade;
pub mod credentials;
pub mod events;
pub mod notifications;
pub mod posts;
pub mod search;
pub mod users;

use rusqlite::types::Type;
use rusqlite::{Connection, Row, ToSql};
use serde::de::DeserializeOwned;

use crate::error::AppResult;
use crate::ids::ObjectId;

/// Collect a single-column id query, in insertion order.
pub(crate) fn id_list(conn: &Connection, sql: &str, id: &ObjectId) -> AppResult<Vec<ObjectId>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<Result<Vec<ObjectId>, _>>()?;
    Ok(ids)
}

/// Read a JSON text column into `T`.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `LIKE` pattern matching `term` anywhere, with wildcards in `term` escaped.
/// Use together with `ESCAPE '\'`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn exists(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> AppResult<bool> {
    let found: bool = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(found)
}
