use rusqlite::Connection;
use serde::Serialize;

use crate::db::models::{Association, Event, Post, User};
use crate::error::AppResult;
use crate::repo::{contains_pattern, events, posts, users};

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub users: Vec<User>,
    pub posts: Vec<Post>,
    pub events: Vec<Event>,
    pub associations: Vec<Association>,
}

pub fn users(conn: &Connection, term: &str) -> AppResult<Vec<User>> {
    users::search(conn, term)
}

pub fn posts(conn: &Connection, term: &str) -> AppResult<Vec<Post>> {
    posts::search(conn, term)
}

pub fn events(conn: &Connection, term: &str) -> AppResult<Vec<Event>> {
    events::search(conn, term)
}

pub fn associations(conn: &Connection, term: &str) -> AppResult<Vec<Association>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM associations
         WHERE name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'
         ORDER BY name COLLATE NOCASE",
    )?;
    let ids = stmt
        .query_map([contains_pattern(term)], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|id| crate::repo::associations::get(conn, id))
        .collect()
}

pub fn everything(conn: &Connection, term: &str) -> AppResult<SearchResults> {
    Ok(SearchResults {
        users: users(conn, term)?,
        posts: posts(conn, term)?,
        events: events(conn, term)?,
        associations: associations(conn, term)?,
    })
}
