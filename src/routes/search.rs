use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::{Association, Event, Post, User};
use crate::error::AppResult;
use crate::extractors::UserSession;
use crate::repo::search::{self, SearchResults};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search/users/{term}", get(users))
        .route("/search/posts/{term}", get(posts))
        .route("/search/events/{term}", get(events))
        .route("/search/associations/{term}", get(associations))
        .route("/search/{term}", get(everything))
}

async fn users(
    State(state): State<AppState>,
    _session: UserSession,
    Path(term): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    Ok(Json(search::users(&conn, &term)?))
}

async fn posts(
    State(state): State<AppState>,
    _session: UserSession,
    Path(term): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    Ok(Json(search::posts(&conn, &term)?))
}

async fn events(
    State(state): State<AppState>,
    _session: UserSession,
    Path(term): Path<String>,
) -> AppResult<Json<Vec<Event>>> {
    let conn = state.db.get()?;
    Ok(Json(search::events(&conn, &term)?))
}

async fn associations(
    State(state): State<AppState>,
    _session: UserSession,
    Path(term): Path<String>,
) -> AppResult<Json<Vec<Association>>> {
    let conn = state.db.get()?;
    Ok(Json(search::associations(&conn, &term)?))
}

async fn everything(
    State(state): State<AppState>,
    _session: UserSession,
    Path(term): Path<String>,
) -> AppResult<Json<SearchResults>> {
    let conn = state.db.get()?;
    Ok(Json(search::everything(&conn, &term)?))
}
