use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::auth::{verify_association, verify_user};
use crate::db;
use crate::db::models::{Event, EventInput, User};
use crate::error::AppResult;
use crate::extractors::{AssociationSession, JsonBody, UserSession};
use crate::ids::ObjectId;
use crate::repo::{associations, cascade, events};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ParticipantResponse {
    pub event: Event,
    pub user: User,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/event", get(list).post(create))
        .route("/event/{id}", get(show).put(update).delete(delete))
        .route(
            "/event/{id}/participant/{user_id}",
            post(add_participant).delete(remove_participant),
        )
}

async fn list(State(state): State<AppState>, _session: UserSession) -> AppResult<Json<Vec<Event>>> {
    let conn = state.db.get()?;
    Ok(Json(events::list_future(&conn, Utc::now())?))
}

async fn show(
    State(state): State<AppState>,
    _session: UserSession,
    Path(id): Path<String>,
) -> AppResult<Json<Event>> {
    let id = ObjectId::parse(&id)?;
    let conn = state.db.get()?;
    Ok(Json(events::get(&conn, &id)?))
}

async fn create(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    JsonBody(input): JsonBody<EventInput>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let (association, event) = db::transaction(&state.db, |conn| {
        verify_association(conn, &identity, &input.association)?;
        let event = events::create(conn, &input)?;
        Ok((associations::get(conn, &input.association)?, event))
    })?;

    state.notifier.notify_event(&association, &event);
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<EventInput>,
) -> AppResult<Json<Event>> {
    let id = ObjectId::parse(&id)?;
    let event = db::transaction(&state.db, |conn| {
        // Rights follow the stored owner, not whatever the payload claims
        let stored = events::get(conn, &id)?;
        verify_association(conn, &identity, &stored.association)?;
        events::update(conn, &id, &input)
    })?;
    Ok(Json(event))
}

async fn delete(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = ObjectId::parse(&id)?;
    {
        let conn = state.db.get()?;
        let stored = events::get(&conn, &id)?;
        verify_association(&conn, &identity, &stored.association)?;
    }
    cascade::delete_event(&state.db, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_participant(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<Json<ParticipantResponse>> {
    let (id, user_id) = (ObjectId::parse(&id)?, ObjectId::parse(&user_id)?);
    verify_user(&identity, &user_id)?;

    let (event, user) =
        db::transaction(&state.db, |conn| events::add_participant(conn, &id, &user_id))?;
    Ok(Json(ParticipantResponse { event, user }))
}

async fn remove_participant(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<Json<ParticipantResponse>> {
    let (id, user_id) = (ObjectId::parse(&id)?, ObjectId::parse(&user_id)?);
    verify_user(&identity, &user_id)?;

    let (event, user) =
        db::transaction(&state.db, |conn| events::remove_participant(conn, &id, &user_id))?;
    Ok(Json(ParticipantResponse { event, user }))
}
