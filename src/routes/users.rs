use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::auth::verify_user;
use crate::db;
use crate::db::models::{User, UserInput};
use crate::error::AppResult;
use crate::extractors::{JsonBody, SuperSession, UserSession};
use crate::ids::ObjectId;
use crate::mail;
use crate::repo::{cascade, users};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", get(list))
        .route("/user/{id}", get(show).put(update).delete(remove))
        .route("/report/user/{id}", put(report))
}

async fn list(State(state): State<AppState>, _session: SuperSession) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    Ok(Json(users::list(&conn)?))
}

async fn show(
    State(state): State<AppState>,
    _session: UserSession,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    let id = ObjectId::parse(&id)?;
    let conn = state.db.get()?;
    Ok(Json(users::get(&conn, &id)?))
}

async fn update(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UserInput>,
) -> AppResult<Json<User>> {
    let id = ObjectId::parse(&id)?;
    verify_user(&identity, &id)?;

    let user = db::transaction(&state.db, |conn| users::update(conn, &id, &input))?;
    Ok(Json(user))
}

async fn remove(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = ObjectId::parse(&id)?;
    verify_user(&identity, &id)?;

    cascade::delete_user(&state.db, &id)?;
    state.tokens.revoke_subject(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn report(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = ObjectId::parse(&id)?;
    let (target, reporter) = {
        let conn = state.db.get()?;
        (users::get(&conn, &id)?, users::find(&conn, identity.id())?)
    };

    tracing::info!(user = %id, reporter = %identity.id(), "User reported");
    let label = mail::reporter_label(identity.id(), reporter.as_ref());
    let message = mail::user_report(&state.config.mail.report_address, &target, &label);
    mail::send_detached(state.mailer.clone(), message);
    Ok(StatusCode::ACCEPTED)
}
