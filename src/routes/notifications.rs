use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::auth::verify_user;
use crate::db::models::{Notification, NotificationUser, NotificationUserInput};
use crate::error::AppResult;
use crate::extractors::{JsonBody, UserSession};
use crate::ids::ObjectId;
use crate::repo::notifications;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notification", post(register_device))
        .route("/notification/{user_id}", get(list))
        .route("/notification/{user_id}/{id}", delete(remove))
}

async fn register_device(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    JsonBody(input): JsonBody<NotificationUserInput>,
) -> AppResult<Json<NotificationUser>> {
    verify_user(&identity, &input.user_id)?;
    let conn = state.db.get()?;
    Ok(Json(notifications::register_device(&conn, &input)?))
}

async fn list(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Notification>>> {
    let user_id = ObjectId::parse(&user_id)?;
    verify_user(&identity, &user_id)?;
    let conn = state.db.get()?;
    Ok(Json(notifications::list_for_user(&conn, &user_id)?))
}

async fn remove(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((user_id, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let (user_id, id) = (ObjectId::parse(&user_id)?, ObjectId::parse(&id)?);
    verify_user(&identity, &user_id)?;
    let conn = state.db.get()?;
    notifications::delete(&conn, &user_id, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
