use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::verify_association;
use crate::db;
use crate::db::models::{Association, AssociationInput, AssociationUser};
use crate::error::{AppError, AppResult};
use crate::extractors::{AssociationSession, JsonBody, SuperSession, UserSession};
use crate::ids::ObjectId;
use crate::repo::{association_users, associations, cascade};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateAssociationRequest {
    #[serde(flatten)]
    pub association: AssociationInput,
    /// When present, a login account is created along with the association.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub password: String,
    #[serde(default)]
    pub master: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/association", get(list).post(create))
        .route(
            "/association/{id}",
            get(show).put(update).delete(delete),
        )
        .route("/association/{id}/user", post(create_account))
        .route("/association/{id}/myassociations", get(my_associations))
}

async fn list(
    State(state): State<AppState>,
    _session: UserSession,
) -> AppResult<Json<Vec<Association>>> {
    let conn = state.db.get()?;
    Ok(Json(associations::list(&conn)?))
}

async fn show(
    State(state): State<AppState>,
    _session: UserSession,
    Path(id): Path<String>,
) -> AppResult<Json<Association>> {
    let id = ObjectId::parse(&id)?;
    let conn = state.db.get()?;
    Ok(Json(associations::get(&conn, &id)?))
}

async fn create(
    State(state): State<AppState>,
    SuperSession(identity): SuperSession,
    JsonBody(req): JsonBody<CreateAssociationRequest>,
) -> AppResult<(StatusCode, Json<Association>)> {
    if req.association.name.trim().is_empty() {
        return Err(AppError::BadRequest("Association name is required".into()));
    }
    let cost = state.config.auth.bcrypt_cost;
    let association = db::transaction(&state.db, |conn| {
        let association = associations::create(conn, &req.association)?;
        if let Some(password) = &req.password {
            association_users::create(conn, &association, password, false, Some(identity.id()), cost)?;
        }
        Ok(association)
    })?;
    Ok((StatusCode::CREATED, Json(association)))
}

async fn update(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<AssociationInput>,
) -> AppResult<Json<Association>> {
    let id = ObjectId::parse(&id)?;
    let association = db::transaction(&state.db, |conn| {
        verify_association(conn, &identity, &id)?;
        associations::update(conn, &id, &input)
    })?;
    Ok(Json(association))
}

async fn delete(
    State(state): State<AppState>,
    _session: SuperSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = ObjectId::parse(&id)?;
    let accounts = cascade::delete_association(&state.db, &id)?;
    // Sessions acting as the association or through one of its accounts
    state.tokens.revoke_subject(&id).await;
    for account in &accounts {
        state.tokens.revoke_subject(account).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Login account for an existing association, owned by the calling
/// super-user.
async fn create_account(
    State(state): State<AppState>,
    SuperSession(identity): SuperSession,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<CreateAccountRequest>,
) -> AppResult<(StatusCode, Json<AssociationUser>)> {
    let id = ObjectId::parse(&id)?;
    let cost = state.config.auth.bcrypt_cost;
    let account = db::transaction(&state.db, |conn| {
        let association = associations::get(conn, &id)?;
        association_users::create(conn, &association, &req.password, req.master, Some(identity.id()), cost)
    })?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Associations whose accounts the caller created. Only the caller may
/// ask for their own list.
async fn my_associations(
    State(state): State<AppState>,
    SuperSession(identity): SuperSession,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Association>>> {
    let id = ObjectId::parse(&id)?;
    crate::auth::verify_user(&identity, &id)?;

    let conn = state.db.get()?;
    let owned = association_users::my_associations(&conn, &id)?
        .iter()
        .filter_map(|asso| associations::find(&conn, asso).transpose())
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(owned))
}
