use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::tokens::Tier;
use crate::db;
use crate::db::models::{Association, Credentials, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{JsonBody, SessionToken, UserSession};
use crate::ids::ObjectId;
use crate::repo::{association_users, associations, credentials, users};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AssociationLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UserLoginRequest {
    pub username: String,
    #[serde(rename = "authtoken")]
    pub auth_token: String,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    pub username: String,
    #[serde(default)]
    pub device: String,
    /// Replace the credentials of an existing user instead of failing.
    #[serde(default)]
    pub erase: bool,
}

// -- Response types --

#[derive(Serialize)]
pub struct AssociationLoginResponse {
    pub token: String,
    pub association: Association,
    /// Account the session acts through; equals the association id for
    /// non-master accounts.
    pub subject: ObjectId,
    pub master: bool,
}

#[derive(Serialize)]
pub struct UserLoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct SigninResponse {
    pub user: User,
    pub credentials: Credentials,
}

/// POST /login/association
///
/// A master account acts through its own record in every tier. Any other
/// account acts as its association, in the User and AssociationUser tiers.
pub async fn login_association(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AssociationLoginRequest>,
) -> AppResult<Json<AssociationLoginResponse>> {
    let (account, association) = {
        let conn = state.db.get()?;
        let account = association_users::check_login(&conn, &req.username, &req.password)?;
        let association = associations::get(&conn, &account.association)?;
        (account, association)
    };

    let (subject, tiers) = if account.master {
        (account.id.clone(), &Tier::ALL[..])
    } else {
        (association.id.clone(), &[Tier::User, Tier::AssociationUser][..])
    };
    let token = state.tokens.issue_in(tiers, &subject).await;

    tracing::info!(
        association = %association.id,
        master = account.master,
        "Association logged in"
    );
    Ok(Json(AssociationLoginResponse {
        token,
        association,
        subject,
        master: account.master,
    }))
}

/// POST /login/user
pub async fn login_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<UserLoginRequest>,
) -> AppResult<Json<UserLoginResponse>> {
    let user = {
        let conn = state.db.get()?;
        let creds = credentials::check_login(&conn, &req.username, &req.auth_token)?;
        users::get(&conn, &creds.user)?
    };

    let token = state.tokens.issue(Tier::User, &user.id).await;
    tracing::info!(user = %user.id, "User logged in");
    Ok(Json(UserLoginResponse { token, user }))
}

/// POST /signin/user/{ticket}
///
/// Creates the user on first sign-up and hands out a fresh auth token. The
/// ticket is accepted as-is; validating it against the campus SSO is the
/// job of the deployment in front of this service.
pub async fn signin_user(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
    JsonBody(req): JsonBody<SigninRequest>,
) -> AppResult<(StatusCode, Json<SigninResponse>)> {
    if !state.config.auth.signup_enabled {
        return Err(AppError::Forbidden("Sign-up is disabled".into()));
    }
    if ticket.trim().is_empty() {
        return Err(AppError::BadRequest("Missing ticket".into()));
    }

    let username = req.username.trim().to_lowercase();
    let (user, credentials, created) = db::transaction(&state.db, |conn| {
        let (user, created) = match users::find_by_username(conn, &username)? {
            Some(_) if !req.erase => {
                return Err(AppError::Conflict("User already exists".into()));
            }
            Some(user) => (user, false),
            None => (users::create(conn, &username)?, true),
        };
        let credentials = credentials::replace(conn, &user.username, &user.id, &req.device)?;
        Ok((user, credentials, created))
    })?;

    tracing::info!(user = %user.id, created, "User signed in");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(SigninResponse { user, credentials })))
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    SessionToken(token): SessionToken,
) -> AppResult<StatusCode> {
    state.tokens.revoke(&token).await;
    let conn = state.db.get()?;
    credentials::delete_for_user(&conn, identity.id())?;
    tracing::info!(subject = %identity.id(), "Logged out");
    Ok(StatusCode::NO_CONTENT)
}
