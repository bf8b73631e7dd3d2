use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::auth::guard::verify_user_or_association;
use crate::auth::{verify_association, verify_user};
use crate::db;
use crate::db::models::{Comment, CommentInput, Post, PostInput, User};
use crate::error::AppResult;
use crate::extractors::{AssociationSession, JsonBody, UserSession};
use crate::ids::ObjectId;
use crate::mail;
use crate::repo::posts::FEED_LIMIT;
use crate::repo::{associations, cascade, posts, users};
use crate::state::AppState;

#[derive(Serialize)]
pub struct LikeResponse {
    pub post: Post,
    pub user: User,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post", get(list).post(create))
        .route("/post/{id}", get(show).put(update).delete(remove))
        .route("/post/{id}/like/{user_id}", post(like).delete(dislike))
        .route("/post/{id}/comment", post(comment))
        .route("/post/{id}/comment/{comment_id}", delete(uncomment))
        .route("/report/{id}/comment/{comment_id}", put(report_comment))
}

async fn list(State(state): State<AppState>, _session: UserSession) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::latest(&conn, FEED_LIMIT)?))
}

async fn show(
    State(state): State<AppState>,
    _session: UserSession,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let id = ObjectId::parse(&id)?;
    let conn = state.db.get()?;
    Ok(Json(posts::get(&conn, &id)?))
}

async fn create(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    JsonBody(input): JsonBody<PostInput>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let (association, post) = db::transaction(&state.db, |conn| {
        verify_association(conn, &identity, &input.association)?;
        let post = posts::create(conn, &input, Utc::now())?;
        Ok((associations::get(conn, &input.association)?, post))
    })?;

    state.notifier.notify_post(&association, &post);
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<PostInput>,
) -> AppResult<Json<Post>> {
    let id = ObjectId::parse(&id)?;
    let post = db::transaction(&state.db, |conn| {
        let stored = posts::get(conn, &id)?;
        verify_association(conn, &identity, &stored.association)?;
        posts::update(conn, &id, &input)
    })?;
    Ok(Json(post))
}

async fn remove(
    State(state): State<AppState>,
    AssociationSession(identity): AssociationSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = ObjectId::parse(&id)?;
    {
        let conn = state.db.get()?;
        let stored = posts::get(&conn, &id)?;
        verify_association(&conn, &identity, &stored.association)?;
    }
    cascade::delete_post(&state.db, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<Json<LikeResponse>> {
    let (id, user_id) = (ObjectId::parse(&id)?, ObjectId::parse(&user_id)?);
    verify_user(&identity, &user_id)?;

    let (post, user) = db::transaction(&state.db, |conn| posts::like(conn, &id, &user_id))?;
    Ok(Json(LikeResponse { post, user }))
}

async fn dislike(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<Json<LikeResponse>> {
    let (id, user_id) = (ObjectId::parse(&id)?, ObjectId::parse(&user_id)?);
    verify_user(&identity, &user_id)?;

    let (post, user) = db::transaction(&state.db, |conn| posts::dislike(conn, &id, &user_id))?;
    Ok(Json(LikeResponse { post, user }))
}

async fn comment(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<CommentInput>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let id = ObjectId::parse(&id)?;
    verify_user(&identity, &input.user)?;

    let (author, post, comment) = db::transaction(&state.db, |conn| {
        let (post, comment) = posts::comment(conn, &id, &input, Utc::now())?;
        Ok((users::get(conn, &input.user)?, post, comment))
    })?;

    state.notifier.notify_tags(&author, &post, &comment);
    Ok((StatusCode::CREATED, Json(post)))
}

/// The comment's author or the post's association may remove it.
async fn uncomment(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((id, comment_id)): Path<(String, String)>,
) -> AppResult<Json<Post>> {
    let (id, comment_id) = (ObjectId::parse(&id)?, ObjectId::parse(&comment_id)?);
    let post = db::transaction(&state.db, |conn| {
        let post = posts::get(conn, &id)?;
        let comment = posts::get_comment(conn, &id, &comment_id)?;
        verify_user_or_association(conn, &identity, &comment.user, &post.association)?;
        posts::uncomment(conn, &id, &comment_id)
    })?;
    Ok(Json(post))
}

async fn report_comment(
    State(state): State<AppState>,
    UserSession(identity): UserSession,
    Path((id, comment_id)): Path<(String, String)>,
) -> AppResult<Json<Comment>> {
    let (id, comment_id) = (ObjectId::parse(&id)?, ObjectId::parse(&comment_id)?);
    let (post, comment, reporter) = db::transaction(&state.db, |conn| {
        let post = posts::get(conn, &id)?;
        let comment = posts::report_comment(conn, &id, &comment_id)?;
        let reporter = users::find(conn, identity.id())?;
        Ok((post, comment, reporter))
    })?;

    tracing::info!(post = %id, comment = %comment_id, reports = comment.reports, "Comment reported");
    let label = mail::reporter_label(identity.id(), reporter.as_ref());
    let message = mail::comment_report(&state.config.mail.report_address, &post, &comment, &label);
    mail::send_detached(state.mailer.clone(), message);
    Ok(Json(comment))
}
