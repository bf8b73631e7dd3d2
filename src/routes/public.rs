use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::auth::handlers;
use crate::state::AppState;

const CREDIT: &str = "Agora is built and run by student volunteers for the campus associations.";

const LEGAL: &str = "Account data (username, profile, likes, comments and event attendance) is \
                     stored only to run the service. Deleting your account removes it, along with \
                     your comments, likes and notifications.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/credit", get(credit))
        .route("/legal", get(legal))
        .route("/login/association", post(handlers::login_association))
        .route("/login/user", post(handlers::login_user))
        .route("/signin/user/{ticket}", post(handlers::signin_user))
        .route("/logout", post(handlers::logout))
}

async fn index() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn credit() -> Json<Value> {
    Json(json!({ "credit": CREDIT }))
}

async fn legal() -> Json<Value> {
    Json(json!({ "legal": LEGAL }))
}
