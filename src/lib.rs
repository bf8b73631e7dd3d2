// Library exports for Agora
// This allows integration tests and the binary to share the same modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod ids;
pub mod mail;
pub mod notify;
pub mod repo;
pub mod routes;
pub mod state;

use std::sync::Arc;

use crate::auth::TokenAuthority;
use crate::config::Config;
use crate::mail::LogMailer;
use crate::notify::{LogTransport, Notifier};
use crate::state::{AppState, DbPool};

/// State with the logging push transport and mailer.
pub fn build_state(db: DbPool, config: Config) -> AppState {
    let notifier = Notifier::new(
        db.clone(),
        Arc::new(LogTransport),
        config.notifications.enabled,
    );
    AppState {
        db,
        config,
        tokens: Arc::new(TokenAuthority::new()),
        notifier,
        mailer: Arc::new(LogMailer),
    }
}
