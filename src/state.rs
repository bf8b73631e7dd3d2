use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::tokens::TokenAuthority;
use crate::config::Config;
use crate::mail::Mailer;
use crate::notify::Notifier;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenAuthority>,
    pub notifier: Notifier,
    pub mailer: Arc<dyn Mailer>,
}
