pub mod guard;
pub mod handlers;
pub mod tokens;

pub use guard::{verify_association, verify_user, Identity};
pub use tokens::{Tier, TokenAuthority};
