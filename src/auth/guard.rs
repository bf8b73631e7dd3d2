use rusqlite::Connection;

use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;
use crate::repo::association_users;

/// Who a request acts as, resolved once by the tier extractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(ObjectId),
    AssociationUser(ObjectId),
    SuperUser(ObjectId),
}

impl Identity {
    pub fn id(&self) -> &ObjectId {
        match self {
            Identity::User(id) | Identity::AssociationUser(id) | Identity::SuperUser(id) => id,
        }
    }
}

/// The identity must be the target user.
pub fn verify_user(identity: &Identity, target: &ObjectId) -> AppResult<()> {
    if identity.id() == target {
        Ok(())
    } else {
        tracing::debug!(identity = %identity.id(), target = %target, "User check failed");
        Err(AppError::Unauthorized)
    }
}

/// The identity must be the target association, or a master account bound
/// to it.
pub fn verify_association(
    conn: &Connection,
    identity: &Identity,
    target: &ObjectId,
) -> AppResult<()> {
    if identity.id() == target {
        return Ok(());
    }
    match association_users::find(conn, identity.id())? {
        Some(account) if account.master && &account.association == target => Ok(()),
        _ => {
            tracing::debug!(
                identity = %identity.id(),
                target = %target,
                "Association check failed"
            );
            Err(AppError::Unauthorized)
        }
    }
}

/// Either check passing is enough.
pub fn verify_user_or_association(
    conn: &Connection,
    identity: &Identity,
    user: &ObjectId,
    association: &ObjectId,
) -> AppResult<()> {
    verify_user(identity, user).or_else(|_| verify_association(conn, identity, association))
}
