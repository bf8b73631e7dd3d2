use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::ids::ObjectId;

/// Independent token namespaces. A token valid in one tier says nothing
/// about the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    User,
    AssociationUser,
    SuperUser,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::User, Tier::AssociationUser, Tier::SuperUser];

    fn index(self) -> usize {
        match self {
            Tier::User => 0,
            Tier::AssociationUser => 1,
            Tier::SuperUser => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub subject: ObjectId,
    pub issued_at: DateTime<Utc>,
}

/// In-memory session tokens, one table per tier. Tokens never expire; they
/// live until revoked or until the process restarts.
#[derive(Default)]
pub struct TokenAuthority {
    tables: [RwLock<HashMap<String, TokenRecord>>; 3],
}

impl TokenAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `subject` in one tier. Earlier tokens for the
    /// same subject stay valid.
    pub async fn issue(&self, tier: Tier, subject: &ObjectId) -> String {
        self.issue_in(&[tier], subject).await
    }

    /// Issue one token string registered in every tier of `tiers`.
    pub async fn issue_in(&self, tiers: &[Tier], subject: &ObjectId) -> String {
        let token = generate_token();
        let record = TokenRecord {
            subject: subject.clone(),
            issued_at: Utc::now(),
        };
        for tier in tiers {
            self.tables[tier.index()]
                .write()
                .await
                .insert(token.clone(), record.clone());
        }
        tracing::debug!(subject = %subject, ?tiers, "Issued session token");
        token
    }

    pub async fn resolve(&self, tier: Tier, token: &str) -> Result<ObjectId, AppError> {
        self.tables[tier.index()]
            .read()
            .await
            .get(token)
            .map(|record| record.subject.clone())
            .ok_or(AppError::Unauthenticated)
    }

    /// Drop `token` from every tier. Returns whether any tier knew it.
    pub async fn revoke(&self, token: &str) -> bool {
        let mut found = false;
        for table in &self.tables {
            found |= table.write().await.remove(token).is_some();
        }
        found
    }

    /// Drop every token issued for `subject`, in every tier. Returns how
    /// many records were removed.
    pub async fn revoke_subject(&self, subject: &ObjectId) -> usize {
        let mut removed = 0;
        for table in &self.tables {
            let mut table = table.write().await;
            let before = table.len();
            table.retain(|_, record| &record.subject != subject);
            removed += before - table.len();
        }
        if removed > 0 {
            tracing::debug!(subject = %subject, removed, "Revoked session tokens");
        }
        removed
    }
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
