//! Maps authenticated principals to the usernames engagement records are keyed by.

use std::sync::Arc;

use crate::{
    errors::{ServiceError, ServiceResult, StoreError},
    store::DocumentStore,
};

/// A principal that resolved to a registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub username: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Identity),
    NotFound,
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn DocumentStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, principal: &str) -> Result<Resolution, StoreError> {
        if principal.is_empty() {
            return Ok(Resolution::NotFound);
        }
        let Some(username) = self.store.username_for_principal(principal).await? else {
            return Ok(Resolution::NotFound);
        };
        // The principal index can outlive a user document; treat that as unknown.
        match self.store.user(&username).await? {
            Some(profile) if profile.uid == principal => Ok(Resolution::Found(Identity {
                uid: profile.uid,
                username: profile.username,
                avatar: profile.photo_url,
            })),
            _ => {
                log::warn!("principal index points at missing or foreign user '{username}'");
                Ok(Resolution::NotFound)
            }
        }
    }

    /// Resolves or fails with [`ServiceError::Unauthorized`].
    pub async fn require(&self, principal: &str) -> ServiceResult<Identity> {
        match self.resolve(principal).await? {
            Resolution::Found(identity) => Ok(identity),
            Resolution::NotFound => Err(ServiceError::Unauthorized),
        }
    }
}
