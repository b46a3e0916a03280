//! Access guard for privileged account administration.

use serde_json::Value;

use common::model::{Role, collections, fields};
use common::store::{CollectionPath, DocumentStore, StoreError};

/// Access check failure.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("sign-in required")]
    Unauthenticated,

    #[error("superadmin role required")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Verify that `requester_uid` belongs to a superadmin profile.
///
/// Every privileged registrar operation runs this before touching
/// anything else.
pub async fn require_superadmin(
    store: &dyn DocumentStore,
    requester_uid: &str,
) -> Result<(), AccessError> {
    if requester_uid.trim().is_empty() {
        return Err(AccessError::Unauthenticated);
    }

    let users = CollectionPath::root(collections::USERS);
    let profile = store.get(&users, requester_uid).await?;
    let role = profile
        .as_ref()
        .and_then(|doc| doc.data.get(fields::ROLE))
        .and_then(Value::as_str)
        .and_then(Role::parse);

    match role {
        Some(Role::Superadmin) => Ok(()),
        _ => Err(AccessError::Forbidden),
    }
}
