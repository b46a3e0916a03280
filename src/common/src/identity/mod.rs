//! Identity-provider port.
//!
//! Account credentials live in an external managed authentication
//! service; the portal only creates, rebinds, and deletes identities
//! through this trait. `NotFound` is its own variant because account
//! deletion must treat an already-missing identity as success.

use async_trait::async_trait;

/// An identity as known to the authentication service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Payload for creating a fresh identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Error types that can occur during identity operations
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("no identity registered for {0}")]
    NotFound(String),

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("identity backend rejected the request: {0}")]
    Backend(String),
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new identity. Fails with [`IdentityError::EmailTaken`]
    /// when the email is already bound.
    async fn create(&self, new: NewIdentity) -> IdentityResult<Identity>;

    /// Look up an identity by email.
    async fn find_by_email(&self, email: &str) -> IdentityResult<Identity>;

    /// Rebind password and display name of an existing identity.
    async fn set_credentials(
        &self,
        uid: &str,
        password: &str,
        display_name: &str,
    ) -> IdentityResult<()>;

    /// Remove an identity. Fails with [`IdentityError::NotFound`] when the
    /// uid is unknown; callers deciding to treat that as success do so
    /// explicitly.
    async fn delete(&self, uid: &str) -> IdentityResult<()>;
}

pub mod memory;
pub use memory::InMemoryIdentity;
