//! Privileged account administration for the attendance portal.
//!
//! All operations require a superadmin requester and run against the
//! injected document-store and identity ports.

pub mod access;
pub mod cascade;
pub mod provision;

pub use access::AccessError;
pub use cascade::{
    AccountCascade, BatchDeleteError, CascadeError, DeletionReport, SetOutcome,
};
pub use provision::{AccountProvisioner, LecturerAccountRequest, ProvisionError};

use std::sync::Arc;

use common::config::DeletionConfig;
use common::identity::IdentityProvider;
use common::store::DocumentStore;

/// Registrar operation failure.
#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error("refusing to delete the requesting account")]
    SelfDeletion,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Facade over account provisioning and permanent account deletion.
pub struct Registrar {
    store: Arc<dyn DocumentStore>,
    cascade: AccountCascade,
    provisioner: AccountProvisioner,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &DeletionConfig,
    ) -> Self {
        Self {
            cascade: AccountCascade::new(store.clone(), identity.clone(), config),
            provisioner: AccountProvisioner::new(store.clone(), identity),
            store,
        }
    }

    /// Permanently delete `subject_uid` and everything referencing it.
    ///
    /// Preconditions run before anything is touched: the subject must be
    /// named, must differ from the requester, and the requester must be a
    /// superadmin. The returned report may describe a partial cleanup;
    /// see [`DeletionReport::fully_clean`].
    pub async fn delete_account(
        &self,
        requester_uid: &str,
        subject_uid: &str,
    ) -> Result<DeletionReport, RegistrarError> {
        if subject_uid.trim().is_empty() {
            return Err(CascadeError::MissingSubject.into());
        }
        if requester_uid == subject_uid {
            return Err(RegistrarError::SelfDeletion);
        }
        access::require_superadmin(self.store.as_ref(), requester_uid).await?;

        Ok(self.cascade.run(subject_uid).await?)
    }

    /// Provision a lecturer account and return its uid.
    pub async fn create_lecturer_account(
        &self,
        requester_uid: &str,
        request: LecturerAccountRequest,
    ) -> Result<String, RegistrarError> {
        access::require_superadmin(self.store.as_ref(), requester_uid).await?;

        Ok(self
            .provisioner
            .provision_lecturer(request, requester_uid)
            .await?)
    }
}
