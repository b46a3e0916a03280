//! Lecturer account provisioning.
//!
//! Creates the identity and the profile document in one operation. When
//! the email is already registered the existing identity is reused and
//! its credentials rebound, so provisioning the same lecturer twice
//! converges instead of failing.

use std::sync::Arc;

use chrono::Utc;

use common::identity::{IdentityError, IdentityProvider, NewIdentity};
use common::model::{Role, UserProfile, collections};
use common::store::{CollectionPath, DocumentStore, StoreError};

const MIN_PASSWORD_CHARS: usize = 6;
const MIN_NAME_CHARS: usize = 3;

/// Input for provisioning one lecturer account.
#[derive(Debug, Clone)]
pub struct LecturerAccountRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Optional link to the lecturer master record.
    pub master_dosen_id: Option<String>,
}

/// Provisioning failure.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("email address is not valid")]
    InvalidEmail,

    #[error("password must be at least {MIN_PASSWORD_CHARS} characters")]
    WeakPassword,

    #[error("name must be at least {MIN_NAME_CHARS} characters")]
    NameTooShort,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates lecturer identities and profiles through the injected ports.
pub struct AccountProvisioner {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl AccountProvisioner {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Provision a lecturer account and return its uid.
    pub async fn provision_lecturer(
        &self,
        request: LecturerAccountRequest,
        acting_uid: &str,
    ) -> Result<String, ProvisionError> {
        let email = request.email.trim().to_lowercase();
        let name = request.name.trim().to_string();

        if email.is_empty() || !email.contains('@') {
            return Err(ProvisionError::InvalidEmail);
        }
        if request.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ProvisionError::WeakPassword);
        }
        if name.chars().count() < MIN_NAME_CHARS {
            return Err(ProvisionError::NameTooShort);
        }

        let uid = match self
            .identity
            .create(NewIdentity {
                email: email.clone(),
                password: request.password.clone(),
                display_name: name.clone(),
            })
            .await
        {
            Ok(identity) => identity.uid,
            Err(IdentityError::EmailTaken(_)) => {
                // Rebind the existing identity instead of failing, so a
                // re-provisioned lecturer gets the new password.
                let existing = self.identity.find_by_email(&email).await?;
                self.identity
                    .set_credentials(&existing.uid, &request.password, &name)
                    .await?;
                existing.uid
            }
            Err(err) => return Err(err.into()),
        };

        let now = Utc::now();
        let profile = UserProfile {
            role: Role::Dosen.as_str().to_string(),
            name,
            email,
            master_dosen_id: request.master_dosen_id,
            created_at: now,
            created_by: acting_uid.to_string(),
            updated_at: now,
            updated_by: acting_uid.to_string(),
        };
        let data = serde_json::to_value(&profile).map_err(|source| StoreError::Malformed {
            id: uid.clone(),
            source,
        })?;

        let users = CollectionPath::root(collections::USERS);
        // Merge, not replace: legacy profile fields written by older
        // clients must survive a re-provision.
        self.store.merge(&users, &uid, data).await?;

        tracing::info!(uid = %uid, "lecturer account provisioned");
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::identity::InMemoryIdentity;
    use common::store::InMemoryStore;
    use serde_json::json;

    fn request(email: &str, password: &str, name: &str) -> LecturerAccountRequest {
        LecturerAccountRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            master_dosen_id: None,
        }
    }

    fn provisioner() -> (AccountProvisioner, Arc<InMemoryStore>, Arc<InMemoryIdentity>) {
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(InMemoryIdentity::new());
        (
            AccountProvisioner::new(store.clone(), identity.clone()),
            store,
            identity,
        )
    }

    #[tokio::test]
    async fn test_rejects_bad_inputs() {
        let (provisioner, _, _) = provisioner();

        let err = provisioner
            .provision_lecturer(request("not-an-email", "secret123", "Budi"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidEmail));

        let err = provisioner
            .provision_lecturer(request("b@campus.test", "short", "Budi"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::WeakPassword));

        let err = provisioner
            .provision_lecturer(request("b@campus.test", "secret123", " Bu "), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NameTooShort));
    }

    #[tokio::test]
    async fn test_creates_identity_and_profile() {
        let (provisioner, store, identity) = provisioner();

        let uid = provisioner
            .provision_lecturer(
                request("  Budi@Campus.TEST ", "secret123", " Budi Santoso "),
                "admin",
            )
            .await
            .unwrap();

        assert!(identity.contains(&uid).await);
        let users = CollectionPath::root(collections::USERS);
        let doc = store.get(&users, &uid).await.unwrap().unwrap();
        assert_eq!(doc.data["role"], "dosen");
        assert_eq!(doc.data["email"], "budi@campus.test");
        assert_eq!(doc.data["name"], "Budi Santoso");
        assert_eq!(doc.data["createdBy"], "admin");
    }

    #[tokio::test]
    async fn test_existing_email_rebinds_credentials_and_reuses_uid() {
        let (provisioner, store, identity) = provisioner();

        let first = provisioner
            .provision_lecturer(request("b@campus.test", "secret123", "Budi"), "admin")
            .await
            .unwrap();
        let second = provisioner
            .provision_lecturer(request("b@campus.test", "rotated456", "Budi S."), "admin")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            identity.password_of(&first).await,
            Some("rotated456".to_string())
        );
        let users = CollectionPath::root(collections::USERS);
        let doc = store.get(&users, &first).await.unwrap().unwrap();
        assert_eq!(doc.data["name"], "Budi S.");
    }

    #[tokio::test]
    async fn test_merge_keeps_legacy_profile_fields() {
        let (provisioner, store, identity) = provisioner();
        identity.insert("u-legacy", "b@campus.test").await;

        let users = CollectionPath::root(collections::USERS);
        store
            .put(&users, "u-legacy", json!({"kelas": "TI-1", "role": "mahasiswa"}))
            .await
            .unwrap();

        let uid = provisioner
            .provision_lecturer(request("b@campus.test", "secret123", "Budi"), "admin")
            .await
            .unwrap();
        assert_eq!(uid, "u-legacy");

        let doc = store.get(&users, &uid).await.unwrap().unwrap();
        assert_eq!(doc.data["kelas"], "TI-1");
        assert_eq!(doc.data["role"], "dosen");
    }
}
