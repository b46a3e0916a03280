use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Identity, IdentityError, IdentityProvider, IdentityResult, NewIdentity};

#[derive(Debug, Clone)]
struct StoredIdentity {
    email: String,
    password: String,
    display_name: Option<String>,
}

/// In-memory identity provider for tests and configless development.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdentity {
    accounts: Arc<Mutex<HashMap<String, StoredIdentity>>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an identity with a fixed uid.
    pub async fn insert(&self, uid: &str, email: &str) {
        self.accounts.lock().await.insert(
            uid.to_string(),
            StoredIdentity {
                email: email.to_string(),
                password: String::new(),
                display_name: None,
            },
        );
    }

    pub async fn contains(&self, uid: &str) -> bool {
        self.accounts.lock().await.contains_key(uid)
    }

    /// Stored password, for asserting credential rebinds in tests.
    pub async fn password_of(&self, uid: &str) -> Option<String> {
        self.accounts
            .lock()
            .await
            .get(uid)
            .map(|a| a.password.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn create(&self, new: NewIdentity) -> IdentityResult<Identity> {
        let mut accounts = self.accounts.lock().await;
        if accounts.values().any(|a| a.email == new.email) {
            return Err(IdentityError::EmailTaken(new.email));
        }
        let uid = Uuid::new_v4().to_string();
        accounts.insert(
            uid.clone(),
            StoredIdentity {
                email: new.email.clone(),
                password: new.password,
                display_name: Some(new.display_name.clone()),
            },
        );
        Ok(Identity {
            uid,
            email: new.email,
            display_name: Some(new.display_name),
        })
    }

    async fn find_by_email(&self, email: &str) -> IdentityResult<Identity> {
        let accounts = self.accounts.lock().await;
        accounts
            .iter()
            .find(|(_, a)| a.email == email)
            .map(|(uid, a)| Identity {
                uid: uid.clone(),
                email: a.email.clone(),
                display_name: a.display_name.clone(),
            })
            .ok_or_else(|| IdentityError::NotFound(email.to_string()))
    }

    async fn set_credentials(
        &self,
        uid: &str,
        password: &str,
        display_name: &str,
    ) -> IdentityResult<()> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(uid)
            .ok_or_else(|| IdentityError::NotFound(uid.to_string()))?;
        account.password = password.to_string();
        account.display_name = Some(display_name.to_string());
        Ok(())
    }

    async fn delete(&self, uid: &str) -> IdentityResult<()> {
        let mut accounts = self.accounts.lock().await;
        accounts
            .remove(uid)
            .map(|_| ())
            .ok_or_else(|| IdentityError::NotFound(uid.to_string()))
    }
}
