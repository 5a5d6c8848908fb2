//! Signed-in user's profile.

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::Result;
use crate::types::User;

use super::AuthStore;

pub struct UserStore {
    backend: Arc<dyn Backend>,
    auth: Arc<AuthStore>,
    user: Option<User>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn Backend>, auth: Arc<AuthStore>) -> Self {
        Self {
            backend,
            auth,
            user: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub async fn fetch(&mut self) -> Result<&User> {
        let user = self.backend.get_user().await?;
        Ok(self.user.insert(user))
    }

    pub async fn update(&mut self, user: User) -> Result<&User> {
        let updated = self.backend.update_user(&user).await?;
        Ok(self.user.insert(updated))
    }

    /// Delete the account and end the session.
    pub async fn delete_account(&mut self) -> Result<()> {
        self.backend.delete_user().await?;
        self.user = None;
        self.auth.logout()
    }

    pub(crate) fn clear(&mut self) {
        self.user = None;
    }
}
