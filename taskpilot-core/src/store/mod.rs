//! Client-side application state.
//!
//! [`AppState`] is created once and passed explicitly to whoever needs it.
//! State changes only through the stores' async actions; an action that
//! fails leaves its store as it was.

mod auth;
mod context;
mod generation;
mod tasks;
mod user;

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{Credentials, Registration};

pub use auth::{AuthStore, SameSite, TokenCookie, TOKEN_KEY, TOKEN_TTL_DAYS};
pub use context::ContextStore;
pub use generation::{Generation, Ticket};
pub use tasks::{ImportMode, Suggestion, TaskStore};
pub use user::UserStore;

pub struct AppState {
    backend: Arc<dyn Backend>,
    pub auth: Arc<AuthStore>,
    pub tasks: TaskStore,
    pub context: ContextStore,
    pub user: UserStore,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, auth: Arc<AuthStore>) -> Self {
        Self {
            tasks: TaskStore::new(backend.clone()),
            context: ContextStore::new(backend.clone()),
            user: UserStore::new(backend.clone(), auth.clone()),
            backend,
            auth,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Exchange credentials for a token and keep it.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        let token = self.backend.login(credentials).await?;
        self.auth.login(token.access)
    }

    /// Create an account; does not log in.
    pub async fn register(&mut self, registration: &Registration) -> Result<()> {
        self.backend.register(registration).await?;
        tracing::info!(username = %registration.username, "Account registered");
        Ok(())
    }

    /// Forget the token and everything loaded under it.
    pub fn logout(&mut self) -> Result<()> {
        self.auth.logout()?;
        self.tasks.clear();
        self.context.clear();
        self.user.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::Error;
    use crate::types::{ContextSource, NewContextEntry};

    fn state() -> AppState {
        AppState::new(
            Arc::new(InMemoryBackend::seeded()),
            Arc::new(AuthStore::in_memory()),
        )
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let mut state = state();
        state
            .login(&Credentials {
                login: "demo@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert!(state.auth.is_authenticated());

        state.tasks.refresh().await.unwrap();
        state.user.fetch().await.unwrap();
        state.logout().unwrap();
        assert!(!state.auth.is_authenticated());
        assert!(state.tasks.tasks().is_empty());
        assert!(state.user.user().is_none());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_session_empty() {
        let mut state = state();
        let err = state
            .login(&Credentials {
                login: "demo@example.com".to_string(),
                password: "short".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!state.auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_context_add_prepends() {
        let mut state = state();
        state.context.refresh().await.unwrap();
        let entry = state
            .context
            .add(NewContextEntry {
                content: "Call mom".to_string(),
                source: ContextSource::Other,
            })
            .await
            .unwrap();
        assert_eq!(state.context.entries()[0], entry);
        assert_eq!(state.context.entries().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_account_logs_out() {
        let mut state = state();
        state.auth.login("token".to_string()).unwrap();
        state.user.delete_account().await.unwrap();
        assert!(!state.auth.is_authenticated());
        assert!(state.user.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_today_and_categories() {
        let mut state = state();
        let today = state.tasks.refresh_today().await.unwrap();
        let ids: Vec<u64> = today.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let names: Vec<_> = state
            .context
            .refresh_categories()
            .await
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, ["Work", "Personal", "Shopping", "Health"]);
    }

    #[tokio::test]
    async fn test_profile_update() {
        let mut state = state();
        let mut user = state.user.fetch().await.unwrap().clone();
        user.name = "Renamed User".to_string();
        state.user.update(user).await.unwrap();
        assert_eq!(state.user.user().unwrap().name, "Renamed User");
        assert_eq!(state.backend().get_user().await.unwrap().name, "Renamed User");
    }
}
