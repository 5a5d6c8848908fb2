//! Session token, persisted between runs as a cookie-style record.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Record key, kept for parity with the web client's cookie
pub const TOKEN_KEY: &str = "auth_token";

/// Token lifetime
pub const TOKEN_TTL_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// What gets written to `auth_token.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCookie {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    /// Set in release builds
    pub secure: bool,
    pub same_site: SameSite,
}

impl TokenCookie {
    pub fn new(value: String, now: DateTime<Utc>) -> Self {
        Self {
            key: TOKEN_KEY.to_string(),
            value,
            expires_at: now + Duration::days(TOKEN_TTL_DAYS),
            secure: cfg!(not(debug_assertions)),
            same_site: SameSite::Lax,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Current bearer token.
///
/// Shared (`Arc`) between the application state and the REST client: the
/// client reads the token on every request and logs out on a 401.
#[derive(Debug)]
pub struct AuthStore {
    token: RwLock<Option<String>>,
    hydrated: AtomicBool,
    path: Option<PathBuf>,
}

impl AuthStore {
    /// Store persisting to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            token: RwLock::new(None),
            hydrated: AtomicBool::new(false),
            path: Some(path),
        }
    }

    /// Store that forgets the token on exit
    pub fn in_memory() -> Self {
        Self {
            token: RwLock::new(None),
            hydrated: AtomicBool::new(false),
            path: None,
        }
    }

    /// Load the persisted token, ignoring expired or unreadable records.
    pub fn hydrate(&self) -> Result<Option<String>> {
        let token = match &self.path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                match serde_json::from_str::<TokenCookie>(&content) {
                    Ok(cookie) if cookie.key == TOKEN_KEY && !cookie.is_expired(Utc::now()) => {
                        Some(cookie.value)
                    }
                    Ok(_) => {
                        tracing::info!(path = %path.display(), "Persisted session expired");
                        std::fs::remove_file(path)?;
                        None
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                        None
                    }
                }
            }
            _ => None,
        };

        self.set(token.clone());
        self.hydrated.store(true, Ordering::Release);
        Ok(token)
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::Acquire)
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Persist the token, then make it current.
    pub fn login(&self, token: String) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let cookie = TokenCookie::new(token.clone(), Utc::now());
            std::fs::write(path, serde_json::to_string_pretty(&cookie)?)?;
        }
        self.set(Some(token));
        tracing::info!("Logged in");
        Ok(())
    }

    /// Forget the token, on disk and in memory.
    pub fn logout(&self) -> Result<()> {
        self.set(None);
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("Logged out");
        Ok(())
    }

    fn set(&self, token: Option<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }
}
