//! Session context
//!
//! Auth token and remembered join-form values, loaded once at startup and
//! passed explicitly to whatever needs them. Persisted as a small JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Avatar images served by the static host under `/avatars/`
pub const AVATARS: &[&str] = &[
    "micky.png", "minnie.png", "pato.png", "goofy.png", "pluto.png",
    "bella.png", "cenicienta.png", "blanca.png", "durmiente.png",
    "mulan.png", "sirenita.png", "jasmine.png", "tiana.png", "merida.png",
    "rapunzel.png", "moana.png", "woody.png", "buzz.png", "marciano.png",
    "rayo.png", "mate.png", "nemo.png", "dory.png", "baymax.png", "sulley.png",
    "mike.png", "groot.png", "rocket.png", "spider.png", "iron.png",
    "hulk.png", "capitan.png", "viuda.png", "thor.png", "doctor.png",
    "wanda.png", "loki.png", "thanos.png", "harry.png", "hermione.png",
    "ron.png", "luna.png", "dum.png", "snape.png", "vold.png", "dobby.png",
    "hed.png", "buck.png",
];

pub fn avatar_url(file: &str) -> String {
    format!("/avatars/{}", file)
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session file is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Not logged in")]
    NotLoggedIn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub email: String,
}

/// Last values typed into the join form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct JoinDefaults {
    pub room_code: String,
    pub name: String,
    /// Avatar file name from [`AVATARS`]
    pub avatar: String,
}

impl JoinDefaults {
    /// The remembered avatar if it is still in the catalog, else the first one
    pub fn avatar_or_default(&self) -> &str {
        AVATARS
            .iter()
            .find(|a| **a == self.avatar)
            .copied()
            .unwrap_or(AVATARS[0])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionContext {
    #[serde(default)]
    pub auth: Option<AuthSession>,
    #[serde(default)]
    pub join: JoinDefaults,
    /// RFC3339 time of the last save
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl SessionContext {
    pub fn token(&self) -> Result<&str, SessionError> {
        self.auth
            .as_ref()
            .map(|a| a.token.as_str())
            .ok_or(SessionError::NotLoggedIn)
    }

    /// Name shown in the host dashboard header
    pub fn display_name(&self) -> &str {
        self.auth
            .as_ref()
            .map(|a| a.email.as_str())
            .unwrap_or("Profesor")
    }

    pub fn login(&mut self, auth: AuthSession) {
        self.auth = Some(auth);
    }

    /// Forget the auth token; join-form values survive a logout
    pub fn logout(&mut self) {
        self.auth = None;
    }

    pub fn remember_join(&mut self, room_code: &str, name: &str, avatar: &str) {
        self.join = JoinDefaults {
            room_code: room_code.trim().to_string(),
            name: name.trim().to_string(),
            avatar: avatar.to_string(),
        };
    }
}

/// Where the session context lives on disk
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved session; a missing file is an empty session
    pub async fn load(&self) -> Result<SessionContext, SessionError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let ctx = serde_json::from_slice(&bytes)?;
                tracing::debug!("Loaded session from {}", self.path.display());
                Ok(ctx)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionContext::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, ctx: &mut SessionContext) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        ctx.saved_at = Some(chrono::Utc::now().to_rfc3339());
        let json = serde_json::to_vec_pretty(ctx)?;
        tokio::fs::write(&self.path, json).await?;
        tracing::debug!("Saved session to {}", self.path.display());
        Ok(())
    }
}
