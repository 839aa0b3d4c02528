//! Read-only view of the session store.
//!
//! The console never signs in or out itself; it picks up whatever credential
//! and profile the session store currently holds.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config;

/// Signed-in administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, alias = "accessToken")]
    token: Option<String>,
    #[serde(default)]
    profile: Option<Profile>,
}

impl Session {
    /// Load the session from `FLEET_SESSION_TOKEN`, falling back to the JSON
    /// file named by `FLEET_SESSION_FILE`. Neither being set yields an empty
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error when the session file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        if let Some(token) = config::get_session_token() {
            return Ok(Self { token: Some(token), profile: None });
        }
        match config::get_session_file() {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no session configured");
                Ok(Self::default())
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        Self::from_json(&json)
    }

    /// # Errors
    ///
    /// Returns an error when `json` is not a session document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("deserializing session")
    }

    /// Bearer credential, if a non-blank one is held.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }
}
