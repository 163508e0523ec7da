// ABOUTME: File-backed persistence for the OAuth token triple
// ABOUTME: Atomic full-replace save, fail-soft load, idempotent clear
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use super::Token;
use crate::errors::{AppError, AppResult};

/// Durable storage for the OAuth token triple.
///
/// The token file is the sole source of truth across process restarts.
/// `save` always writes the complete triple (partial updates are not
/// supported), via a temp-file-and-rename so a crash mid-write never
/// leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Durably write the token, replacing any prior value in full.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Token` if the file cannot be written or renamed.
    pub fn save(&self, token: &Token) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::token(format!("Failed to create token directory: {e}"))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| AppError::token(format!("Failed to serialize token: {e}")))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .map_err(|e| AppError::token(format!("Failed to write token file: {e}")))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| AppError::token(format!("Failed to rename token file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!("saved tokens to {:?}", self.path);
        Ok(())
    }

    /// Load the persisted token, if any.
    ///
    /// Fails soft: a missing file or malformed content both report absence
    /// rather than raising, so a corrupted file simply forces
    /// re-authentication.
    #[must_use]
    pub fn load(&self) -> Option<Token> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(err) => {
                debug!("ignoring malformed token file {:?}: {err}", self.path);
                None
            }
        }
    }

    /// Remove the persisted token. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Token` if the file exists but cannot be removed.
    pub fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| AppError::token(format!("Failed to remove token file: {e}")))?;
            info!("cleared tokens at {:?}", self.path);
        }
        Ok(())
    }
}
