//! Local user profile storage.
//!
//! The profile lives in a small JSON key-value file under the `user_profile`
//! key. Other keys in the file are preserved on save.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PROFILE_STORAGE_KEY;
use crate::error::{AppError, Result};

/// Name and email attached to every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

impl UserProfile {
    /// Build a profile from user input, trimming both fields.
    pub fn new(name: &str, email: &str) -> Result<Self> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(AppError::Validation("Name and email are both required".into()));
        }
        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored profile. A missing file or key means no profile yet,
    /// and an unreadable or malformed file is logged and treated the same way.
    pub fn load(&self) -> Result<Option<UserProfile>> {
        let map = match self.read_map() {
            Ok(Some(map)) => map,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable profile file");
                return Ok(None);
            }
        };

        match map.get(PROFILE_STORAGE_KEY) {
            Some(value) => match serde_json::from_value::<UserProfile>(value.clone()) {
                Ok(profile) => Ok(Some(profile)),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Ignoring malformed stored profile");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Validate and persist a profile, returning what was stored.
    pub fn save(&self, name: &str, email: &str) -> Result<UserProfile> {
        let profile = UserProfile::new(name, email)?;

        // A corrupt file is replaced; IO failures still surface
        let mut map = match self.read_map() {
            Ok(map) => map.unwrap_or_default(),
            Err(AppError::Io(e)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Replacing unreadable profile file");
                Map::new()
            }
        };
        map.insert(PROFILE_STORAGE_KEY.to_string(), serde_json::to_value(&profile)?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map))?)?;

        tracing::info!(path = %self.path.display(), name = %profile.name, "Profile saved");
        Ok(profile)
    }

    fn read_map(&self) -> Result<Option<Map<String, Value>>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Some(Map::new()));
        }

        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(AppError::Validation(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profile.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("nested/dir/profile.json"));

        let saved = store.save("  Anna ", " anna@example.com ").unwrap();
        assert_eq!(saved.name, "Anna");
        assert_eq!(saved.email, "anna@example.com");
        assert_eq!(store.load().unwrap(), Some(saved));
    }

    #[test]
    fn test_save_rejects_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profile.json"));
        assert!(matches!(store.save("Anna", "   "), Err(AppError::Validation(_))));
        assert!(matches!(store.save("", "a@b"), Err(AppError::Validation(_))));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let store = ProfileStore::new(&path);
        store.save("Anna", "anna@example.com").unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["user_profile"]["name"], "Anna");
    }

    #[test]
    fn test_malformed_profile_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"user_profile": "oops"}"#).unwrap();
        assert_eq!(ProfileStore::new(&path).load().unwrap(), None);
    }

    #[test]
    fn test_non_object_profile_file_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let store = ProfileStore::new(&path);

        for contents in ["[1, 2, 3]", "\"just a string\"", "{not json"] {
            std::fs::write(&path, contents).unwrap();
            assert_eq!(store.load().unwrap(), None);
        }

        let saved = store.save("Anna", "anna@example.com").unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
    }
}
