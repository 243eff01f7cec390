use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use medicare_types::models::{Role, User};

use crate::error::Result;

/// Persisted session blob.
pub const SESSION_KEY: &str = "session";
/// Profile of the signed-in user, read by the dashboards on mount.
pub const PROFILE_KEY: &str = "patientDetails";

/// Small JSON blobs under fixed keys, one file per key: `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

/// The subset of the user record the dashboards need before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl From<&User> for CachedProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// `None` when the key was never written. A blob that no longer parses
    /// is treated the same way and removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding corrupt local blob '{}': {}", key, e);
                self.remove(key)?;
                Ok(None)
            }
        }
    }

    /// Write through a temp file so a crash never leaves half a blob.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
