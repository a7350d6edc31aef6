//! File-backed access-key storage (`~/.nginxpulse/access-key` by default).
//!
//! The key is re-read on every request. Read failures are treated as "no
//! key" so a missing or unreadable file never blocks a query; the backend's
//! 401 is what tells the user a key is needed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{CredentialProvider, clean_key};

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.nginxpulse/access-key`, if a home directory exists.
    pub fn default_location() -> Option<Self> {
        default_key_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `key`, creating the parent directory as needed.
    pub fn save(&self, key: &str) -> Result<()> {
        let key = clean_key(key).context("access key must not be blank")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create key directory {}", parent.display())
            })?;
        }
        let mut file = open_key_file(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        // An existing file keeps its mode on open, so tighten it before writing.
        restrict_permissions(&self.path)?;
        writeln!(file, "{key}")
            .with_context(|| format!("failed to write access key to {}", self.path.display()))?;

        Ok(())
    }

    /// Remove the stored key. Returns `false` if there was none.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}

impl CredentialProvider for FileCredentialStore {
    fn access_key(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        clean_key(&raw)
    }
}

/// `~/.nginxpulse/access-key`.
pub fn default_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".nginxpulse").join("access-key"))
}

/// Open for writing, truncating. New files are created owner-only.
#[cfg(unix)]
fn open_key_file(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_key_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
