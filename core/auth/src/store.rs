//! File-backed credential cache.
//!
//! The cache is a single JSON file at `<cache_dir>/<escaped file name>`,
//! relative to the working directory. Each call opens, fully reads or writes,
//! and closes the file. Concurrent writers are not supported: two processes
//! saving at once may leave either credential on disk.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use driveup_common::{Credential, Error, Result};

use crate::config::AuthSettings;

/// Characters left as-is when escaping the cache file name, matching URL
/// query escaping.
const FILE_NAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Reads and writes the cached credential at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store for `<cache_dir>/<escaped cache_file>`.
    pub fn new(cache_dir: impl AsRef<Path>, cache_file: &str) -> Self {
        let file_name = utf8_percent_encode(cache_file, FILE_NAME_SAFE).to_string();
        Self {
            path: cache_dir.as_ref().join(file_name),
        }
    }

    /// Create a store from the authorization settings.
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(Path::new(".").join(&settings.cache_dir), &settings.cache_file)
    }

    /// Create a store at a specific path (useful for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached credential.
    ///
    /// # Errors
    /// - `CacheMiss` if the file does not exist
    /// - `CacheCorrupt` if it cannot be read or decoded, including when empty
    pub fn load(&self) -> Result<Credential> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::CacheMiss(self.path.clone()));
            }
            Err(e) => {
                return Err(Error::CacheCorrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let credential: Credential =
            serde_json::from_slice(&data).map_err(|e| Error::CacheCorrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!("Loaded cached credential from {}", self.path.display());
        Ok(credential)
    }

    /// Persist a credential, replacing any existing cache file.
    ///
    /// The parent directory is created owner-only and the file is written
    /// owner read/write on Unix.
    ///
    /// # Errors
    /// - `PersistFailure` if the directory or file cannot be written
    pub fn save(&self, credential: &Credential) -> Result<()> {
        info!("Saving credential file to: {}", self.path.display());

        self.write(credential).map_err(|source| Error::PersistFailure {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, credential: &Credential) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_private_dir(parent)?;
            }
        }

        let data = serde_json::to_vec_pretty(credential)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(&data)?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
