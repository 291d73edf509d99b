// Storage Module
// Raw persistence seam for the serialized WiFi profile
// The firmware backs this with NVS, host tools and tests with a plain file

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

/// Default file name of the stored profile
pub const PROFILE_FILE_NAME: &str = "wifi_config.json";

/// Durable home of the serialized profile. Single writer, no locking.
pub trait ProfileStorage {
    /// `Ok(None)` when nothing has been stored yet
    fn read(&mut self) -> Result<Option<String>>;

    /// Replace any previous contents
    fn write(&mut self, contents: &str) -> Result<()>;

    /// Remove the stored profile; succeeds when already absent
    fn remove(&mut self) -> Result<()>;
}

/// Profile kept in a single JSON file, replaced via rename on every write
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Profile file named [`PROFILE_FILE_NAME`] inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(PROFILE_FILE_NAME))
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

impl ProfileStorage for FileStorage {
    fn read(&mut self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No profile file at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    fn write(&mut self, contents: &str) -> Result<()> {
        let staging = self.staging_path();
        fs::write(&staging, contents)
            .with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        info!("Profile written to {}", self.path.display());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Profile file {} removed", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}
