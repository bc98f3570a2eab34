use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Chrome user-data directory for one browser session
pub struct ProfileManager {
    path: PathBuf,
    is_temporary: bool,
}

impl ProfileManager {
    /// A throwaway profile, deleted on drop
    pub fn temporary() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("waypoint-profile-")
            .tempdir()?
            .keep();

        tracing::debug!("Using temporary profile: {}", path.display());
        Ok(Self {
            path,
            is_temporary: true,
        })
    }

    /// A named profile under `~/.waypoint/profiles`, kept between runs
    pub fn named(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Launch(format!("Invalid profile name: {:?}", name)));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Launch("Could not determine home directory".to_string()))?;
        Self::persistent(home.join(".waypoint").join("profiles").join(name))
    }

    /// A profile at an explicit path, created if missing
    pub fn persistent(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
        }

        tracing::debug!("Using persistent profile: {}", path.display());
        Ok(Self {
            path,
            is_temporary: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }
}

impl Drop for ProfileManager {
    fn drop(&mut self) {
        if self.is_temporary && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                tracing::debug!("Failed to remove temporary profile {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_profile_creates_and_cleans_up() {
        let profile = ProfileManager::temporary().unwrap();
        let path = profile.path().to_path_buf();

        assert!(path.is_dir());
        assert!(profile.is_temporary());

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn test_persistent_profile_survives_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile_path = temp_dir.path().join("nested").join("work");

        let profile = ProfileManager::persistent(profile_path.clone()).unwrap();
        assert!(profile_path.is_dir());
        assert!(!profile.is_temporary());

        drop(profile);
        assert!(profile_path.exists());
    }

    #[test]
    fn test_named_profile_rejects_paths() {
        assert!(ProfileManager::named("../escape").is_err());
        assert!(ProfileManager::named("").is_err());
    }
}
