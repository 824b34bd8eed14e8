use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve the data directory, honouring a `--db` override for the database file.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "culinary").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = match db_override {
            Some(path) => path,
            None => data_dir.join("culinary.db"),
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        Ok(Config { db_path, data_dir })
    }

    pub fn api_key_path(&self) -> PathBuf {
        self.data_dir.join("api_key")
    }

    /// Read the server API key, generating and storing one on first use.
    ///
    /// Returns `(key, created)`.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        let path = self.api_key_path();

        if let Ok(stored) = std::fs::read_to_string(&path) {
            let stored = stored.trim();
            if !stored.is_empty() {
                return Ok((stored.to_string(), false));
            }
        }

        let key = generate_api_key();
        std::fs::write(&path, &key)
            .with_context(|| format!("Failed to write API key file: {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        tracing::info!(path = %path.display(), "generated API key");
        Ok((key, true))
    }
}

/// 32 random bytes, hex encoded.
fn generate_api_key() -> String {
    use rand::Rng;
    use std::fmt::Write;

    let bytes: [u8; 32] = rand::rng().random();
    bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc: String, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_is_hex() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn test_api_key_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("culinary.db"),
            data_dir: dir.path().to_path_buf(),
        };

        let (first, created) = config.load_or_create_api_key().unwrap();
        assert!(created);
        let (second, created) = config.load_or_create_api_key().unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }
}
