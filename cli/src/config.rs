use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const DEFAULT_AI_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "openai/gpt-oss-20b:free";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "psmf").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("psmf.db");

        Ok(Config { db_path, data_dir })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

/// Where and how to reach the nutrition-analysis model.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub url: String,
    pub model: String,
}

impl AiSettings {
    /// Read `PSMF_AI_API_KEY`, `PSMF_AI_URL` and `PSMF_AI_MODEL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let api_key = non_empty("PSMF_AI_API_KEY")
            .context("PSMF_AI_API_KEY is not set. Export an OpenRouter (or compatible) API key")?;
        Ok(Self {
            api_key,
            url: non_empty("PSMF_AI_URL").unwrap_or_else(|| DEFAULT_AI_URL.to_string()),
            model: non_empty("PSMF_AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_ai_settings_defaults() {
        let s = AiSettings::from_lookup(lookup(&[("PSMF_AI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(s.api_key, "sk-test");
        assert_eq!(s.url, DEFAULT_AI_URL);
        assert_eq!(s.model, DEFAULT_AI_MODEL);
    }

    #[test]
    fn test_ai_settings_overrides() {
        let s = AiSettings::from_lookup(lookup(&[
            ("PSMF_AI_API_KEY", "sk-test"),
            ("PSMF_AI_URL", "http://localhost:11434/v1/chat/completions"),
            ("PSMF_AI_MODEL", "llama3"),
        ]))
        .unwrap();
        assert_eq!(s.url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(s.model, "llama3");
    }

    #[test]
    fn test_ai_settings_requires_key() {
        assert!(AiSettings::from_lookup(lookup(&[])).is_err());
        assert!(AiSettings::from_lookup(lookup(&[("PSMF_AI_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_api_key_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("psmf.db"),
            data_dir: dir.path().to_path_buf(),
        };
        let (key, new) = config.load_or_create_api_key().unwrap();
        assert!(new);
        assert_eq!(key.len(), 64);
        let (again, new) = config.load_or_create_api_key().unwrap();
        assert!(!new);
        assert_eq!(again, key);
    }
}
