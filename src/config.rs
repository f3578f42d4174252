use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub supabase: SupabaseConfig,

    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://<ref>.supabase.co`
    pub url: String,

    pub anon_key: String,

    /// Needed only for admin operations (toggling the admin flag).
    /// Keep it out of shared config files; prefer `SUPABASE_SERVICE_ROLE_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_role_key: Option<String>,

    /// Where the signed-in session is kept between runs.
    /// Defaults to `<data dir>/ndt-hours/session.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u32,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            service_role_key: None,
            session_file: None,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin of the web front end; password-reset links point back here.
    pub site_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:5173".to_string(),
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies environment overrides
    /// (including any `.env` in the working directory).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Environment wins over the file: `SUPABASE_URL`, `SUPABASE_ANON_KEY`,
    /// `SUPABASE_SERVICE_ROLE_KEY`, `NDT_SITE_URL`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("SUPABASE_URL") {
            self.supabase.url = url;
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.supabase.anon_key = key;
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
            self.supabase.service_role_key = Some(key);
        }
        if let Some(site) = lookup("NDT_SITE_URL") {
            self.app.site_url = site;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ndt-hours").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".ndt-hours").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.supabase.url.trim().is_empty() {
            anyhow::bail!("supabase.url cannot be empty");
        }

        url::Url::parse(&self.supabase.url)
            .with_context(|| format!("Invalid supabase.url: {}", self.supabase.url))?;

        if self.supabase.anon_key.trim().is_empty() {
            anyhow::bail!("supabase.anon_key is not set (config.toml or SUPABASE_ANON_KEY)");
        }

        Ok(())
    }
}
