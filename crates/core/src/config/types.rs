use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Where snapshots and downloads live on disk
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding every persisted snapshot file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Scratch directory for the per-run download cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

/// Inclusive range a rotating page-size counter wraps within.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PageSizeRange {
    pub min: u32,
    pub max: u32,
}

impl PageSizeRange {
    /// Advance `current` by one, wrapping back to `min` past `max`.
    ///
    /// Values outside the range (e.g. after a config change) restart at `min`.
    pub fn next(&self, current: u32) -> u32 {
        let next = current.saturating_add(1);
        if next < self.min || next > self.max {
            self.min
        } else {
            next
        }
    }
}

/// Upstream catalog (GameBanana) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// API base URL (default: https://gamebanana.com/apiv11).
    #[serde(default = "default_catalog_url")]
    pub base_url: String,
    /// Game the crawled categories belong to.
    #[serde(default = "default_game_id")]
    pub game_id: u32,
    /// Item types crawled on every sweep.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Page-size rotation for full sweeps.
    #[serde(default = "default_full_page_size")]
    pub full_page_size: PageSizeRange,
    /// Page-size rotation for incremental sweeps.
    #[serde(default = "default_incremental_page_size")]
    pub incremental_page_size: PageSizeRange,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            game_id: default_game_id(),
            categories: default_categories(),
            user_agent: default_user_agent(),
            full_page_size: default_full_page_size(),
            incremental_page_size: default_incremental_page_size(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://gamebanana.com/apiv11".to_string()
}

fn default_game_id() -> u32 {
    6460
}

fn default_categories() -> Vec<String> {
    vec!["Mod".to_string(), "Tool".to_string(), "Wip".to_string()]
}

fn default_user_agent() -> String {
    format!("modmirror/{}", env!("CARGO_PKG_VERSION"))
}

fn default_full_page_size() -> PageSizeRange {
    PageSizeRange { min: 40, max: 50 }
}

fn default_incremental_page_size() -> PageSizeRange {
    PageSizeRange { min: 1, max: 50 }
}

/// Timeouts and retry policy shared by every network call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Retries after the first attempt (default: 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before retry n is n * step.
    #[serde(default = "default_backoff_step")]
    pub backoff_step_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            max_retries: default_max_retries(),
            backoff_step_secs: default_backoff_step(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_step() -> u64 {
    5
}

/// Remote mirror (FTP) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorConfig {
    /// When disabled, synchronizers are skipped entirely.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    #[serde(default = "default_icon_dir")]
    pub icon_dir: String,
    /// Public URL prefix mirrored archives are served from.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_ftp_port(),
            username: String::new(),
            password: String::new(),
            archive_dir: default_archive_dir(),
            image_dir: default_image_dir(),
            icon_dir: default_icon_dir(),
            public_base_url: default_public_base_url(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
        }
    }
}

fn default_ftp_port() -> u16 {
    21
}

fn default_archive_dir() -> String {
    "banana-mirror".to_string()
}

fn default_image_dir() -> String {
    "banana-mirror-images".to_string()
}

fn default_icon_dir() -> String {
    "rich-presence-icons".to_string()
}

fn default_public_base_url() -> String {
    "https://celestemodupdater.0x0a.de/banana-mirror".to_string()
}

fn default_thumbnail_width() -> u32 {
    220
}

fn default_thumbnail_height() -> u32 {
    124
}

/// Sources for the vanilla plugin-entity baseline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginsConfig {
    #[serde(default = "default_ahorn_url")]
    pub ahorn_vanilla_url: String,
    #[serde(default = "default_loenn_url")]
    pub loenn_vanilla_url: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            ahorn_vanilla_url: default_ahorn_url(),
            loenn_vanilla_url: default_loenn_url(),
        }
    }
}

fn default_ahorn_url() -> String {
    "https://github.com/CelestialCartographers/Ahorn/archive/refs/heads/master.zip".to_string()
}

fn default_loenn_url() -> String {
    "https://github.com/CelestialCartographers/Loenn/archive/refs/heads/main.zip".to_string()
}

/// Run scheduling (used by the daemon loop)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Seconds between two runs.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Every Nth run is a full sweep; the others are incremental.
    #[serde(default = "default_full_sweep_every")]
    pub full_sweep_every: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            full_sweep_every: default_full_sweep_every(),
        }
    }
}

fn default_interval() -> u64 {
    900 // 15 minutes
}

fn default_full_sweep_every() -> u32 {
    16
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub paths: PathsConfig,
    pub catalog: CatalogConfig,
    pub http: HttpConfig,
    pub mirror: SanitizedMirrorConfig,
    pub plugins: PluginsConfig,
    pub schedule: ScheduleConfig,
}

/// Sanitized mirror config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMirrorConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password_configured: bool,
    pub public_base_url: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            paths: config.paths.clone(),
            catalog: config.catalog.clone(),
            http: config.http.clone(),
            mirror: SanitizedMirrorConfig {
                enabled: config.mirror.enabled,
                host: config.mirror.host.clone(),
                port: config.mirror.port,
                username: config.mirror.username.clone(),
                password_configured: !config.mirror.password.is_empty(),
                public_base_url: config.mirror.public_base_url.clone(),
            },
            plugins: config.plugins.clone(),
            schedule: config.schedule.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.paths.data_dir.to_str().unwrap(), "data");
        assert_eq!(config.catalog.game_id, 6460);
        assert_eq!(config.catalog.categories, vec!["Mod", "Tool", "Wip"]);
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(config.http.read_timeout_secs, 30);
        assert_eq!(config.http.max_retries, 2);
        assert!(!config.mirror.enabled);
    }

    #[test]
    fn test_deserialize_mirror_section() {
        let toml = r#"
[mirror]
enabled = true
host = "ftp.example.org"
username = "mirror"
password = "hunter2"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.mirror.enabled);
        assert_eq!(config.mirror.port, 21);
        assert_eq!(config.mirror.archive_dir, "banana-mirror");
        assert_eq!(config.mirror.thumbnail_width, 220);
    }

    #[test]
    fn test_page_size_range_wraps() {
        let range = PageSizeRange { min: 40, max: 50 };
        assert_eq!(range.next(40), 41);
        assert_eq!(range.next(49), 50);
        assert_eq!(range.next(50), 40);
        // out-of-range values restart at the minimum
        assert_eq!(range.next(0), 40);
        assert_eq!(range.next(120), 40);
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let mut config = Config::default();
        config.mirror.password = "secret".to_string();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.mirror.password_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
