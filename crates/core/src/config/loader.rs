use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment prefix; `__` separates nesting levels.
const ENV_PREFIX: &str = "MODMIRROR_";

/// Load `path`, apply `MODMIRROR_*` overrides, and resolve relative data
/// and cache directories against the directory holding the file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    if let Some(base) = path.parent() {
        config.paths.data_dir = anchor(base, &config.paths.data_dir);
        config.paths.cache_dir = anchor(base, &config.paths.cache_dir);
    }
    Ok(config)
}

/// Parse TOML only: no environment, paths left as written.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn anchor(base: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[catalog]
categories = ["Mod"]

[http]
max_retries = 4
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.catalog.categories, vec!["Mod"]);
        assert_eq!(config.http.max_retries, 4);
        assert_eq!(config.http.backoff_step_secs, 5);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[http]
max_retries = "many"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[paths]
data_dir = "/srv/modmirror/data"

[schedule]
interval_secs = 60
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.paths.data_dir.to_str().unwrap(), "/srv/modmirror/data");
        assert_eq!(config.schedule.interval_secs, 60);
    }

    #[test]
    fn test_relative_dirs_follow_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("modmirror.toml");
        std::fs::write(
            &path,
            "[paths]\ndata_dir = \"state\"\ncache_dir = \"/var/cache/modmirror\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.paths.data_dir, dir.path().join("state"));
        assert_eq!(config.paths.cache_dir, PathBuf::from("/var/cache/modmirror"));
    }
}
