use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    load_config_or_default(path)
}

/// Like [`load_config`], but a missing file yields the defaults.
///
/// Environment overrides use the `TAMER_` prefix with `__` separating
/// sections, e.g. `TAMER_ENGINE__BACKEND=mock`.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TAMER_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[scheduler]
tick_secs = 15
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.scheduler.tick_secs, 15);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[scheduler]
tick_secs = "often"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/tamer.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_or_default_missing_file() {
        let config = load_config_or_default(Path::new("/nonexistent/tamer.toml")).unwrap();
        assert_eq!(config.monitor.refresh_ms, 1000);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
backend = "mock"
download_path = "/srv/downloads"

[backup]
dir = "/srv/backups"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.engine.download_path.to_str().unwrap(), "/srv/downloads");
        assert_eq!(config.backup.dir.to_str().unwrap(), "/srv/backups");
    }
}
