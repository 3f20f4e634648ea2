use crate::models::AppConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the application configuration inside the config directory
pub const APP_CONFIG_FILE: &str = "Scrutinizer Config.yaml";

/// Prefix of environment variables overriding [`AppConfig`] fields
pub const ENV_PREFIX: &str = "SCRUTINIZER";

/// Configuration manager for the application configuration and the files
/// stored next to it (default workspace, recent file database).
///
/// Values are layered: built-in defaults, then `Scrutinizer Config.yaml`,
/// then `SCRUTINIZER_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    app_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding the configuration, created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            app_config_path: config_dir.join(APP_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the application configuration.
    ///
    /// A missing file is not an error; the defaults and environment still apply.
    pub fn load_app_config(&self) -> Result<AppConfig> {
        if !self.app_config_path.exists() {
            tracing::warn!(
                "App config file not found at {}, using defaults",
                self.app_config_path
            );
        }

        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to build default app config")?;

        let layered = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(self.app_config_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read app config: {}", self.app_config_path))?;

        let config: AppConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse app config: {}", self.app_config_path))?;

        tracing::info!("Loaded app config from {}", self.app_config_path);
        Ok(config)
    }

    /// Save the application configuration.
    ///
    /// # Arguments
    /// * `config` - The AppConfig to save
    pub fn save_app_config(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize app config to YAML")?;

        fs::write(&self.app_config_path, yaml_string)
            .with_context(|| format!("Failed to write app config: {}", self.app_config_path))?;

        tracing::info!("Saved app config to {}", self.app_config_path);
        Ok(())
    }

    /// Path of the default workspace file
    pub fn default_workspace_path(&self, config: &AppConfig) -> Utf8PathBuf {
        self.config_dir.join(&config.default_workspace)
    }

    /// Path of the recent file database, next to the default workspace
    pub fn recent_file_db_path(&self, config: &AppConfig) -> Utf8PathBuf {
        let workspace = self.default_workspace_path(config);
        match workspace.parent() {
            Some(dir) => dir.join(&config.recent_file_db),
            None => self.config_dir.join(&config.recent_file_db),
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn app_config_path(&self) -> &Utf8Path {
        &self.app_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.app_config_path().ends_with(APP_CONFIG_FILE));
    }

    #[test]
    fn test_load_save_app_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let config = AppConfig {
            recent_file_max: 7,
            default_workspace: "mine.lsz".to_string(),
            ..AppConfig::default()
        };
        manager.save_app_config(&config).unwrap();

        let loaded = manager.load_app_config().unwrap();
        assert_eq!(loaded.recent_file_max, 7);
        assert_eq!(loaded.default_workspace, "mine.lsz");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let loaded = manager.load_app_config().unwrap();
        assert_eq!(loaded.default_workspace, AppConfig::default().default_workspace);
    }

    #[test]
    fn test_derived_paths() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = AppConfig::default();

        assert_eq!(
            manager.default_workspace_path(&config),
            manager.config_dir().join("default_workspace.lsz")
        );
        assert_eq!(
            manager.recent_file_db_path(&config),
            manager.config_dir().join("recent_files.rcnt")
        );
    }
}
