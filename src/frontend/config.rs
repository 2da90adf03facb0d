use crate::codec::{Codec, DEFAULT_MAX_BUFFER_BYTES};
use crate::errors::{ConfigError, StoreError};
use crate::store::{FileStore, MemoryStore, Store};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_FILE: &str = ".deferrc.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub codec: CodecConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: u64,

    #[serde(default = "default_true")]
    pub verify_signatures: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    #[serde(default)]
    pub compress: bool,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            verify_signatures: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            directory: default_directory(),
            compress: false,
            compression_level: default_compression_level(),
        }
    }
}

fn default_true() -> bool { true }
fn default_max_buffer_bytes() -> u64 { DEFAULT_MAX_BUFFER_BYTES }
fn default_compression_level() -> i32 { 3 }
fn default_directory() -> PathBuf { std::env::temp_dir().join("deferred-call") }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Find `.deferrc.toml` in the current directory or its parents
    ///
    /// Falls back to defaults when no readable config is found.
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(err) => {
                        tracing::warn!(path = %config_path.display(), error = %err, "Ignoring config file");
                    }
                }
            }
            current = dir.parent().map(Path::to_path_buf);
        }

        Self::default()
    }

    pub fn codec(&self) -> Codec {
        Codec::new()
            .with_max_buffer_bytes(self.codec.max_buffer_bytes)
            .with_signature_verification(self.codec.verify_signatures)
    }

    /// Open the configured store backend
    pub fn open_store(&self) -> Result<Arc<dyn Store>, StoreError> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::File => {
                let mut store = FileStore::new(&self.store.directory)?;
                if self.store.compress {
                    store = store.with_compression(self.store.compression_level);
                }
                Ok(Arc::new(store))
            }
        }
    }

    /// Default configuration as TOML
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, content).map_err(ConfigError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.codec.verify_signatures);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.codec().max_buffer_bytes(), DEFAULT_MAX_BUFFER_BYTES);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[codec]
max_buffer_bytes = 1024
verify_signatures = false

[store]
backend = "file"
directory = "/var/tmp/calls"
compress = true
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.codec.max_buffer_bytes, 1024);
        assert!(!config.codec().verifies_signatures());
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.store.directory, PathBuf::from("/var/tmp/calls"));
        assert!(config.store.compress);
        assert_eq!(config.store.compression_level, 3);
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        assert!(matches!(
            Config::parse("[store]\nbackend = \"s3\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.store.backend = StoreBackend::File;
        config.store.directory = dir.path().join("calls");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.open_store().is_ok());
        assert!(dir.path().join("calls").is_dir());
    }

    #[test]
    fn test_generate_default_parses() {
        let text = Config::generate_default();
        assert_eq!(Config::parse(&text).unwrap(), Config::default());
    }
}
