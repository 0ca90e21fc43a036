use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP service settings
    pub server: ServerConfig,

    /// Download storage settings
    pub storage: StorageConfig,

    /// External extractor settings
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Allow cross-origin requests (the web frontend runs on another port)
    pub enable_cors: bool,

    /// Per-request timeout in seconds; must cover the extraction itself
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for in-flight output files, created at startup if absent
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path or name of the yt-dlp binary
    pub yt_dlp_path: String,

    /// Container format for audio-only extraction
    pub audio_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                enable_cors: true,
                timeout_secs: 300,
            },
            storage: StorageConfig {
                download_dir: PathBuf::from("download"),
            },
            extractor: ExtractorConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                audio_format: "mp3".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tubefetch").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.extractor.yt_dlp_path.is_empty() {
            anyhow::bail!("Extractor binary path must not be empty");
        }

        if self.extractor.audio_format.is_empty() {
            anyhow::bail!("Audio format must not be empty");
        }

        if self.server.timeout_secs == 0 {
            anyhow::bail!("Request timeout must be at least one second");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  CORS: {}", self.server.enable_cors);
        println!("  Request Timeout: {}s", self.server.timeout_secs);
        println!("  Download Dir: {}", self.storage.download_dir.display());
        println!("  yt-dlp: {}", self.extractor.yt_dlp_path);
        println!("  Audio Format: {}", self.extractor.audio_format);
    }
}

impl ServerConfig {
    /// Resolved listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid listen address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.storage.download_dir, config.storage.download_dir);
    }

    #[test]
    fn test_rejects_empty_extractor_path() {
        let mut config = Config::default();
        config.extractor.yt_dlp_path.clear();
        assert!(config.validate().is_err());
    }
}
