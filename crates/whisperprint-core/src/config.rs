//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of watermark copies embedded per document.
pub const DEFAULT_REDUNDANCY: usize = 5;

/// Decode confidence below which an identification is reported as no match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// Paths to all WhisperPrint data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Registry database (`data/whisperprint.db`).
    pub registry_db: PathBuf,
    /// Fingerprinted output files (`data/fingerprinted/`).
    pub fingerprinted: PathBuf,
    /// Risk weights and bands (`data/risk-config.json`).
    pub risk_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            registry_db: root.join("whisperprint.db"),
            fingerprinted: root.join("fingerprinted"),
            risk_config_file: root.join("risk-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.fingerprinted)?;
        Ok(())
    }
}

/// Watermark codec settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Copies of the payload embedded per document.
    pub redundancy: usize,
    /// Key mixed into the payload checksum. Empty means unkeyed.
    #[serde(skip_serializing)]
    pub secret: String,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            redundancy: DEFAULT_REDUNDANCY,
            secret: String::new(),
        }
    }
}

/// Top-level WhisperPrint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperPrintConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Watermark codec settings.
    pub codec: CodecSettings,
    /// Minimum decode confidence for a positive identification.
    pub match_threshold: f64,
}

impl WhisperPrintConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let redundancy = std::env::var("WHISPERPRINT_REDUNDANCY")
            .ok()
            .and_then(|r| r.parse::<usize>().ok())
            .unwrap_or(DEFAULT_REDUNDANCY)
            .clamp(1, 32);

        let secret = std::env::var("WHISPERPRINT_SECRET").unwrap_or_default();

        let match_threshold = std::env::var("WHISPERPRINT_MATCH_THRESHOLD")
            .ok()
            .and_then(|t| t.parse::<f64>().ok())
            .filter(|t| t.is_finite())
            .unwrap_or(DEFAULT_MATCH_THRESHOLD)
            .clamp(0.0, 1.0);

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            codec: CodecSettings { redundancy, secret },
            match_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path().join("data")).unwrap();
        assert!(paths.fingerprinted.is_dir());
        assert_eq!(paths.registry_db, dir.path().join("data/whisperprint.db"));
        assert_eq!(paths.risk_config_file, dir.path().join("data/risk-config.json"));
    }

    #[test]
    fn test_codec_secret_not_serialized() {
        let settings = CodecSettings {
            redundancy: 3,
            secret: "hunter2".into(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
