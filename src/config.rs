use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::spectral::DEFAULT_HF_SPLIT_HZ;
use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "spectral-audit.toml";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_hf_split_hz")]
    pub hf_split_hz: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Worker threads; `None` uses the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_result_queue_capacity")]
    pub result_queue_capacity: usize,
    /// Matched case-insensitively, without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            hop_size: default_hop_size(),
            hf_split_hz: default_hf_split_hz(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_capacity: default_queue_capacity(),
            result_queue_capacity: default_result_queue_capacity(),
            extensions: default_extensions(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            batch_size: default_batch_size(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 2 {
            return Err(ConfigError::WindowTooSmall(self.window_size));
        }
        if self.hop_size == 0 {
            return Err(ConfigError::ZeroHop);
        }
        if !self.hf_split_hz.is_finite() || self.hf_split_hz <= 0.0 {
            return Err(ConfigError::InvalidSplit(self.hf_split_hz));
        }
        Ok(())
    }
}

impl PipelineConfig {
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::NoExtensions);
        }
        Ok(())
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.pipeline.validate()?;
        self.store.validate()
    }
}

fn default_window_size() -> usize { 2048 }
fn default_hop_size() -> usize { 256 }
fn default_hf_split_hz() -> f64 { DEFAULT_HF_SPLIT_HZ }
fn default_queue_capacity() -> usize { 32 }
fn default_result_queue_capacity() -> usize { 256 }
fn default_extensions() -> Vec<String> { vec!["mp3".into()] }
fn default_database() -> PathBuf { PathBuf::from("spectral_audit.db") }
fn default_batch_size() -> usize { 500 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Explicit path first, then `./spectral-audit.toml`, then the per-user
/// config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("spectral-audit").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("spectral-audit").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.window_size, 2048);
        assert_eq!(config.analysis.hop_size, 256);
        assert_eq!(config.analysis.hf_split_hz, 2000.0);
        assert_eq!(config.store.batch_size, 500);
        assert!(config.pipeline.worker_count() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            hop_size = 512

            [pipeline]
            workers = 0
            extensions = ["mp3", ".FLAC"]
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.window_size, 2048);
        assert_eq!(config.analysis.hop_size, 512);
        assert_eq!(config.pipeline.worker_count(), 1);
        assert_eq!(config.pipeline.queue_capacity, 32);
        assert_eq!(config.store.database, PathBuf::from("spectral_audit.db"));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let pipeline = PipelineConfig {
            extensions: vec!["mp3".into(), ".flac".into()],
            ..Default::default()
        };
        assert!(pipeline.matches_extension(Path::new("a/b/Song.MP3")));
        assert!(pipeline.matches_extension(Path::new("x.Flac")));
        assert!(!pipeline.matches_extension(Path::new("cover.jpg")));
        assert!(!pipeline.matches_extension(Path::new("README")));
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let mut config = Config::default();
        config.analysis.window_size = 1;
        assert_eq!(config.validate(), Err(ConfigError::WindowTooSmall(1)));

        let mut config = Config::default();
        config.store.batch_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatch));

        let mut config = Config::default();
        config.pipeline.extensions = vec![".".into()];
        assert_eq!(config.validate(), Err(ConfigError::NoExtensions));

        let mut config = Config::default();
        config.analysis.hf_split_hz = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSplit(_))));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[analysis\nwindow_size = ").unwrap();
        assert!(load_config(&path).is_err());

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[store]\nbatch_size = 10\n").unwrap();
        assert_eq!(load_config(&good).unwrap().store.batch_size, 10);
        assert_eq!(find_config(Some(&good)), Some(good.clone()));
    }
}
