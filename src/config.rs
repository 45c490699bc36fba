use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "EngineConfig::default_num_channels")]
    pub num_channels: usize,
    #[serde(default = "EngineConfig::default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "EngineConfig::default_stream_unit")]
    pub stream_unit: usize,
}

impl EngineConfig {
    fn default_sample_rate() -> u32 {
        44_100
    }
    fn default_num_channels() -> usize {
        8
    }
    fn default_queue_size() -> usize {
        8
    }
    fn default_stream_unit() -> usize {
        1 << 11
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::default_sample_rate(),
            num_channels: Self::default_num_channels(),
            queue_size: Self::default_queue_size(),
            stream_unit: Self::default_stream_unit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,
}

impl CacheConfig {
    fn default_capacity() -> usize {
        256
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Read the config at `path`, or write the defaults there and return
    /// them. Parse failures fall back to defaults with a message rather
    /// than aborting the experiment.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        eprintln!("Failed to parse config {path}: {err}. Using defaults.");
                    }
                },
                Err(err) => {
                    eprintln!("Failed to read config {path}: {err}. Using defaults.");
                }
            }
            return Self::default();
        }

        // File does not exist: write defaults and return them.
        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, text) {
                    eprintln!("Failed to write default config to {path}: {err}");
                }
            }
            Err(_) => {
                eprintln!("Failed to serialize default config; continuing with defaults");
            }
        }
        default_cfg
    }
}
