//! Configuration types for the importer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How to launch and talk to the external numeric engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable of the engine bridge process
    #[serde(default = "default_engine_command")]
    pub command: String,

    /// Extra arguments passed to the bridge
    #[serde(default)]
    pub args: Vec<String>,

    /// Directory (searched recursively by the engine) holding the plotting functions
    #[serde(default)]
    pub functions_path: Option<PathBuf>,

    /// How long to wait for the engine handshake, in seconds
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_engine_command() -> String {
    "matlab-bridge".to_string()
}

fn default_startup_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
            functions_path: None,
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

/// Reading and previewing source files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Rows shown by `preview`
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_preview_rows() -> usize {
    20
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
        }
    }
}

/// Lowest and highest accepted sample rates, in Hz.
pub const SAMPLE_RATE_RANGE: (f64, f64) = (1.0, 10_000.0);

/// Plot requests sent to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[serde(default = "default_time_title")]
    pub time_title: String,

    #[serde(default = "default_spectrum_title")]
    pub spectrum_title: String,
}

fn default_sample_rate() -> f64 {
    1000.0
}

fn default_time_title() -> String {
    "Time-domain waveform".to_string()
}

fn default_spectrum_title() -> String {
    "Power spectrum".to_string()
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            time_title: default_time_title(),
            spectrum_title: default_spectrum_title(),
        }
    }
}

/// Clamp a sample rate into [`SAMPLE_RATE_RANGE`]. NaN falls back to the default.
pub fn clamp_sample_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return default_sample_rate();
    }
    rate.clamp(SAMPLE_RATE_RANGE.0, SAMPLE_RATE_RANGE.1)
}

/// Top-level configuration combining all sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
