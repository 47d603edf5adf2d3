use crate::batch::{BatchingMode, NO_BATCH_LABEL};
use crate::pairwise::{PairScope, PairwiseOptions};
use crate::statistics::{DEFAULT_Z_CRITICAL, MIN_CASES_FOR_INFERENCE};
use crate::tagging::DEFAULT_TAG_ATTRIBUTE;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use mvextras_cli::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read and parse `config.toml` from this directory. Missing file gives defaults.
    pub fn load_config_file(&self) -> Result<AppConfig> {
        let config_path = self.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub statistics: StatisticsConfig,
    pub pairwise: PairwiseConfig,
    pub batching: BatchingConfig,
    pub tagging: TaggingConfig,
    pub output: OutputConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub skip_rows: Option<usize>,
    pub null_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub z_critical: f64,
    pub min_complete_cases: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PairwiseConfig {
    pub scope: PairScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub mode: BatchingMode,
    pub no_batch_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    pub attribute_name: String,
    pub group_a: String,
    pub group_b: String,
    pub selected: String,
    pub not_selected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// "text", "csv" or "json"
    pub format: String,
    /// Decimal places in the text table
    pub precision: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

// Default implementations
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            statistics: StatisticsConfig::default(),
            pairwise: PairwiseConfig::default(),
            batching: BatchingConfig::default(),
            tagging: TaggingConfig::default(),
            output: OutputConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            z_critical: DEFAULT_Z_CRITICAL,
            min_complete_cases: MIN_CASES_FOR_INFERENCE,
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            mode: BatchingMode::ByBatch,
            no_batch_label: NO_BATCH_LABEL.to_string(),
        }
    }
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            attribute_name: DEFAULT_TAG_ATTRIBUTE.to_string(),
            group_a: "A".to_string(),
            group_b: "B".to_string(),
            selected: "selected".to_string(),
            not_selected: "not selected".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            precision: 4,
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Load configuration with the user layer read from `manager`'s directory
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        config.merge(manager.load_config_file()?);
        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.file_loading.merge(other.file_loading);
        self.statistics.merge(other.statistics);
        self.pairwise.merge(other.pairwise);
        self.batching.merge(other.batching);
        self.tagging.merge(other.tagging);
        self.output.merge(other.output);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if !(self.statistics.z_critical.is_finite() && self.statistics.z_critical > 0.0) {
            return Err(eyre!(
                "z_critical must be a positive number, got {}",
                self.statistics.z_critical
            ));
        }

        if self.statistics.min_complete_cases < MIN_CASES_FOR_INFERENCE {
            return Err(eyre!(
                "min_complete_cases must be at least {}",
                MIN_CASES_FOR_INFERENCE
            ));
        }

        if self.tagging.attribute_name.trim().is_empty() {
            return Err(eyre!("tagging.attribute_name must not be empty"));
        }

        self.output.output_format()?;

        Ok(())
    }

    /// Pairwise table options from the statistics and pairwise sections
    pub fn pairwise_options(&self) -> PairwiseOptions {
        PairwiseOptions {
            z_critical: self.statistics.z_critical,
            scope: self.pairwise.scope,
            min_complete_cases: self.statistics.min_complete_cases,
        }
    }
}

// Merge implementations for each config section
impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.skip_rows.is_some() {
            self.skip_rows = other.skip_rows;
        }
        if other.null_values.is_some() {
            self.null_values = other.null_values;
        }
    }
}

impl StatisticsConfig {
    pub fn merge(&mut self, other: Self) {
        let default = StatisticsConfig::default();
        if other.z_critical != default.z_critical {
            self.z_critical = other.z_critical;
        }
        if other.min_complete_cases != default.min_complete_cases {
            self.min_complete_cases = other.min_complete_cases;
        }
    }
}

impl PairwiseConfig {
    pub fn merge(&mut self, other: Self) {
        if other.scope != PairScope::default() {
            self.scope = other.scope;
        }
    }
}

impl BatchingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = BatchingConfig::default();
        if other.mode != default.mode {
            self.mode = other.mode;
        }
        if other.no_batch_label != default.no_batch_label {
            self.no_batch_label = other.no_batch_label;
        }
    }
}

impl TaggingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = TaggingConfig::default();
        if other.attribute_name != default.attribute_name {
            self.attribute_name = other.attribute_name;
        }
        if other.group_a != default.group_a {
            self.group_a = other.group_a;
        }
        if other.group_b != default.group_b {
            self.group_b = other.group_b;
        }
        if other.selected != default.selected {
            self.selected = other.selected;
        }
        if other.not_selected != default.not_selected {
            self.not_selected = other.not_selected;
        }
    }
}

impl OutputConfig {
    pub fn merge(&mut self, other: Self) {
        let default = OutputConfig::default();
        if other.format != default.format {
            self.format = other.format;
        }
        if other.precision != default.precision {
            self.precision = other.precision;
        }
    }

    /// Parse `format` into an [`OutputFormat`]
    pub fn output_format(&self) -> Result<OutputFormat> {
        match self.format.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(eyre!(
                "Invalid output format: {}. Must be 'text', 'csv', or 'json'",
                self.format
            )),
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
