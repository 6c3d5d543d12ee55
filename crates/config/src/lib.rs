//! Configuration loading, validation, and management for tightfit.
//!
//! Loads configuration from `~/.tightfit/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tightfit_core::SizePolicy;

/// The root configuration structure.
///
/// Maps directly to `~/.tightfit/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Document codec and scratch settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Raster quality ladder
    #[serde(default)]
    pub image: ImageConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat bot behaviour and reply texts
    #[serde(default)]
    pub bot: BotConfig,

    /// Which chats have opted in
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_hard_max_bytes")]
    pub hard_max_bytes: u64,

    #[serde(default = "default_ideal_min_bytes")]
    pub ideal_min_bytes: u64,

    #[serde(default = "default_ideal_max_bytes")]
    pub ideal_max_bytes: u64,
}

fn default_hard_max_bytes() -> u64 {
    2 * 1024 * 1024
}
fn default_ideal_min_bytes() -> u64 {
    1536 * 1024
}
fn default_ideal_max_bytes() -> u64 {
    // 1.9 MiB, truncated
    1_992_294
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            hard_max_bytes: default_hard_max_bytes(),
            ideal_min_bytes: default_ideal_min_bytes(),
            ideal_max_bytes: default_ideal_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Ghostscript executable (name on PATH or absolute path)
    #[serde(default = "default_ghostscript_path")]
    pub ghostscript_path: String,

    /// Per-candidate subprocess timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Outputs smaller than this are treated as corrupt
    #[serde(default = "default_corruption_floor_bytes")]
    pub corruption_floor_bytes: u64,

    /// Root for request-scoped scratch directories
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Let Ghostscript rotate pages by text orientation
    #[serde(default)]
    pub auto_rotate: bool,

    /// Input/hard_max ratio above which the document ladder gets extra rungs
    #[serde(default = "default_extended_ladder_ratio")]
    pub extended_ladder_ratio: f64,
}

fn default_ghostscript_path() -> String {
    "gs".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_corruption_floor_bytes() -> u64 {
    512
}
fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("tightfit")
}
fn default_extended_ladder_ratio() -> f64 {
    5.0
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ghostscript_path: default_ghostscript_path(),
            timeout_secs: default_timeout_secs(),
            corruption_floor_bytes: default_corruption_floor_bytes(),
            scratch_dir: default_scratch_dir(),
            auto_rotate: false,
            extended_ladder_ratio: default_extended_ladder_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_start_quality")]
    pub start_quality: u8,

    #[serde(default = "default_quality_step")]
    pub quality_step: u8,

    #[serde(default = "default_min_quality")]
    pub min_quality: u8,

    /// Quality of the single re-encode for inputs already under the ideal ceiling
    #[serde(default = "default_light_quality")]
    pub light_quality: u8,

    /// Linear factor for the last-resort downscale, clamped to [0.8, 1.0]
    #[serde(default = "default_downscale_factor")]
    pub downscale_factor: f32,

    #[serde(default = "default_downscale_quality")]
    pub downscale_quality: u8,

    /// Input/hard_max ratio above which the downscale candidate is added
    #[serde(default = "default_downscale_trigger_ratio")]
    pub downscale_trigger_ratio: f64,
}

fn default_start_quality() -> u8 {
    90
}
fn default_quality_step() -> u8 {
    8
}
fn default_min_quality() -> u8 {
    40
}
fn default_light_quality() -> u8 {
    95
}
fn default_downscale_factor() -> f32 {
    0.8
}
fn default_downscale_quality() -> u8 {
    75
}
fn default_downscale_trigger_ratio() -> f64 {
    3.0
}

impl ImageConfig {
    /// The downscale factor clamped to the supported range.
    pub fn effective_downscale_factor(&self) -> f32 {
        if self.downscale_factor.is_nan() {
            return default_downscale_factor();
        }
        self.downscale_factor.clamp(0.8, 1.0)
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            start_quality: default_start_quality(),
            quality_step: default_quality_step(),
            min_quality: default_min_quality(),
            light_quality: default_light_quality(),
            downscale_factor: default_downscale_factor(),
            downscale_quality: default_downscale_quality(),
            downscale_trigger_ratio: default_downscale_trigger_ratio(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest accepted webhook body (base64 media inflates by 4/3)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Shared secret for `X-Signature` HMAC validation on `/webhook`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            webhook_secret: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("max_body_bytes", &self.max_body_bytes)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Message that opts a chat in (case-insensitive, trimmed)
    #[serde(default = "default_enable_phrase")]
    pub enable_phrase: String,

    #[serde(default = "default_true")]
    pub ignore_groups: bool,

    #[serde(default = "default_enabled_text")]
    pub enabled_text: String,

    #[serde(default = "default_progress_text")]
    pub progress_text: String,

    #[serde(default = "default_success_caption")]
    pub success_caption: String,

    #[serde(default = "default_failure_text")]
    pub failure_text: String,
}

fn default_true() -> bool {
    true
}
fn default_enable_phrase() -> String {
    "help compress".into()
}
fn default_enabled_text() -> String {
    "✅ Compression enabled for this chat! Send me a file and I will compress it to under 2MB for you.".into()
}
fn default_progress_text() -> String {
    "🔄 Compressing your file...".into()
}
fn default_success_caption() -> String {
    "✅ Compressed file ready!".into()
}
fn default_failure_text() -> String {
    "❌ Failed to compress your file.".into()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enable_phrase: default_enable_phrase(),
            ignore_groups: true,
            enabled_text: default_enabled_text(),
            progress_text: default_progress_text(),
            success_caption: default_success_caption(),
            failure_text: default_failure_text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// "memory" or "file"
    #[serde(default = "default_sessions_backend")]
    pub backend: String,

    /// JSON file used by the file backend
    #[serde(default = "default_sessions_path")]
    pub path: PathBuf,
}

fn default_sessions_backend() -> String {
    "memory".into()
}
fn default_sessions_path() -> PathBuf {
    AppConfig::config_dir().join("sessions.jsonl")
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_sessions_backend(),
            path: default_sessions_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tightfit/config.toml).
    ///
    /// Environment variables override file values:
    /// - `TIGHTFIT_HARD_MAX_BYTES`, `TIGHTFIT_IDEAL_MIN_BYTES`, `TIGHTFIT_IDEAL_MAX_BYTES`
    /// - `TIGHTFIT_SCRATCH_DIR`
    /// - `TIGHTFIT_GHOSTSCRIPT`
    /// - `TIGHTFIT_WEBHOOK_SECRET`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TIGHTFIT_HARD_MAX_BYTES") {
            self.limits.hard_max_bytes = parse_env("TIGHTFIT_HARD_MAX_BYTES", &v)?;
        }
        if let Some(v) = lookup("TIGHTFIT_IDEAL_MIN_BYTES") {
            self.limits.ideal_min_bytes = parse_env("TIGHTFIT_IDEAL_MIN_BYTES", &v)?;
        }
        if let Some(v) = lookup("TIGHTFIT_IDEAL_MAX_BYTES") {
            self.limits.ideal_max_bytes = parse_env("TIGHTFIT_IDEAL_MAX_BYTES", &v)?;
        }
        if let Some(v) = lookup("TIGHTFIT_SCRATCH_DIR") {
            self.encoder.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TIGHTFIT_GHOSTSCRIPT") {
            self.encoder.ghostscript_path = v;
        }
        if let Some(v) = lookup("TIGHTFIT_WEBHOOK_SECRET") {
            self.gateway.webhook_secret = Some(v);
        }
        if let Some(v) = lookup("PORT") {
            self.gateway.port = parse_env("PORT", &v)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tightfit")
    }

    /// The validated size policy described by `[limits]`.
    pub fn size_policy(&self) -> Result<SizePolicy, ConfigError> {
        SizePolicy::new(
            self.limits.hard_max_bytes,
            self.limits.ideal_min_bytes,
            self.limits.ideal_max_bytes,
        )
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.size_policy()?;

        if self.encoder.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "encoder.timeout_secs must be > 0".into(),
            ));
        }

        if self.encoder.ghostscript_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "encoder.ghostscript_path must not be empty".into(),
            ));
        }

        if !ratio_above_one(self.encoder.extended_ladder_ratio) {
            return Err(ConfigError::ValidationError(
                "encoder.extended_ladder_ratio must be > 1.0".into(),
            ));
        }

        let img = &self.image;
        for (name, q) in [
            ("start_quality", img.start_quality),
            ("min_quality", img.min_quality),
            ("light_quality", img.light_quality),
            ("downscale_quality", img.downscale_quality),
        ] {
            if q == 0 || q > 100 {
                return Err(ConfigError::ValidationError(format!(
                    "image.{name} must be between 1 and 100"
                )));
            }
        }
        if img.min_quality > img.start_quality {
            return Err(ConfigError::ValidationError(
                "image.min_quality must be <= image.start_quality".into(),
            ));
        }
        if img.quality_step == 0 {
            return Err(ConfigError::ValidationError(
                "image.quality_step must be > 0".into(),
            ));
        }
        if !ratio_above_one(img.downscale_trigger_ratio) {
            return Err(ConfigError::ValidationError(
                "image.downscale_trigger_ratio must be > 1.0".into(),
            ));
        }

        if self.bot.enable_phrase.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bot.enable_phrase must not be empty".into(),
            ));
        }

        match self.sessions.backend.as_str() {
            "memory" | "file" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "sessions.backend must be \"memory\" or \"file\", got \"{other}\""
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    /// Render this configuration as TOML with the webhook secret masked.
    pub fn to_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.gateway.webhook_secret.is_some() {
            shown.gateway.webhook_secret = Some("<redacted>".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

fn ratio_above_one(ratio: f64) -> bool {
    ratio.is_finite() && ratio > 1.0
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::EnvOverride {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value in {var}: {reason}")]
    EnvOverride { var: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
