//! Configuration loading, defaults, and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Avatar Voice configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Client-side connection to the TTS endpoint (the gateway's `/say` and `/delete_tts`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Base URL of the TTS endpoint (default: http://127.0.0.1:5000).
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    /// Per-request deadline in milliseconds. 0 disables the deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

fn default_tts_endpoint() -> String {
    "http://127.0.0.1:5000".into()
}

/// Playback pipeline tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of synthesized clips to keep buffered ahead of playback (default: 3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_depth: Option<usize>,

    /// Extra fetch attempts for a failed utterance (default: 0, failed text is dropped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Avatar the player should animate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Server-side TTS gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Upstream synthesizer that receives `{"text": ...}` and returns WAV bytes.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_api_key_env: Option<String>,

    /// Directory for temporary synthesized files (default: ~/.avatar_voice/tts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_dir: Option<String>,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:8080".into()
}

impl GatewayConfig {
    pub fn resolve_upstream_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.upstream_api_key, &self.upstream_api_key_env)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: None,
            upstream_url: default_upstream_url(),
            upstream_api_key: None,
            upstream_api_key_env: None,
            tts_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "avatar_voice_media=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex")
});

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::VoiceError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location: `~/.avatar_voice/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// TTS endpoint base URL without a trailing slash.
    pub fn tts_endpoint(&self) -> String {
        self.tts
            .as_ref()
            .map(|t| t.endpoint.trim_end_matches('/').to_string())
            .unwrap_or_else(default_tts_endpoint)
    }

    /// Per-request deadline; `None` when explicitly disabled with 0.
    pub fn request_timeout(&self) -> Option<Duration> {
        let ms = self
            .tts
            .as_ref()
            .and_then(|t| t.request_timeout_ms)
            .unwrap_or(30_000);
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    pub fn target_depth(&self) -> usize {
        self.pipeline
            .as_ref()
            .and_then(|p| p.target_depth)
            .unwrap_or(3)
    }

    pub fn max_retries(&self) -> u32 {
        self.pipeline
            .as_ref()
            .and_then(|p| p.max_retries)
            .unwrap_or(0)
    }

    pub fn avatar(&self) -> String {
        self.pipeline
            .as_ref()
            .and_then(|p| p.avatar.clone())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway
            .as_ref()
            .map(|g| g.port)
            .unwrap_or_else(default_gateway_port)
    }

    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    /// Directory the gateway writes synthesized files into.
    pub fn tts_dir(&self) -> PathBuf {
        self.gateway
            .as_ref()
            .and_then(|g| g.tts_dir.as_ref())
            .map(|d| PathBuf::from(shellexpand::tilde(d).as_ref()))
            .unwrap_or_else(|| data_dir().join("tts"))
    }

    /// Get a config value by dotted path (e.g. "pipeline.target_depth").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path, creating intermediate sections.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            anyhow::bail!("Empty path");
        };

        let mut current = &mut json;
        for segment in parents {
            if !current.get(*segment).is_some_and(|v| v.is_object()) {
                current[*segment] = serde_json::json!({});
            }
            current = &mut current[*segment];
        }
        current[*last] = value;

        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let endpoint = self.tts_endpoint();
        if !is_http_url(&endpoint) {
            errors.push(format!("TTS endpoint must be an http(s) URL: {endpoint}"));
        }

        if self.request_timeout().is_none() {
            warnings.push("tts.request_timeout_ms is 0; requests will have no deadline".into());
        }

        if self.target_depth() == 0 {
            errors.push("pipeline.target_depth must be at least 1".to_string());
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
            if !is_http_url(&gw.upstream_url) {
                errors.push(format!(
                    "Gateway upstream must be an http(s) URL: {}",
                    gw.upstream_url
                ));
            }
            if let Some(env) = &gw.upstream_api_key_env {
                if gw.resolve_upstream_api_key().is_none() {
                    warnings.push(format!("Upstream API key env var '{env}' is not set"));
                }
            }
        }

        if let Some(logging) = &self.logging {
            if logging.format != "plain" && logging.format != "json" {
                warnings.push(format!(
                    "Unknown log format '{}', falling back to plain",
                    logging.format
                ));
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Base directory for Avatar Voice data: `~/.avatar_voice/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".avatar_voice")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, unique variable name
        unsafe { std::env::set_var("TEST_AV_ENDPOINT", "http://tts.local:5000") };
        let input = r#"{"endpoint": "${TEST_AV_ENDPOINT}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("http://tts.local:5000"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_AV_ENDPOINT") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_AV_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tts_endpoint(), "http://127.0.0.1:5000");
        assert_eq!(config.target_depth(), 3);
        assert_eq!(config.max_retries(), 0);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.gateway_port(), 5000);
        assert_eq!(config.avatar(), "default");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/avatar_voice.json")).unwrap();
        assert!(config.tts.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                tts: { endpoint: "http://10.0.0.2:5000/", request_timeout_ms: 1500 },
                pipeline: { target_depth: 5, max_retries: 1 },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tts_endpoint(), "http://10.0.0.2:5000");
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.target_depth(), 5);
        assert_eq!(config.max_retries(), 1);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ tts: ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config: Config = json5::from_str(r#"{ tts: { request_timeout_ms: 0 } }"#).unwrap();
        assert!(config.request_timeout().is_none());
        let (warnings, errors) = config.validate();
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.contains("deadline")));
    }

    #[test]
    fn test_get_and_set_path() {
        let mut config = Config::default();
        config
            .set_path("pipeline.target_depth", serde_json::json!(7))
            .unwrap();
        assert_eq!(config.target_depth(), 7);
        assert_eq!(
            config.get_path("pipeline.target_depth"),
            Some(serde_json::json!(7))
        );
        assert!(config.get_path("pipeline.nope").is_none());
        assert!(config.set_path("", serde_json::json!(1)).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config
            .set_path("tts.endpoint", serde_json::json!("http://example.test"))
            .unwrap();
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.tts_endpoint(), "http://example.test");
    }

    #[test]
    fn test_upstream_key_resolution() {
        // SAFETY: test-only, unique variable name
        unsafe { std::env::set_var("TEST_AV_UPSTREAM_KEY", "from-env") };
        let gw = GatewayConfig {
            upstream_api_key_env: Some("TEST_AV_UPSTREAM_KEY".into()),
            ..GatewayConfig::default()
        };
        assert_eq!(gw.resolve_upstream_api_key(), Some("from-env".into()));

        let direct = GatewayConfig {
            upstream_api_key: Some("direct-key".into()),
            upstream_api_key_env: Some("TEST_AV_UPSTREAM_KEY".into()),
            ..GatewayConfig::default()
        };
        // Direct key takes priority
        assert_eq!(direct.resolve_upstream_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_AV_UPSTREAM_KEY") };
    }

    #[test]
    fn test_tts_dir_expands_tilde() {
        let config = Config {
            gateway: Some(GatewayConfig {
                tts_dir: Some("~/voice-tmp".into()),
                ..GatewayConfig::default()
            }),
            ..Config::default()
        };
        assert!(!config.tts_dir().to_string_lossy().starts_with('~'));
        assert!(config.tts_dir().ends_with("voice-tmp"));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_reports_errors() {
        let config: Config = json5::from_str(
            r#"{
                tts: { endpoint: "ftp://nope" },
                pipeline: { target_depth: 0 },
                gateway: { port: 0 },
            }"#,
        )
        .unwrap();
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("endpoint")));
        assert!(errors.iter().any(|e| e.contains("target_depth")));
        assert!(errors.iter().any(|e| e.contains("port")));
    }

    #[test]
    fn test_validate_default_is_clean() {
        let (warnings, errors) = Config::default().validate();
        assert!(warnings.is_empty());
        assert!(errors.is_empty());
    }
}
