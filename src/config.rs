use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graph: GraphConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Graph store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Path to the SQLite live store.
    pub db_path: PathBuf,
    /// Optional human-editable JSON seed document, imported at startup.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of the in-process LRU cache for hot node reads.
    #[serde(default = "default_node_cache_capacity")]
    pub node_cache_capacity: usize,
}

/// Feedback / link-updater tuning
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    /// Hard ceiling on edge weight. Repeated reinforcement saturates here.
    #[serde(default = "default_weight_cap")]
    pub weight_cap: f64,
    /// Multiplier applied to signal strength before saturation.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Maximum accepted signal strength; larger values are InvalidEvent.
    #[serde(default = "default_max_strength")]
    pub max_strength: f64,
    /// Node whose reachability marks a state as activating safe mode.
    #[serde(default = "default_safety_node")]
    pub safety_node: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            weight_cap: default_weight_cap(),
            learning_rate: default_learning_rate(),
            max_strength: default_max_strength(),
            safety_node: default_safety_node(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_authless")]
    pub authless: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: default_allowed_origins(),
            authless: default_authless(),
        }
    }
}

/// Seed file auto-reload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_node_cache_capacity() -> usize {
    1024
}

fn default_weight_cap() -> f64 {
    5.0
}

fn default_learning_rate() -> f64 {
    1.0
}

fn default_max_strength() -> f64 {
    10.0
}

fn default_safety_node() -> String {
    "safe_mode".to_string()
}

fn default_http_enabled() -> bool {
    false
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "BRAINGRAPH_API_KEY".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    // Default empty — set allowed_origins in config.toml for production
    vec![]
}

fn default_authless() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in BRAINGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("BRAINGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.feedback.weight_cap <= 0.0 || !self.feedback.weight_cap.is_finite() {
            anyhow::bail!("feedback.weight_cap must be a finite positive number");
        }

        if self.feedback.learning_rate <= 0.0 || !self.feedback.learning_rate.is_finite() {
            anyhow::bail!("feedback.learning_rate must be a finite positive number");
        }

        if self.feedback.max_strength <= 0.0 || !self.feedback.max_strength.is_finite() {
            anyhow::bail!("feedback.max_strength must be a finite positive number");
        }

        if self.feedback.safety_node.trim().is_empty() {
            anyhow::bail!("feedback.safety_node must not be empty");
        }

        if let Some(seed) = &self.graph.seed_path {
            if !seed.exists() {
                anyhow::bail!(
                    "graph.seed_path does not exist: {}. Point it at your graph JSON document or remove it.",
                    seed.display()
                );
            }
            if !seed.is_file() {
                anyhow::bail!(
                    "graph.seed_path must be a file, not a directory: {}",
                    seed.display()
                );
            }
        }

        // API key env is only required when the HTTP server enforces auth
        if self.http_server.enabled && !self.http_server.authless {
            std::env::var(&self.http_server.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or enable http_server.authless.",
                    self.http_server.api_key_env
                )
            })?;
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.graph.db_path
    }

    /// Get the seed document path, if configured
    pub fn seed_path(&self) -> Option<&Path> {
        self.graph.seed_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn create_test_config(temp_dir: &TempDir) -> String {
        let seed_path = temp_dir.path().join("brain_graph.json");
        fs::write(&seed_path, r#"{"nodes": [], "edges": []}"#).unwrap();
        let seed_str = seed_path.to_str().unwrap().replace('\\', "\\\\");
        format!(
            r#"
[graph]
db_path = "./test.db"
seed_path = "{}"
log_level = "debug"

[feedback]
weight_cap = 5.0
learning_rate = 1.0
max_strength = 10.0

[http_server]
enabled = false
port = 8080
"#,
            seed_str
        )
    }

    fn with_config_env(config_path: &std::path::Path, f: impl FnOnce()) {
        let original = std::env::var("BRAINGRAPH_CONFIG").ok();
        std::env::set_var("BRAINGRAPH_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("BRAINGRAPH_CONFIG");
        if let Some(val) = original {
            std::env::set_var("BRAINGRAPH_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir);
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.graph.log_level, "debug");
            assert_eq!(config.feedback.weight_cap, 5.0);
            assert!(config.seed_path().is_some());
            assert!(!config.http_server.enabled);
        });
    }

    #[test]
    fn test_config_defaults() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[graph]\ndb_path = \"./brain.db\"\n").unwrap();
        with_config_env(&config_path, || {
            let config = Config::load().unwrap();
            assert_eq!(config.feedback.weight_cap, 5.0);
            assert_eq!(config.feedback.safety_node, "safe_mode");
            assert_eq!(config.http_server.port, 8080);
            assert!(config.http_server.authless);
            assert!(!config.watch.enabled);
            assert_eq!(config.graph.node_cache_capacity, 1024);
        });
    }

    #[test]
    fn test_config_rejects_bad_weight_cap() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[graph]\ndb_path = \"./brain.db\"\n\n[feedback]\nweight_cap = -1.0\n",
        )
        .unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("weight_cap"));
        });
    }

    #[test]
    fn test_config_rejects_missing_seed() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[graph]\ndb_path = \"./brain.db\"\nseed_path = \"./does_not_exist.json\"\n",
        )
        .unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("seed_path"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("BRAINGRAPH_CONFIG").ok();
        std::env::set_var("BRAINGRAPH_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("BRAINGRAPH_CONFIG");
        if let Some(v) = original {
            std::env::set_var("BRAINGRAPH_CONFIG", v);
        }
    }
}
