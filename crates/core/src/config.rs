use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn parsed<T: std::str::FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    /// Optional YAML file overriding the built-in industry weight tables.
    #[serde(default)]
    pub weights_path: Option<PathBuf>,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            pool: PoolConfig::from_env(),
            weights_path: env_opt("TRAITSCOPE_WEIGHTS_PATH").map(PathBuf::from),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  pool:     max={}, resolved={}, min={}",
            self.pool.max_pool_size,
            self.pool.resolved_pool_size(),
            self.pool.min_entries
        );
        tracing::info!(
            "  timeouts: task={}s, idle={}s, maintenance={}s",
            self.pool.task_timeout_secs,
            self.pool.idle_timeout_secs,
            self.pool.maintenance_interval_secs
        );
        match &self.weights_path {
            Some(path) => tracing::info!("  weights:  {}", path.display()),
            None => tracing::info!("  weights:  (built-in)"),
        }
    }
}

// ── Pool ──────────────────────────────────────────────────────

/// Worker pool configuration, from TOML or environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on worker entries. 0 = no workers, every task runs in the caller.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
    /// Idle eviction never shrinks the pool below this many entries.
    #[serde(default = "default_min_entries")]
    pub min_entries: usize,
    /// Ceiling on a single task's run time, in seconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Entries unused for longer than this are evicted, in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Period of the eviction + health-check loop, in seconds.
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,
    /// Capacity of the caller-side progress channel.
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,
    /// Worker thread name prefix.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_max_pool_size() -> usize { 4 }
fn default_min_entries() -> usize { 1 }
fn default_task_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 300 }
fn default_maintenance_interval() -> u64 { 30 }
fn default_progress_capacity() -> usize { 64 }
fn default_thread_name_prefix() -> String { "traitscope-worker".to_string() }

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_max_pool_size(),
            min_entries: default_min_entries(),
            task_timeout_secs: default_task_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            maintenance_interval_secs: default_maintenance_interval(),
            progress_capacity: default_progress_capacity(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl PoolConfig {
    /// Build from `TRAITSCOPE_*` environment variables, defaulting missing keys.
    pub fn from_env() -> Self {
        Self::from_lookup(&env_opt)
    }

    /// Build from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            max_pool_size: parsed(lookup, "TRAITSCOPE_POOL_MAX").unwrap_or(d.max_pool_size),
            min_entries: parsed(lookup, "TRAITSCOPE_POOL_MIN").unwrap_or(d.min_entries),
            task_timeout_secs: parsed(lookup, "TRAITSCOPE_TASK_TIMEOUT_SECS")
                .unwrap_or(d.task_timeout_secs),
            idle_timeout_secs: parsed(lookup, "TRAITSCOPE_IDLE_TIMEOUT_SECS")
                .unwrap_or(d.idle_timeout_secs),
            maintenance_interval_secs: parsed(lookup, "TRAITSCOPE_MAINTENANCE_INTERVAL_SECS")
                .unwrap_or(d.maintenance_interval_secs),
            progress_capacity: parsed(lookup, "TRAITSCOPE_PROGRESS_CAPACITY")
                .unwrap_or(d.progress_capacity),
            thread_name_prefix: lookup("TRAITSCOPE_THREAD_PREFIX").unwrap_or(d.thread_name_prefix),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        toml::from_str(raw).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Entry count created at initialization: `min(max_pool_size, available_parallelism)`.
    pub fn resolved_pool_size(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_pool_size.min(cores)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_pool_size, 4);
        assert_eq!(config.min_entries, 1);
        assert_eq!(config.task_timeout(), Duration::from_secs(30));
        assert_eq!(config.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.progress_capacity, 64);
    }

    #[test]
    fn resolved_pool_size_respects_parallelism() {
        let mut config = PoolConfig::default();
        let size = config.resolved_pool_size();
        assert!(size >= 1 && size <= 4);

        config.max_pool_size = 0;
        assert_eq!(config.resolved_pool_size(), 0);
    }

    #[test]
    fn from_lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("TRAITSCOPE_POOL_MAX", "2"),
            ("TRAITSCOPE_TASK_TIMEOUT_SECS", "5"),
            ("TRAITSCOPE_IDLE_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let config = PoolConfig::from_lookup(&|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.max_pool_size, 2);
        assert_eq!(config.task_timeout_secs, 5);
        assert_eq!(config.idle_timeout_secs, 300);
    }

    #[test]
    fn from_toml_partial() {
        let config = PoolConfig::from_toml_str("max_pool_size = 3\nidle_timeout_secs = 60\n").unwrap();
        assert_eq!(config.max_pool_size, 3);
        assert_eq!(config.idle_timeout_secs, 60);
        assert_eq!(config.min_entries, 1);
    }

    #[test]
    fn from_toml_rejects_wrong_types() {
        assert!(PoolConfig::from_toml_str("max_pool_size = \"many\"").is_err());
    }

    #[test]
    fn maintenance_interval_never_zero() {
        let config = PoolConfig {
            maintenance_interval_secs: 0,
            ..PoolConfig::default()
        };
        assert_eq!(config.maintenance_interval(), Duration::from_secs(1));
    }
}
