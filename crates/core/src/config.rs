use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pull a `.env` file into the process environment when one exists.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Non-empty value of `{PROFILE}_{KEY}`, else of `{KEY}`.
fn lookup(profile: &str, key: &str) -> Option<String> {
    let set = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());
    (!profile.is_empty())
        .then(|| set(&format!("{profile}_{key}")))
        .flatten()
        .or_else(|| set(key))
}

/// Parsed profiled value; unset or unparsable falls back to `default`.
fn lookup_or<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    lookup(profile, key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

// ── Defaults ──────────────────────────────────────────────────

pub const DEFAULT_ROOT: &str = ".tshrag";
pub const DEFAULT_HOST: &str = "127.0.0.1:8000";
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_TIME_ACCURACY: usize = 12;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerConfig,
    pub mdb: MdbConfig,
}

impl Config {
    /// Config for the profile named by `TSHRAG_PROFILE`.
    ///
    /// With a profile such as `LAB`, each key is read as `LAB_{KEY}` first
    /// and as plain `{KEY}` otherwise. Call [`load_dotenv`] beforehand.
    pub fn from_env() -> Self {
        Self::for_profile(&lookup("", "TSHRAG_PROFILE").unwrap_or_default())
    }

    /// Config for `profile`; the empty string selects no prefix.
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let scheduler = SchedulerConfig::from_env_profiled(p);
        let mdb = MdbConfig::from_env_profiled(p, scheduler.lock_timeout_ms);
        Self {
            profile: p.to_string(),
            scheduler,
            mdb,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Startup summary of the effective settings.
    pub fn log_summary(&self) {
        tracing::info!(profile = self.profile_label(), "Configuration");
        tracing::info!(
            "  scheduler:   root={}, host={}, workers={}, refresh={}ms, lock_timeout={}ms",
            self.scheduler.root.display(),
            self.scheduler.host,
            self.scheduler.resolved_max_workers(),
            self.scheduler.refresh_interval_ms,
            self.scheduler.lock_timeout_ms,
        );
        tracing::info!(
            "  mdb:         time_accuracy={}, lock_timeout={}ms",
            self.mdb.time_accuracy,
            self.mdb.lock_timeout_ms,
        );
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Directory holding every test's state.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Address exported to steps as `TSHRAG_HOST`.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Worker pool capacity; 0 means available parallelism.
    #[serde(default)]
    pub max_workers: usize,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

fn default_time_accuracy() -> usize {
    DEFAULT_TIME_ACCURACY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            host: default_host(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            max_workers: 0,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            root: lookup(p, "TSHRAG_ROOT").map_or_else(default_root, PathBuf::from),
            host: lookup(p, "TSHRAG_HOST").unwrap_or_else(default_host),
            lock_timeout_ms: lookup_or(p, "TSHRAG_LOCK_TIMEOUT_MS", DEFAULT_LOCK_TIMEOUT_MS),
            max_workers: lookup_or(p, "TSHRAG_MAX_WORKERS", 0),
            refresh_interval_ms: lookup_or(p, "TSHRAG_REFRESH_INTERVAL_MS", DEFAULT_REFRESH_INTERVAL_MS),
        }
    }

    /// Worker capacity; unset means the host's available parallelism.
    pub fn resolved_max_workers(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            std::thread::available_parallelism().map_or(4, |n| n.get())
        }
    }
}

// ── Metric store ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdbConfig {
    /// Leading timestamp digits that name a bucket file.
    #[serde(default = "default_time_accuracy")]
    pub time_accuracy: usize,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for MdbConfig {
    fn default() -> Self {
        Self {
            time_accuracy: DEFAULT_TIME_ACCURACY,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl MdbConfig {
    fn from_env_profiled(p: &str, lock_timeout_ms: u64) -> Self {
        Self {
            time_accuracy: lookup_or(p, "TSHRAG_MDB_TIME_ACCURACY", DEFAULT_TIME_ACCURACY)
                .clamp(1, crate::time::TIME_WIDTH),
            lock_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let config = Config::for_profile("ZZ_UNSET_PROFILE");
        assert_eq!(config.profile, "ZZ_UNSET_PROFILE");
        assert_eq!(config.mdb.time_accuracy.min(20), config.mdb.time_accuracy);
        assert!(config.scheduler.resolved_max_workers() >= 1);
    }

    #[test]
    fn profiled_keys_take_precedence() {
        env::set_var("CFGTEST_TSHRAG_ROOT", "/srv/lab");
        env::set_var("CFGTEST_TSHRAG_MAX_WORKERS", "3");
        env::set_var("CFGTEST_TSHRAG_MDB_TIME_ACCURACY", "99");
        let config = Config::for_profile("cfgtest");
        assert_eq!(config.profile, "CFGTEST");
        assert_eq!(config.scheduler.root, PathBuf::from("/srv/lab"));
        assert_eq!(config.scheduler.max_workers, 3);
        assert_eq!(config.scheduler.resolved_max_workers(), 3);
        assert_eq!(config.mdb.time_accuracy, 20);
    }

    #[test]
    fn serde_defaults_fill_missing_fields() {
        let scheduler: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(scheduler.root, PathBuf::from(DEFAULT_ROOT));
        assert_eq!(scheduler.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
        let mdb: MdbConfig = serde_json::from_str(r#"{"time_accuracy": 8}"#).unwrap();
        assert_eq!(mdb.time_accuracy, 8);
        assert_eq!(mdb.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
    }
}
