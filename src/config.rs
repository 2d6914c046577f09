//! Client settings and where they live on disk.
//!
//! Precedence: built-in defaults, then `config.json` in the app config
//! directory, then `GRIDMDP_*` environment variables, then command-line flags
//! (applied by the binary).

use crate::env_config::{Algorithm, SolverParams};
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, ClientError> {
        let base = dirs::config_dir()
            .ok_or_else(|| ClientError::Settings("could not determine config directory".into()))?;
        Ok(Self {
            config_dir: base.join("gridmdp"),
        })
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// `host:port` of the solver.
    #[serde(default = "default_solver_addr")]
    pub solver_addr: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Cadence of the policy replay.
    #[serde(default = "default_interval_ms")]
    pub simulation_interval_ms: u64,
    /// Cadence of the iteration sweep.
    #[serde(default = "default_interval_ms")]
    pub animation_interval_ms: u64,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default)]
    pub params: SolverParams,
}

fn default_solver_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_interval_ms() -> u64 {
    500
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            solver_addr: default_solver_addr(),
            request_timeout_ms: default_request_timeout_ms(),
            simulation_interval_ms: default_interval_ms(),
            animation_interval_ms: default_interval_ms(),
            algorithm: Algorithm::default(),
            params: SolverParams::default(),
        }
    }
}

impl ClientConfig {
    /// Reads `config.json` if present; a missing file means defaults.
    pub fn load(paths: &AppPaths) -> Result<Self, ClientError> {
        let path = paths.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| ClientError::Settings(format!("read {}: {e}", path.display())))?;
        let cfg = serde_json::from_str(&text)
            .map_err(|e| ClientError::Settings(format!("parse {}: {e}", path.display())))?;
        info!("Loaded settings from {}", path.display());
        Ok(cfg)
    }

    pub fn save(&self, paths: &AppPaths) -> Result<(), ClientError> {
        fs::create_dir_all(paths.config_dir())
            .map_err(|e| ClientError::Settings(format!("create config dir: {e}")))?;
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ClientError::Settings(e.to_string()))?;
        fs::write(paths.config_file(), text)
            .map_err(|e| ClientError::Settings(format!("write config: {e}")))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `GRIDMDP_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // GRIDMDP_SOLVER_ADDR=127.0.0.1:5000
        if let Some(v) = lookup("GRIDMDP_SOLVER_ADDR") {
            let v = v.trim();
            if !v.is_empty() {
                self.solver_addr = v.to_string();
            }
        }

        let millis = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(n) => Some(n.max(1)),
                Err(_) => {
                    warn!("Ignoring {key}={raw:?}: not a number of milliseconds");
                    None
                }
            }
        };
        if let Some(n) = millis("GRIDMDP_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = n;
        }
        if let Some(n) = millis("GRIDMDP_SIMULATION_INTERVAL_MS") {
            self.simulation_interval_ms = n;
        }
        if let Some(n) = millis("GRIDMDP_ANIMATION_INTERVAL_MS") {
            self.animation_interval_ms = n;
        }

        if let Some(v) = lookup("GRIDMDP_ALGORITHM") {
            match v.parse::<Algorithm>() {
                Ok(a) => self.algorithm = a,
                Err(e) => warn!("Ignoring GRIDMDP_ALGORITHM: {e}"),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms.max(1))
    }

    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_files_fill_in_defaults() {
        let cfg: ClientConfig =
            serde_json::from_str(r#"{"solver_addr":"10.0.0.2:7000","params":{"gamma":0.5}}"#)
                .unwrap();
        assert_eq!(cfg.solver_addr, "10.0.0.2:7000");
        assert_eq!(cfg.simulation_interval_ms, 500);
        assert_eq!(cfg.params.gamma, 0.5);
        assert_eq!(cfg.params.max_iterations, 100);
        assert_eq!(cfg.algorithm, Algorithm::ValueIteration);
    }

    #[test]
    fn env_overrides_win_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("GRIDMDP_SOLVER_ADDR", " solver:9000 "),
            ("GRIDMDP_SIMULATION_INTERVAL_MS", "0"),
            ("GRIDMDP_ANIMATION_INTERVAL_MS", "fast"),
            ("GRIDMDP_ALGORITHM", "monte-carlo"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ClientConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.solver_addr, "solver:9000");
        assert_eq!(cfg.simulation_interval_ms, 1);
        assert_eq!(cfg.animation_interval_ms, 500);
        assert_eq!(cfg.algorithm, Algorithm::MonteCarlo);
    }

    #[test]
    fn save_then_load_from_a_directory() {
        let dir = std::env::temp_dir().join(format!("gridmdp-config-{}", std::process::id()));
        let paths = AppPaths::with_dir(&dir);
        assert_eq!(ClientConfig::load(&paths).unwrap(), ClientConfig::default());

        let cfg = ClientConfig {
            animation_interval_ms: 120,
            ..ClientConfig::default()
        };
        cfg.save(&paths).unwrap();
        assert_eq!(ClientConfig::load(&paths).unwrap(), cfg);

        fs::write(paths.config_file(), "{not json").unwrap();
        assert!(matches!(
            ClientConfig::load(&paths),
            Err(ClientError::Settings(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
