// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from `ARN_*` environment variables with
//! sane defaults (spec.md's Non-goals exclude durable/clustered
//! deployment, so no config file parser is needed here).

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine a state directory: set ARN_STATE_DIR or HOME")]
    NoStateDir,
    #[error("invalid ARN_CONTROL_BIND {value:?}: {source}")]
    InvalidControlBind {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory, holding working-store copies and the log file.
    pub state_dir: PathBuf,
    /// Address the control-plane listener binds (stand-in for the GUI/CLI
    /// front end, spec.md §1's "out of scope" collaborator).
    pub control_bind: SocketAddr,
    /// Path (or bare name, resolved via `PATH`) to the worker executable.
    pub worker_binary: String,
    /// Worker count override; falls back to
    /// `arn_supervisor::default_worker_count()` when unset.
    pub worker_count: Option<usize>,
    /// Endpoint string passed to workers for the image-provider subservice
    /// (spec.md §1: out of scope, only its endpoint is consumed).
    pub image_provider_endpoint: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;

        let control_bind = std::env::var("ARN_CONTROL_BIND")
            .unwrap_or_else(|_| "127.0.0.1:7878".to_string());
        let control_bind = control_bind
            .parse()
            .map_err(|source| ConfigError::InvalidControlBind {
                value: control_bind.clone(),
                source,
            })?;

        let worker_binary =
            std::env::var("ARN_WORKER_BINARY").unwrap_or_else(|_| "arn-worker".to_string());

        let worker_count = std::env::var("ARN_WORKER_COUNT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());

        let image_provider_endpoint = std::env::var("ARN_IMAGE_PROVIDER_ENDPOINT")
            .unwrap_or_else(|_| "tcp://127.0.0.1:0".to_string());

        Ok(Self {
            state_dir,
            control_bind,
            worker_binary,
            worker_count,
            image_provider_endpoint,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("arnd.log")
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.state_dir.join("workspaces")
    }

    pub fn supervisor_config(&self) -> arn_supervisor::WorkerSupervisorConfig {
        let worker_count = self
            .worker_count
            .unwrap_or_else(arn_supervisor::default_worker_count);
        arn_supervisor::WorkerSupervisorConfig::new(self.worker_binary.clone(), worker_count)
    }
}

/// Resolve the state directory: `ARN_STATE_DIR` > `XDG_STATE_HOME/arn` >
/// `~/.local/state/arn` (daemon workspace's `daemon/src/env.rs` pattern).
fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("ARN_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("arn"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/arn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_and_workspace_dir_nest_under_state_dir() {
        let config = Config {
            state_dir: PathBuf::from("/tmp/arn-state"),
            control_bind: "127.0.0.1:7878".parse().unwrap(),
            worker_binary: "arn-worker".to_string(),
            worker_count: None,
            image_provider_endpoint: "tcp://127.0.0.1:0".to_string(),
        };
        assert_eq!(config.log_path(), PathBuf::from("/tmp/arn-state/arnd.log"));
        assert_eq!(config.workspace_dir(), PathBuf::from("/tmp/arn-state/workspaces"));
    }
}
