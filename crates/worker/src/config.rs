use std::path::PathBuf;

use scriptstep_core::scripting::environment::LegacyKey;
use scriptstep_core::scripting::spec::DEFAULT_POSIX_SHELL;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for temporary script files (default: OS temp dir).
    pub basedir: PathBuf,
    /// Working directory of spawned scripts (default: inherit).
    pub working_dir: Option<PathBuf>,
    /// Callback port exported to scripts (default: `0`).
    pub export_port: u16,
    /// Shell for scripts without a shebang (default: `/bin/sh`).
    pub default_shell: String,
    /// JSON job file describing the step to run.
    pub step_file: PathBuf,
    /// Deprecated key pair, set only when both halves are present.
    pub legacy_key: Option<LegacyKey>,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default        |
    /// |------------------------|----------------|
    /// | `WORKER_STEP_FILE`     | required       |
    /// | `WORKER_BASEDIR`       | OS temp dir    |
    /// | `WORKER_WORKDIR`       | inherit        |
    /// | `WORKER_EXPORT_PORT`   | `0`            |
    /// | `WORKER_DEFAULT_SHELL` | `/bin/sh`      |
    /// | `WORKER_PKEY`          | unset          |
    /// | `WORKER_GIT_SSH`       | unset          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let step_file = get("WORKER_STEP_FILE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("WORKER_STEP_FILE"))?;

        let basedir = get("WORKER_BASEDIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let working_dir = get("WORKER_WORKDIR").map(PathBuf::from);

        let export_port = match get("WORKER_EXPORT_PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "WORKER_EXPORT_PORT",
                expected: "u16",
                value,
            })?,
            None => 0,
        };

        let default_shell =
            get("WORKER_DEFAULT_SHELL").unwrap_or_else(|| DEFAULT_POSIX_SHELL.to_string());

        let legacy_key = match (get("WORKER_PKEY"), get("WORKER_GIT_SSH")) {
            (Some(pkey), Some(git_ssh)) => Some(LegacyKey {
                pkey,
                git_ssh: PathBuf::from(git_ssh),
            }),
            _ => None,
        };

        Ok(Self {
            basedir,
            working_dir,
            export_port,
            default_shell,
            step_file,
            legacy_key,
        })
    }
}
