//! Subprocess environment builder.
//!
//! [`build_environment`] is a pure function of its inputs. Entries are kept as
//! an ordered list of `NAME=value` strings; duplicate names are not collapsed,
//! the last occurrence wins once applied to a command.

use std::path::{Path, PathBuf};

use crate::parameter::{env_var_name, Parameter, Variable, ENV_PARAMETER_PREFIX};

/// Namespace reserved for the worker's own control-plane variables.
pub const DEFAULT_INTERNAL_PREFIX: &str = "CDS_";

/// Variable carrying the worker's callback HTTP port.
pub const DEFAULT_PORT_VARIABLE: &str = "CDS_EXPORT_PORT";

/// Legacy placeholder kept for scripts that still test for its presence.
const MASKED_KEY_ENTRY: &str = "CDS_KEY=********";

/// Naming rules for worker-owned variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPolicy {
    /// Host variables starting with this prefix are not inherited.
    pub internal_prefix: String,
    pub port_variable: String,
}

impl Default for EnvPolicy {
    fn default() -> Self {
        Self {
            internal_prefix: DEFAULT_INTERNAL_PREFIX.to_string(),
            port_variable: DEFAULT_PORT_VARIABLE.to_string(),
        }
    }
}

/// Deprecated key pair exported as `PKEY` / `GIT_SSH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyKey {
    pub pkey: String,
    pub git_ssh: PathBuf,
}

/// Variables owned by the worker rather than by the step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerVars {
    pub export_port: u16,
    pub legacy_key: Option<LegacyKey>,
    pub build_variables: Vec<Variable>,
}

/// Ordered `NAME=value` list for the child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    entries: Vec<String>,
}

impl ProcessEnv {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// `(name, value)` pairs in order. Entries without `=` get an empty value.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| e.split_once('=').unwrap_or((e.as_str(), "")))
    }

    /// Value of the last entry called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs().filter(|(k, _)| *k == name).map(|(_, v)| v).last()
    }

    /// Replace the command's environment with these entries.
    pub fn apply_to(&self, cmd: &mut tokio::process::Command) {
        cmd.env_clear();
        for (key, value) in self.pairs() {
            if !key.is_empty() {
                cmd.env(key, value);
            }
        }
    }

    fn push(&mut self, name: &str, value: impl std::fmt::Display) {
        self.entries.push(format!("{name}={value}"));
    }
}

/// Assemble the child environment.
///
/// Order: `CI=1`, inherited host variables (internal prefix removed), the
/// legacy masked key, the callback port, the deprecated key pair, step
/// parameters, build variables. The first `PATH` entry then gets
/// `worker_dir` appended. Private key parameters are never exported.
pub fn build_environment(
    host_env: &[(String, String)],
    params: &[Parameter],
    worker: &WorkerVars,
    policy: &EnvPolicy,
    worker_dir: &Path,
) -> ProcessEnv {
    let mut env = ProcessEnv::default();
    env.push("CI", 1);

    for (name, value) in host_env {
        if name.starts_with(&policy.internal_prefix) {
            continue;
        }
        env.push(name, value);
    }

    env.entries.push(MASKED_KEY_ENTRY.to_string());
    env.push(&policy.port_variable, worker.export_port);

    if let Some(key) = &worker.legacy_key {
        if !key.pkey.is_empty() && !key.git_ssh.as_os_str().is_empty() {
            env.push("PKEY", &key.pkey);
            env.push("GIT_SSH", key.git_ssh.display());
        }
    }

    for param in params {
        if param.is_private_key() {
            continue;
        }
        if let Some(short) = param.name.strip_prefix(ENV_PARAMETER_PREFIX) {
            let bare = short.replace(['.', '-'], "_");
            env.push(&format!("CDS_ENV_{}", bare.to_uppercase()), &param.value);
            env.push(&bare, &param.value);
        }
        env.push(&env_var_name(&param.name), &param.value);
    }

    for var in &worker.build_variables {
        env.push(&env_var_name(&var.name), &var.value);
    }

    if let Some(path) = env.entries.iter_mut().find(|e| e.starts_with("PATH=")) {
        path.push(':');
        path.push_str(&worker_dir.to_string_lossy());
    }

    env
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
