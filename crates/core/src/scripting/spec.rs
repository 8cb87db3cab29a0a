//! Script specification parser.
//!
//! Turns the step's `script` parameter into an interpreter, its leading
//! arguments and the body to write to disk. The host OS strategy is decided
//! here once and recorded as a [`Launcher`]; nothing downstream looks at the
//! host OS again.

use crate::error::ScriptError;
use crate::parameter::{find_parameter, Parameter, SCRIPT_PARAMETER};

/// Shell used when a script has no shebang line.
pub const DEFAULT_POSIX_SHELL: &str = "/bin/sh";

/// Interpreter used for every script on Windows hosts.
pub const POWERSHELL: &str = "PowerShell";

const POWERSHELL_ARGS: [&str; 3] = ["-ExecutionPolicy", "Bypass", "-Command"];

const SHEBANG: &str = "#!";

/// Shells that get `-e` appended when their shebang carries no options.
const KNOWN_SHELLS: [&str; 4] = ["ksh", "bash", "sh", "zsh"];

/// Operating system family of the worker host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Posix,
    Windows,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// How the materialized file is handed to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launcher {
    /// The file path is passed as the last interpreter argument.
    Posix,
    /// The file gets a `.PS1` extension and is invoked through a wrapper
    /// command that stops on the first error and forwards `$LastExitCode`.
    PowerShell,
}

/// Parser settings that would otherwise be process-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDefaults {
    pub posix_shell: String,
}

impl Default for ScriptDefaults {
    fn default() -> Self {
        Self {
            posix_shell: DEFAULT_POSIX_SHELL.to_string(),
        }
    }
}

/// Normalized, ready-to-materialize script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    /// Never empty.
    pub body: Vec<u8>,
    pub launcher: Launcher,
}

/// Build a [`ScriptSpec`] from the step parameters.
pub fn parse_script(
    params: &[Parameter],
    host: HostOs,
    defaults: &ScriptDefaults,
) -> Result<ScriptSpec, ScriptError> {
    let content = find_parameter(params, SCRIPT_PARAMETER)
        .map(|p| p.value.as_str())
        .filter(|v| !v.is_empty())
        .ok_or(ScriptError::MissingScript)?;

    let spec = match host {
        HostOs::Windows => ScriptSpec {
            interpreter: POWERSHELL.to_string(),
            interpreter_args: POWERSHELL_ARGS.iter().map(|s| s.to_string()).collect(),
            body: content.as_bytes().to_vec(),
            launcher: Launcher::PowerShell,
        },
        HostOs::Posix if content.starts_with(SHEBANG) => parse_shebang(content),
        HostOs::Posix => ScriptSpec {
            interpreter: defaults.posix_shell.clone(),
            interpreter_args: vec!["-e".to_string()],
            body: content.as_bytes().to_vec(),
            launcher: Launcher::Posix,
        },
    };

    // A script made of a lone shebang line has nothing left to run.
    if spec.body.is_empty() {
        return Err(ScriptError::MissingScript);
    }
    Ok(spec)
}

fn parse_shebang(content: &str) -> ScriptSpec {
    let (first_line, rest) = content.split_once('\n').unwrap_or((content, ""));
    let line = first_line
        .strip_prefix(SHEBANG)
        .unwrap_or(first_line)
        .trim_end_matches([' ', '\t', '\r', '\n']);

    let mut tokens = line.split(' ').filter(|t| !t.is_empty()).map(str::to_string);
    let interpreter = tokens.next().unwrap_or_default();
    let mut interpreter_args: Vec<String> = tokens.collect();

    if interpreter_args.is_empty() && is_shell(&interpreter) {
        interpreter_args.push("-e".to_string());
    }

    ScriptSpec {
        interpreter,
        interpreter_args,
        body: rest.as_bytes().to_vec(),
        launcher: Launcher::Posix,
    }
}

fn is_shell(interpreter: &str) -> bool {
    KNOWN_SHELLS.iter().any(|s| interpreter.ends_with(s))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
