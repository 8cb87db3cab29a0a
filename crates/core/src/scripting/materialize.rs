//! Script materializer.
//!
//! Writes a [`ScriptSpec`] body to a uniquely named file under the worker's
//! base directory and returns a [`MaterializedScript`] guard. The guard owns
//! the file: dropping it (or calling [`MaterializedScript::release`]) deletes
//! it, so every exit path of the caller cleans up.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::spec::{Launcher, ScriptSpec};
use crate::error::ScriptError;

/// Prefix of every generated script file name.
pub const SCRIPT_FILE_PREFIX: &str = "cds-";

const POWERSHELL_EXTENSION: &str = ".PS1";

#[cfg(unix)]
const SCRIPT_MODE: u32 = 0o755;

/// A script file on disk together with the full command line to run it.
#[derive(Debug)]
pub struct MaterializedScript {
    path: PathBuf,
    interpreter: String,
    args: Vec<String>,
    released: bool,
}

impl MaterializedScript {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Interpreter arguments, ending with the script path (or the
    /// PowerShell wrapper command that invokes it).
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Delete the script file. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot remove script file");
            }
        }
    }
}

impl Drop for MaterializedScript {
    fn drop(&mut self) {
        self.release();
    }
}

/// Write `spec` to a fresh file in `basedir` and make it executable.
pub fn materialize(spec: &ScriptSpec, basedir: &Path) -> Result<MaterializedScript, ScriptError> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRIPT_FILE_PREFIX)
        .tempfile_in(basedir)
        .map_err(|e| {
            tracing::warn!(basedir = %basedir.display(), error = %e, "Cannot create tmp file");
            ScriptError::TempFileCreate(e)
        })?;

    // `write_all` retries short writes; anything it cannot finish is an error.
    // On failure the unpersisted temp file removes itself.
    file.write_all(&spec.body)
        .and_then(|()| file.flush())
        .map_err(|e| {
            tracing::warn!(error = %e, "Cannot write script");
            ScriptError::TempFileWrite(e)
        })?;

    let (_, written_path) = file.keep().map_err(|e| {
        tracing::warn!(error = %e.error, "Cannot keep script file");
        ScriptError::TempFileWrite(e.error)
    })?;

    let mut script = MaterializedScript {
        path: written_path,
        interpreter: spec.interpreter.clone(),
        args: spec.interpreter_args.clone(),
        released: false,
    };

    match spec.launcher {
        Launcher::Posix => {
            script.args.push(script.path.to_string_lossy().into_owned());
        }
        Launcher::PowerShell => {
            let renamed = powershell_path(&script.path);
            std::fs::rename(&script.path, &renamed).map_err(|e| {
                tracing::warn!(path = %script.path.display(), error = %e, "Cannot rename script");
                ScriptError::Rename(e)
            })?;
            script.path = renamed;
            script.args.push(powershell_command(&script.path));
        }
    }

    make_executable(&script.path).map_err(|e| {
        tracing::warn!(path = %script.path.display(), error = %e, "Cannot chmod script");
        ScriptError::Chmod(e)
    })?;

    Ok(script)
}

/// Drop every `.txt` from the generated name and add the `.PS1` extension.
fn powershell_path(path: &Path) -> PathBuf {
    let stripped = path.to_string_lossy().replace(".txt", "");
    PathBuf::from(format!("{stripped}{POWERSHELL_EXTENSION}"))
}

/// One-liner that stops on the first error and exits with the script's code.
fn powershell_command(path: &Path) -> String {
    format!(
        "& {{ $ErrorActionPreference='Stop'; & {} ;exit $LastExitCode}}",
        path.display()
    )
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SCRIPT_MODE))
}

#[cfg(not(unix))]
fn make_executable(path: &Path) -> std::io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    std::fs::set_permissions(path, perms)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn posix_spec(body: &str) -> ScriptSpec {
        ScriptSpec {
            interpreter: "/bin/sh".into(),
            interpreter_args: vec!["-e".into()],
            body: body.as_bytes().to_vec(),
            launcher: Launcher::Posix,
        }
    }

    #[test]
    fn writes_body_and_appends_path() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let script = materialize(&posix_spec("echo hi\n"), dir.path()).expect("materialize");

        assert!(script.path().starts_with(dir.path()));
        let name = script.path().file_name().expect("file name").to_string_lossy();
        assert!(name.starts_with("cds-"));
        assert_eq!(std::fs::read(script.path()).expect("read"), b"echo hi\n");
        assert_eq!(script.interpreter(), "/bin/sh");
        assert_eq!(
            script.args(),
            &["-e".to_string(), script.path().to_string_lossy().into_owned()]
        );
    }

    #[cfg(unix)]
    #[test]
    fn file_is_executable_by_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("create temp dir");
        let script = materialize(&posix_spec("true"), dir.path()).expect("materialize");
        let mode = std::fs::metadata(script.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn unique_names_per_call() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let a = materialize(&posix_spec("a"), dir.path()).expect("materialize");
        let b = materialize(&posix_spec("b"), dir.path()).expect("materialize");
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn release_removes_file_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut script = materialize(&posix_spec("echo hi"), dir.path()).expect("materialize");
        let path = script.path().to_path_buf();
        assert!(path.exists());

        script.release();
        assert!(!path.exists());
        script.release();
        drop(script);
        assert!(!path.exists());
    }

    #[test]
    fn drop_releases_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = {
            let script = materialize(&posix_spec("echo hi"), dir.path()).expect("materialize");
            script.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_basedir_is_create_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("does-not-exist");
        let result = materialize(&posix_spec("echo hi"), &missing);
        assert_matches!(result, Err(ScriptError::TempFileCreate(_)));
    }

    #[test]
    fn powershell_launcher_renames_and_wraps() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let spec = ScriptSpec {
            interpreter: "PowerShell".into(),
            interpreter_args: vec!["-ExecutionPolicy".into(), "Bypass".into(), "-Command".into()],
            body: b"Write-Host hi".to_vec(),
            launcher: Launcher::PowerShell,
        };
        let script = materialize(&spec, dir.path()).expect("materialize");

        assert!(script.path().to_string_lossy().ends_with(".PS1"));
        assert_eq!(std::fs::read(script.path()).expect("read"), b"Write-Host hi");

        let last = script.args().last().expect("wrapper arg");
        assert!(last.starts_with("& { $ErrorActionPreference='Stop'; & "));
        assert!(last.ends_with(" ;exit $LastExitCode}"));
        assert!(last.contains(&*script.path().to_string_lossy()));
        assert_eq!(script.args().len(), 4);
    }

    #[test]
    fn powershell_path_strips_txt() {
        let p = powershell_path(Path::new("/tmp/cds-123.txt"));
        assert_eq!(p, PathBuf::from("/tmp/cds-123.PS1"));
        let p = powershell_path(Path::new("/tmp/cds-abc"));
        assert_eq!(p, PathBuf::from("/tmp/cds-abc.PS1"));
    }
}
