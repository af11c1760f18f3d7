//! Self-replacement of the running executable.
//!
//! A running binary cannot reliably overwrite itself, so the swap is delegated
//! to a short-lived helper script: it waits for this process to exit, moves the
//! downloaded file over the executable, relaunches it and deletes itself.
//!
//! `Idle -> ScriptWritten -> Relaunching -> Terminated`

use std::convert::Infallible;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{self, Command, Stdio};
use tracing::{error, info};
use crate::error::EngineError;

/// Seconds the helper waits before touching the executable.
pub const RELAUNCH_DELAY_SECS: u32 = 2;

#[cfg(windows)]
pub const SCRIPT_NAME: &str = "update.bat";
#[cfg(not(windows))]
pub const SCRIPT_NAME: &str = "update.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    Idle,
    ScriptWritten,
    Relaunching,
    Terminated,
}

/// Drives the replace-and-relaunch protocol for one downloaded update.
#[derive(Debug)]
pub struct UpdateApplier {
    state: ApplyState,
    update_file: PathBuf,
    executable: PathBuf,
    script_path: PathBuf,
}

impl UpdateApplier {
    pub fn new(update_file: &Path, executable: &Path, script_dir: &Path) -> Result<Self, EngineError> {
        let script_path = absolutize(&script_dir.join(SCRIPT_NAME))?;
        Ok(UpdateApplier {
            state: ApplyState::Idle,
            update_file: absolutize(update_file)?,
            executable: absolutize(executable)?,
            script_path,
        })
    }

    /// Applier that replaces the currently running executable.
    pub fn for_current_exe(update_file: &Path, script_dir: &Path) -> Result<Self, EngineError> {
        let executable = env::current_exe().map_err(|e| EngineError::UpdateApply {
            path: PathBuf::from("<current executable>"),
            source: e,
        })?;
        Self::new(update_file, &executable, script_dir)
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    fn fail(&self, source: io::Error) -> EngineError {
        EngineError::UpdateApply {
            path: self.script_path.clone(),
            source,
        }
    }

    /// `Idle -> ScriptWritten`: write the helper script to disk.
    pub fn write_script(&mut self) -> Result<&Path, EngineError> {
        if self.state != ApplyState::Idle {
            return Err(self.fail(io::Error::other(format!(
                "cannot write helper script in state {:?}",
                self.state
            ))));
        }

        let script = render_script(&self.update_file, &self.executable);
        fs::write(&self.script_path, script).map_err(|e| self.fail(e))?;
        make_executable(&self.script_path).map_err(|e| self.fail(e))?;

        info!(script = %self.script_path.display(), "wrote update helper script");
        self.state = ApplyState::ScriptWritten;
        Ok(&self.script_path)
    }

    /// `ScriptWritten -> Relaunching`: start the helper detached from this process.
    ///
    /// On failure the script is removed and the applier returns to `Idle`.
    pub fn launch(&mut self) -> Result<(), EngineError> {
        if self.state != ApplyState::ScriptWritten {
            return Err(self.fail(io::Error::other(format!(
                "cannot launch helper script in state {:?}",
                self.state
            ))));
        }

        if let Err(e) = spawn_detached(&self.script_path) {
            error!(script = %self.script_path.display(), error = %e, "failed to launch update helper");
            let _ = fs::remove_file(&self.script_path);
            self.state = ApplyState::Idle;
            return Err(self.fail(e));
        }

        info!("update helper launched");
        self.state = ApplyState::Relaunching;
        Ok(())
    }

    /// Run the whole protocol and exit the process.
    ///
    /// Only returns on failure, in which case the current process is left
    /// running and unmodified.
    pub fn apply(mut self) -> Result<Infallible, EngineError> {
        self.write_script()?;
        self.launch()?;

        self.state = ApplyState::Terminated;
        info!("exiting for update");
        process::exit(0)
    }
}

/// Absolute form of `path`, relative paths being resolved against the working directory.
fn absolutize(path: &Path) -> Result<PathBuf, EngineError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| EngineError::UpdateApply {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Helper script contents for this platform.
#[cfg(windows)]
pub fn render_script(update_file: &Path, executable: &Path) -> String {
    format!(
        "@echo off\r\n\
         echo Updating Job Manager...\r\n\
         timeout /t {delay} /nobreak > nul\r\n\
         move /y \"{update}\" \"{exe}\"\r\n\
         start \"\" \"{exe}\"\r\n\
         del \"%~f0\"\r\n",
        delay = RELAUNCH_DELAY_SECS,
        update = update_file.display(),
        exe = executable.display(),
    )
}

/// Helper script contents for this platform.
#[cfg(not(windows))]
pub fn render_script(update_file: &Path, executable: &Path) -> String {
    let update = shell_quote(update_file);
    let exe = shell_quote(executable);
    format!(
        "#!/bin/sh\n\
         echo \"Updating Job Manager...\"\n\
         sleep {delay}\n\
         mv -f {update} {exe}\n\
         chmod +x {exe}\n\
         {exe} >/dev/null 2>&1 &\n\
         rm -f \"$0\"\n",
        delay = RELAUNCH_DELAY_SECS,
    )
}

#[cfg(not(windows))]
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(windows)]
fn spawn_detached(script: &Path) -> io::Result<()> {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

    Command::new("cmd")
        .arg("/C")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP)
        .spawn()
        .map(|_| ())
}

#[cfg(not(windows))]
fn spawn_detached(script: &Path) -> io::Result<()> {
    #[cfg(unix)]
    use std::os::unix::process::CommandExt;

    let mut command = Command::new("sh");
    command
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    command.process_group(0);
    command.spawn().map(|_| ())
}
