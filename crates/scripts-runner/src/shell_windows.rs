use std::{io::Write, process::Command};

use crate::ScriptsRunnerError;

/// Build the platform shell invocation: `pwsh`, then `powershell`, then
/// `cmd`. The returned temp file, when present, backs a `.cmd` wrapper and
/// must outlive the command.
pub(crate) fn shell_command(
    script: &str,
    args: &[String],
) -> Result<(Command, Option<tempfile::NamedTempFile>), ScriptsRunnerError> {
    for name in ["pwsh", "powershell"] {
        if let Ok(shell) = which::which(name) {
            let mut command = Command::new(shell);
            command
                .arg("-NoProfile")
                .arg("-NonInteractive")
                .arg("-Command")
                .arg(format!("& {{ {script} }} @args; exit $LASTEXITCODE"))
                .args(args);
            return Ok((command, None));
        }
    }

    if let Ok(cmd) = which::which("cmd") {
        // cmd has no "$@" equivalent on the command line; use a wrapper
        // script with %* inside it. CRLF endings for .cmd files.
        let mut wrapper =
            tempfile::Builder::new().prefix("jmod-run-").suffix(".cmd").tempfile()?;
        wrapper.write_all(format!("@echo off\r\n{script} %*\r\n").as_bytes())?;
        let mut command = Command::new(cmd);
        command.arg("/d").arg("/c").arg(wrapper.path()).args(args);
        return Ok((command, Some(wrapper)));
    }

    Err(ScriptsRunnerError::NoShell)
}
