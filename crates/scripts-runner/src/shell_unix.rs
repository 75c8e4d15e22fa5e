use std::process::Command;

use crate::ScriptsRunnerError;

fn default_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    if let Ok(sh) = which::which("sh") {
        return sh.display().to_string();
    }
    "/bin/sh".to_string()
}

/// Build `sh -c '<script> "$@"' _ <args…>`.
///
/// `"$@"` expands each argument as a separate word, preserving spaces and
/// special characters. This is POSIX sh-safe.
pub(crate) fn shell_command(
    script: &str,
    args: &[String],
) -> Result<(Command, Option<tempfile::NamedTempFile>), ScriptsRunnerError> {
    let mut command = Command::new(default_shell());
    command.arg("-c").arg(format!("{script} \"$@\"")).arg("_").args(args);
    Ok((command, None))
}
