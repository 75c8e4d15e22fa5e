//! Execution of manifest scripts with the npm environment contract.
//!
//! Scripts whose value is a path to an existing JS file run under a JS
//! runtime (`bun` preferred, then `node`); everything else goes through the
//! platform shell with positional arguments forwarded.

mod env;
#[cfg(unix)]
mod shell_unix;
#[cfg(windows)]
mod shell_windows;

use std::{collections::HashMap, fs, path::Path, process::Command};

use jmod_diagnostics::{
    miette::{self, Diagnostic},
    thiserror::{self, Error},
    tracing,
};
use serde::Deserialize;

#[cfg(unix)]
use shell_unix::shell_command;
#[cfg(windows)]
use shell_windows::shell_command;

#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ScriptsRunnerError {
    #[error(transparent)]
    #[diagnostic(code(jmod_scripts_runner::io_error))]
    Io(#[from] std::io::Error),

    #[error("decode {path}: {source}")]
    #[diagnostic(code(jmod_scripts_runner::manifest_parse))]
    ManifestParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("script not found: {0}")]
    #[diagnostic(code(jmod_scripts_runner::script_not_found))]
    ScriptNotFound(String),

    #[error("no JS runtime found (tried bun, node)")]
    #[diagnostic(code(jmod_scripts_runner::no_js_runtime))]
    NoJsRuntime,

    #[error("no shell found")]
    #[diagnostic(code(jmod_scripts_runner::no_shell))]
    NoShell,

    #[error("script {script:?} failed: {output}")]
    #[diagnostic(code(jmod_scripts_runner::script_failed))]
    Failed { script: String, output: String },
}

/// Value of `npm_command` in the script environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpmCommand {
    Install,
    Run,
}

impl NpmCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            NpmCommand::Install => "install",
            NpmCommand::Run => "run",
        }
    }
}

const JS_EXTENSIONS: [&str; 6] = ["js", "mjs", "cjs", "ts", "mts", "cts"];

#[derive(Deserialize)]
struct ScriptsManifest {
    #[serde(default)]
    scripts: HashMap<String, String>,
}

/// Run `script_name` from the manifest in `dir`.
///
/// The child inherits the process environment, gets
/// `<dir>/node_modules/.bin` prepended to `PATH`, the npm contract
/// variables from [`env`], plus the caller's `extra_env`. When a lifecycle
/// event is among them, `npm_lifecycle_script` is added as well.
pub fn run(
    dir: &Path,
    script_name: &str,
    args: &[String],
    command: NpmCommand,
    extra_env: &[(String, String)],
) -> Result<(), ScriptsRunnerError> {
    let manifest_path = dir.join("package.json");
    let contents = fs::read_to_string(&manifest_path)?;
    let manifest: ScriptsManifest =
        serde_json::from_str(&contents).map_err(|source| ScriptsRunnerError::ManifestParse {
            path: manifest_path.display().to_string(),
            source,
        })?;
    let Some(script) = manifest.scripts.get(script_name) else {
        return Err(ScriptsRunnerError::ScriptNotFound(script_name.to_string()));
    };

    let mut envs: Vec<(String, String)> = env::default_env().clone();
    envs.push(("npm_command".to_string(), command.as_str().to_string()));
    envs.push(("npm_package_json".to_string(), manifest_path.display().to_string()));
    envs.extend(extra_env.iter().cloned());
    if envs.iter().any(|(key, _)| key == "npm_lifecycle_event") {
        envs.push(("npm_lifecycle_script".to_string(), script.clone()));
    }

    if is_js_file(dir, script) {
        return run_js_script(dir, script_name, script, args, &envs);
    }

    let (mut shell, _wrapper) = shell_command(script, args)?;
    execute(&mut shell, dir, script_name, &envs)
}

fn is_js_file(dir: &Path, script: &str) -> bool {
    let has_js_extension = Path::new(script)
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| JS_EXTENSIONS.contains(&extension));
    has_js_extension && dir.join(script).is_file()
}

fn run_js_script(
    dir: &Path,
    script_name: &str,
    script: &str,
    args: &[String],
    envs: &[(String, String)],
) -> Result<(), ScriptsRunnerError> {
    let runner = env::default_js_runner().ok_or(ScriptsRunnerError::NoJsRuntime)?;
    let mut command = Command::new(runner);
    command.arg(script).args(args);
    execute(&mut command, dir, script_name, envs)
}

fn execute(
    command: &mut Command,
    dir: &Path,
    script_name: &str,
    envs: &[(String, String)],
) -> Result<(), ScriptsRunnerError> {
    command
        .current_dir(dir)
        .envs(envs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .env("PATH", env::bin_path(dir));

    let output = command.output()?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim().to_string();

    if !output.status.success() {
        return Err(ScriptsRunnerError::Failed {
            script: script_name.to_string(),
            output: if combined.is_empty() { output.status.to_string() } else { combined },
        });
    }

    if combined.is_empty() {
        tracing::debug!(dir = %dir.display(), script = script_name, "script ran with no output");
    } else {
        tracing::debug!(dir = %dir.display(), script = script_name, output = %combined, "script ran");
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn workspace(scripts: &str) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            format!(r#"{{ "name": "fixture", "scripts": {scripts} }}"#),
        )
        .unwrap();
        dir
    }

    #[test]
    fn missing_script_is_a_typed_error() {
        let dir = workspace("{}");
        let error = run(dir.path(), "build", &[], NpmCommand::Run, &[]).unwrap_err();
        assert!(matches!(error, ScriptsRunnerError::ScriptNotFound(_)));
    }

    #[test]
    fn runs_shell_scripts_in_the_workspace_dir() {
        let dir = workspace(r#"{ "touchit": "touch created.txt" }"#);
        run(dir.path(), "touchit", &[], NpmCommand::Run, &[]).unwrap();
        assert!(dir.path().join("created.txt").is_file());
    }

    #[test]
    fn forwards_positional_args_safely() {
        let dir = workspace(r#"{ "emit": "printf %s \"$1\" > out.txt" }"#);
        run(dir.path(), "emit", &["hello world".to_string()], NpmCommand::Run, &[]).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello world");
    }

    #[test]
    fn lifecycle_env_reaches_the_script() {
        let dir = workspace(
            r#"{ "show": "printf '%s|%s' \"$npm_lifecycle_event\" \"$npm_command\" > env.txt" }"#,
        );
        run(
            dir.path(),
            "show",
            &[],
            NpmCommand::Install,
            &[("npm_lifecycle_event".to_string(), "postinstall".to_string())],
        )
        .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("env.txt")).unwrap(), "postinstall|install");
    }

    #[test]
    fn bin_dir_is_on_path() {
        let dir = workspace(r#"{ "tool": "mytool" }"#);
        let bin_dir = dir.path().join("node_modules/.bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let tool = bin_dir.join("mytool");
        fs::write(&tool, "#!/bin/sh\nprintf ok > tool-ran.txt\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        run(dir.path(), "tool", &[], NpmCommand::Run, &[]).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("tool-ran.txt")).unwrap(), "ok");
    }

    #[test]
    fn failing_script_carries_its_output() {
        let dir = workspace(r#"{ "bad": "echo boom >&2; exit 3" }"#);
        let error = run(dir.path(), "bad", &[], NpmCommand::Run, &[]).unwrap_err();
        match error {
            ScriptsRunnerError::Failed { script, output } => {
                assert_eq!(script, "bad");
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
