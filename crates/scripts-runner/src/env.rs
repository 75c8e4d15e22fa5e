use std::{
    ffi::OsString,
    path::Path,
    process::Command,
    sync::OnceLock,
};

/// npm contract variables shared by every script invocation. Computed once;
/// probing `node --version` is not worth repeating per script.
pub(crate) fn default_env() -> &'static Vec<(String, String)> {
    static DEFAULT_ENV: OnceLock<Vec<(String, String)>> = OnceLock::new();
    DEFAULT_ENV.get_or_init(|| {
        let execpath = std::env::current_exe()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| std::env::args().next().unwrap_or_default());
        let node_version = node_version();

        let mut env = vec![
            ("npm_execpath".to_string(), execpath),
            ("npm_config_global".to_string(), "false".to_string()),
            ("npm_config_production".to_string(), arg_flag("--production")),
            ("npm_config_save".to_string(), arg_flag("--safe")),
            (
                "npm_config_registry".to_string(),
                "https://registry.npmjs.org/".to_string(),
            ),
            ("NODE_ENV".to_string(), "production".to_string()),
            ("NODE_VERSION".to_string(), node_version.clone()),
            ("npm_config_arch".to_string(), std::env::consts::ARCH.to_string()),
            ("npm_config_platform".to_string(), std::env::consts::OS.to_string()),
            ("npm_config_tmp".to_string(), std::env::temp_dir().display().to_string()),
            (
                "npm_config_user_agent".to_string(),
                format!(
                    "jmod/{} node/{} {} {}",
                    env!("CARGO_PKG_VERSION"),
                    node_version,
                    std::env::consts::OS,
                    std::env::consts::ARCH
                ),
            ),
        ];

        if let Some(runner) = default_js_runner() {
            env.push(("npm_node_execpath".to_string(), runner.to_string()));
        }
        if let Ok(node_gyp) = which::which("node-gyp") {
            env.push(("npm_config_node_gyp".to_string(), node_gyp.display().to_string()));
        }

        env
    })
}

fn arg_flag(flag: &str) -> String {
    if std::env::args().any(|arg| arg == flag) { "true" } else { "false" }.to_string()
}

fn node_version() -> String {
    let Ok(node) = which::which("node") else {
        return "?".to_string();
    };
    Command::new(node)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Preferred JS runtime: `bun`, then `node`.
pub(crate) fn default_js_runner() -> Option<&'static str> {
    static RUNNER: OnceLock<Option<String>> = OnceLock::new();
    RUNNER
        .get_or_init(|| {
            which::which("bun")
                .or_else(|_| which::which("node"))
                .ok()
                .map(|path| path.display().to_string())
        })
        .as_deref()
}

/// `PATH` with the workspace's `node_modules/.bin` prepended.
pub(crate) fn bin_path(dir: &Path) -> OsString {
    let bin_dir = dir.join("node_modules").join(".bin");
    let current = std::env::var_os("PATH").unwrap_or_default();
    std::env::join_paths(std::iter::once(bin_dir).chain(std::env::split_paths(&current)))
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_env_carries_the_npm_contract() {
        let env = default_env();
        let get = |key: &str| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        assert_eq!(get("npm_config_global"), Some("false"));
        assert_eq!(get("NODE_ENV"), Some("production"));
        assert_eq!(get("npm_config_registry"), Some("https://registry.npmjs.org/"));
        assert_eq!(get("npm_config_platform"), Some(std::env::consts::OS));
        assert!(get("NODE_VERSION").is_some());
        assert!(get("npm_config_user_agent").is_some());
    }

    #[test]
    fn bin_path_prepends_workspace_bin() {
        let joined = bin_path(Path::new("/workspace"));
        let first = std::env::split_paths(&joined).next().unwrap();
        assert_eq!(first, Path::new("/workspace/node_modules/.bin"));
    }
}
