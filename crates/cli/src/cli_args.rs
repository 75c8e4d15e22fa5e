use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Package manager for JavaScript projects.
#[derive(Debug, Parser)]
#[clap(name = "jmod")]
#[clap(bin_name = "jmod")]
#[clap(version)]
#[clap(about = "Package manager for JavaScript projects")]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: CliCommand,

    /// Set working directory.
    #[clap(short = 'C', long, default_value = ".", global = true)]
    pub dir: PathBuf,

    /// Verbose output.
    #[clap(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Initialize a new project manifest
    Init,
    /// Add new dependencies
    Add(AddArgs),
    /// Remove dependencies
    #[clap(aliases = ["rm", "uninstall"])]
    Remove(RemoveArgs),
    /// Install dependencies from the manifest
    #[clap(aliases = ["i", "get", "pull"])]
    Install(InstallArgs),
    /// Run a script from the manifest
    Run(RunArgs),
    /// List the declared dependencies of every workspace
    List,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Packages to add (`name[@version-or-tag]`)
    #[clap(required = true)]
    pub packages: Vec<String>,

    /// Add as dev dependencies
    #[clap(short = 'D', long)]
    pub dev: bool,

    /// Module to add the dependencies to
    #[clap(long = "mod", default_value = ".")]
    pub module: PathBuf,

    /// Skip lifecycle scripts
    #[clap(long)]
    pub ignore_scripts: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Dependencies to remove
    #[clap(required = true)]
    pub packages: Vec<String>,

    /// Module to remove the dependencies from
    #[clap(long = "mod", default_value = ".")]
    pub module: PathBuf,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Skip lifecycle scripts
    #[clap(long)]
    pub ignore_scripts: bool,

    /// Skip devDependencies
    #[clap(long)]
    pub production: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script to run
    pub command: String,

    /// Arguments forwarded to the script
    #[clap(allow_hyphen_values = true, trailing_var_arg = true)]
    pub args: Vec<String>,

    /// Do not error when the script is missing
    #[clap(long)]
    pub if_present: bool,

    /// Module to run the script in
    #[clap(long = "mod", default_value = ".")]
    pub module: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_aliases_parse() {
        for alias in ["install", "i", "get", "pull"] {
            let cli = CliArgs::parse_from(["jmod", alias, "--production"]);
            let CliCommand::Install(args) = cli.command else {
                panic!("expected install command for {alias}");
            };
            assert!(args.production);
            assert!(!args.ignore_scripts);
        }
    }

    #[test]
    fn add_parses_packages_and_flags() {
        let cli = CliArgs::parse_from(["jmod", "add", "-D", "leftpad@^1.3.0", "fastify"]);
        let CliCommand::Add(args) = cli.command else {
            panic!("expected add command");
        };
        assert!(args.dev);
        assert_eq!(args.packages, ["leftpad@^1.3.0", "fastify"]);
    }

    #[test]
    fn remove_aliases_parse() {
        for alias in ["remove", "rm", "uninstall"] {
            let cli = CliArgs::parse_from(["jmod", alias, "leftpad"]);
            assert!(matches!(cli.command, CliCommand::Remove(_)), "alias {alias}");
        }
    }

    #[test]
    fn run_forwards_trailing_args() {
        let cli = CliArgs::parse_from(["jmod", "run", "lint", "--fix", "src"]);
        let CliCommand::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.command, "lint");
        assert_eq!(args.args, ["--fix", "src"]);
    }

    #[test]
    fn global_dir_flag_parses() {
        let cli = CliArgs::parse_from(["jmod", "install", "-C", "/tmp/project"]);
        assert_eq!(cli.dir, PathBuf::from("/tmp/project"));
    }
}
