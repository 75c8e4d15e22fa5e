mod cli_args;

use std::process::ExitCode;

use clap::Parser;
use jmod_cancel::CancelToken;
use jmod_diagnostics::tracing;
use jmod_package_manager::{Install, State};
use jmod_package_manifest::{find_workspaces, DependencyGroup, PackageManifest};
use jmod_registry::{split_package_spec, DependencyChain};
use jmod_scripts_runner::{NpmCommand, ScriptsRunnerError};
use miette::{set_panic_hook, Context, IntoDiagnostic};

pub use cli_args::{AddArgs, CliArgs, CliCommand, InstallArgs, RemoveArgs, RunArgs};

pub async fn main() -> ExitCode {
    let cli = CliArgs::parse();
    jmod_diagnostics::enable_tracing_by_env();
    jmod_diagnostics::init_tracing(cli.verbose);
    set_panic_hook();

    let cancel = CancelToken::new();
    spawn_signal_handler(cancel.clone());

    let result = run(cli, cancel.clone()).await;

    // Cancellation (by signal or by the first failing dependency) owns the
    // exit message; later errors were dropped.
    if cancel.is_cancelled() {
        jmod_status::stop();
        let cause = cancel.cause().unwrap_or_else(|| "canceled".to_string());
        eprintln!("Error: {cause}");
        return ExitCode::FAILURE;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            jmod_status::stop();
            eprintln!("Error: {report:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CliArgs, cancel: CancelToken) -> miette::Result<()> {
    let CliArgs { command, dir, .. } = cli;
    let state = || -> miette::Result<&'static State> {
        Ok(State::new(cancel.clone()).wrap_err("initializing the state")?.leak())
    };

    match command {
        CliCommand::Init => {
            // init throws an error if a manifest already exists
            PackageManifest::init(&dir.join("package.json"))
                .wrap_err("initialize package.json")?;
            tracing::info!("project initialized");
        }
        CliCommand::Add(args) => {
            let state = state()?;
            let manifest_dir = dir.join(&args.module);
            let mut manifest =
                PackageManifest::from_dir(&manifest_dir).wrap_err("loading the manifest")?;
            let group = if args.dev { DependencyGroup::Dev } else { DependencyGroup::Prod };

            for package in &args.packages {
                let (name, version) = split_package_spec(package);
                let version_or_tag = version.unwrap_or("latest");
                let spec = jmod_registry::get_version(
                    &state.http_client,
                    &state.registry,
                    name,
                    version_or_tag,
                )
                .await
                .wrap_err_with(|| format!("resolving {package}"))?;
                manifest.add_dependency(name, &spec, group).wrap_err("updating the manifest")?;
                jmod_status::log(format!("added npm package {name} version {spec}"));
            }
            manifest.save().wrap_err("saving the manifest")?;

            Install {
                state,
                root: dir,
                ignore_scripts: args.ignore_scripts,
                dev: true,
                optional: true,
                chain: DependencyChain::new(),
            }
            .run()
            .await
            .wrap_err("installing dependencies")?;
        }
        CliCommand::Remove(args) => {
            let manifest_dir = dir.join(&args.module);
            let mut manifest =
                PackageManifest::from_dir(&manifest_dir).wrap_err("loading the manifest")?;
            for package in &args.packages {
                manifest
                    .remove_dependency(package)
                    .wrap_err_with(|| format!("uninstall {package}"))?;
            }
            manifest.save().wrap_err("saving the manifest")?;
        }
        CliCommand::Install(args) => {
            let state = state()?;
            Install {
                state,
                root: dir,
                ignore_scripts: args.ignore_scripts,
                dev: !args.production,
                optional: true,
                chain: DependencyChain::new(),
            }
            .run()
            .await
            .wrap_err("installing dependencies")?;
        }
        CliCommand::Run(args) => {
            let run_dir = dir.join(&args.module);
            let result = tokio::task::spawn_blocking(move || {
                jmod_scripts_runner::run(
                    &run_dir,
                    &args.command,
                    &args.args,
                    NpmCommand::Run,
                    &[],
                )
            })
            .await
            .into_diagnostic()?;
            match result {
                Ok(()) => {}
                Err(ScriptsRunnerError::ScriptNotFound(_)) if args.if_present => {}
                Err(error) => Err(error).wrap_err("running the script")?,
            }
        }
        CliCommand::List => {
            for (index, workspace) in find_workspaces(&dir).iter().enumerate() {
                if index > 0 {
                    println!();
                }
                println!("module: {}", workspace.path().display());
                for (name, spec) in workspace.dependencies([
                    DependencyGroup::Prod,
                    DependencyGroup::Dev,
                    DependencyGroup::Optional,
                ]) {
                    println!("  {name}@{spec}");
                }
            }
        }
    }

    Ok(())
}

fn spawn_signal_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let signals = (
                signal(SignalKind::interrupt()),
                signal(SignalKind::terminate()),
                signal(SignalKind::hangup()),
                signal(SignalKind::quit()),
            );
            let (Ok(mut interrupt), Ok(mut terminate), Ok(mut hangup), Ok(mut quit)) = signals
            else {
                tracing::warn!("failed to install signal handlers");
                return;
            };
            let signal_name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
                _ = hangup.recv() => "SIGHUP",
                _ = quit.recv() => "SIGQUIT",
            };
            cancel.cancel_with_cause(format!("received {signal_name}"));
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel_with_cause("received interrupt");
            }
        }
    });
}
