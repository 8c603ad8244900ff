// ABOUTME: Entry point for the whaler CLI application.
// ABOUTME: Parses arguments and dispatches to the orchestrator.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use whaler::config::{Frontend, Interpolator, Settings};
use whaler::deploy::Deployed;
use whaler::diagnostics::Diagnostics;
use whaler::error::{Error, Result};
use whaler::orchestrator::{ConfigRequest, InitRequest, Orchestrator, Target};
use whaler::output::{Output, OutputMode};
use whaler::registry::FileRegistry;
use whaler::runtime::{BollardRuntime, EngineEndpoint};
use whaler::types::AppName;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);
    output.start_timer();

    let mut diag = Diagnostics::default();
    let result = run(cli, &output, &mut diag).await;

    for warning in diag.take() {
        output.warning(&warning);
    }
    if let Err(e) = result {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: &Output, diag: &mut Diagnostics) -> Result<()> {
    let cwd = env::current_dir()?;
    let settings = Settings::load()?;
    let frontend = Frontend::detect();
    let registry = FileRegistry::new(settings.registry_path());

    let endpoint = match &cli.host {
        Some(host) => host.parse::<EngineEndpoint>()?,
        None => EngineEndpoint::default(),
    };
    let runtime = BollardRuntime::connect(&endpoint, settings.timeout).await?;
    tracing::debug!(endpoint = %endpoint, "connected to engine");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received");
            interrupt.cancel();
        }
    });

    let orchestrator = Orchestrator::new(
        &runtime,
        &registry,
        &settings,
        &frontend,
        output,
        &Interpolator,
        cwd.clone(),
        cancel.clone(),
    );

    let label = cli.command.label();
    tokio::select! {
        biased;
        result = dispatch(cli.command, &orchestrator, &cwd, output, diag) => result,
        _ = cancel.cancelled() => Err(Error::Interrupted(label.to_string())),
    }
}

async fn dispatch(
    command: Commands,
    orchestrator: &Orchestrator<'_, BollardRuntime, FileRegistry>,
    cwd: &Path,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<()> {
    match command {
        Commands::Init {
            name,
            path,
            env,
            file,
        } => {
            let path = path.unwrap_or_else(|| cwd.to_path_buf());
            let name = match name {
                Some(name) => AppName::new(&name)?,
                None => Target::parse(None, &path)?.app,
            };
            let app = orchestrator.init(&InitRequest {
                name,
                path: absolute(cwd, path),
                env,
                file: file.map(|f| absolute(cwd, f)),
            })?;
            output.success(&format!("Application \"{}\" initialized.", app.name));
        }
        Commands::Config {
            name,
            file,
            update,
            set_env,
            yml,
        } => {
            let target = Target::parse(name.as_deref(), cwd)?;
            let config = orchestrator.config(
                &target.app,
                &ConfigRequest {
                    file: file.map(|f| absolute(cwd, f)),
                    update,
                    set_env,
                    inline: yml,
                },
            )?;
            output.document(&config);
        }
        Commands::Vars { name } => {
            let app = name.as_deref().map(AppName::new).transpose()?;
            let vars = orchestrator.vars(app.as_ref())?;
            output.document(&vars);
        }
        Commands::Create { target, file } => {
            let target = Target::parse(target.as_deref(), cwd)?;
            let file = file.map(|f| absolute(cwd, f));
            let created = orchestrator.create(&target, file.as_deref(), diag).await?;
            report(output, "created", &target, &created);
        }
        Commands::Start { target, init } => {
            let target = Target::parse(target.as_deref(), cwd)?;
            let init = init.map(|file| file.map(|f| absolute(cwd, f)));
            let started = orchestrator.start(&target, init, diag).await?;
            report(output, "started", &target, &started);
        }
        Commands::Rebuild { target } => {
            let target = Target::parse(target.as_deref(), cwd)?;
            let rebuilt = orchestrator.rebuild(&target, diag).await?;
            report(output, "rebuilt", &target, &rebuilt);
        }
        Commands::Status { name } => {
            let app = Target::parse(name.as_deref(), cwd)?.app;
            let rows: Vec<Vec<String>> = orchestrator
                .status(&app)
                .await?
                .into_iter()
                .map(|row| {
                    vec![
                        row.name,
                        row.state.to_string(),
                        row.ip.unwrap_or_default(),
                        if row.volatile { "*" } else { "" }.to_string(),
                    ]
                })
                .collect();
            output.table(&["NAME", "STATUS", "IP", "VOLATILE"], &rows);
        }
        Commands::Remove { target, purge } => {
            let target = Target::parse(target.as_deref(), cwd)?;
            let removed = orchestrator.remove(&target, purge).await?;
            output.success(&format!(
                "Removed {} container(s) of \"{}\".",
                removed.len(),
                target
            ));
        }
    }

    Ok(())
}

fn report(output: &Output, verb: &str, target: &Target, containers: &Deployed) {
    output.success(&format!(
        "{} container(s) of \"{}\" {}.",
        containers.len(),
        target,
        verb
    ));
}

fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
