// ABOUTME: Entry point for the otto CLI application.
// ABOUTME: Parses arguments and dispatches release operations to each server.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use otto::config::{self, BackendKind, Config, ServerConfig};
use otto::error::{Error, Result};
use otto::exec::SshExecutor;
use otto::output::{Output, OutputMode};
use otto::release::{
    DirProducer, EtcActivation, GitTagStore, ReleaseLock, ReleaseManager, ReleaseStatus,
    RevisionProducer, TarballStore,
};
use otto::ssh::{Session, SessionConfig};
use otto::types::VersionId;
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    let result = run(cli, &output).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    match cli.command {
        Commands::Init { site, force } => {
            let cwd = env::current_dir().expect("Failed to get current directory");
            config::init_config(&cwd, site.as_deref(), force)?;
            output.success("Wrote otto.yml");
            Ok(())
        }
        Commands::Stage { revision, force } => {
            let config = discover_config()?;
            for server in &config.servers {
                stage_on_server(&config, server, revision.as_deref(), force, output).await?;
            }
            Ok(())
        }
        Commands::Deploy { force } => {
            let config = discover_config()?;
            for server in &config.servers {
                deploy_on_server(&config, server, force, output).await?;
            }
            Ok(())
        }
        Commands::Rollback { target, force } => {
            let config = discover_config()?;
            let target = target
                .as_deref()
                .map(VersionId::parse)
                .transpose()
                .map_err(|e| Error::InvalidVersion(e.to_string()))?;
            for server in &config.servers {
                rollback_on_server(&config, server, target.as_ref(), force, output).await?;
            }
            Ok(())
        }
        Commands::Cleanup { retain, force } => {
            let config = discover_config()?;
            for server in &config.servers {
                cleanup_on_server(&config, server, retain, force, output).await?;
            }
            Ok(())
        }
        Commands::List => {
            let config = discover_config()?;
            for server in &config.servers {
                list_on_server(&config, server, output).await?;
            }
            Ok(())
        }
    }
}

fn discover_config() -> Result<Config> {
    let cwd = env::current_dir().expect("Failed to get current directory");
    Config::discover(&cwd)
}

/// Connect an SSH session to one configured server.
async fn connect(config: &Config, server: &ServerConfig) -> Result<Arc<Session>> {
    let user = server
        .user
        .clone()
        .unwrap_or_else(|| env::var("USER").unwrap_or_else(|_| "root".to_string()));

    let ssh_config = SessionConfig::new(&server.host, &user)
        .port(server.port)
        .trust_on_first_use(server.trust_first_connection)
        .command_timeout(config.command_timeout);

    let session = Session::connect(ssh_config).await.map_err(|e| Error::Ssh {
        host: server.host.clone(),
        source: e,
    })?;

    Ok(Arc::new(session))
}

async fn disconnect(session: &Session, host: &str) {
    if let Err(e) = session.disconnect().await {
        tracing::warn!("failed to disconnect from {}: {}", host, e);
    }
}

fn tarball_manager(
    config: &Config,
    exec: &SshExecutor,
) -> ReleaseManager<TarballStore<SshExecutor>, EtcActivation<SshExecutor>> {
    let site_dir = config.site_dir();
    let store = TarballStore::new(exec.clone(), site_dir.clone());
    let activation = EtcActivation::new(
        exec.clone(),
        format!("{site_dir}/.etclinks-created"),
        config.http_server.clone(),
    );
    ReleaseManager::new(store, activation, config.retain)
}

fn git_manager(
    config: &Config,
    exec: &SshExecutor,
) -> ReleaseManager<GitTagStore<SshExecutor>, EtcActivation<SshExecutor>> {
    let git = config
        .git
        .as_ref()
        .expect("validated at load: git backend requires a git section");
    let workspace = config.git_workspace();
    let store = GitTagStore::new(
        exec.clone(),
        workspace.clone(),
        git.repo.clone(),
        git.branch.clone(),
        git.build.clone(),
    );
    let activation = EtcActivation::new(
        exec.clone(),
        format!("{workspace}.etclinks-created"),
        config.http_server.clone(),
    );
    ReleaseManager::new(store, activation, config.retain)
}

/// Stage a new version on a single server.
async fn stage_on_server(
    config: &Config,
    server: &ServerConfig,
    revision: Option<&str>,
    force: bool,
    output: &Output,
) -> Result<()> {
    output.progress(&format!("  → Connecting to {}...", server.host));
    let session = connect(config, server).await?;
    let exec = SshExecutor::new(Arc::clone(&session));

    let lock = ReleaseLock::acquire(&exec, &config.site, force).await?;

    output.progress("  → Uploading artifact...");
    let result = match config.backend {
        BackendKind::Tarball => {
            let producer = DirProducer::new(&config.build_dir);
            tarball_manager(config, &exec).stage(&producer).await
        }
        BackendKind::Git => {
            let revision = revision.map(str::to_string).unwrap_or_else(|| {
                config
                    .git
                    .as_ref()
                    .expect("validated at load: git backend requires a git section")
                    .branch
                    .clone()
            });
            let producer = RevisionProducer::new(revision);
            git_manager(config, &exec).stage(&producer).await
        }
    };

    let _ = lock.release().await;
    disconnect(&session, &server.host).await;

    let id = result?;
    output.success(&format!("  ✓ Staged version {id} on {}", server.host));
    Ok(())
}

/// Deploy the staged version on a single server.
async fn deploy_on_server(
    config: &Config,
    server: &ServerConfig,
    force: bool,
    output: &Output,
) -> Result<()> {
    output.progress(&format!("  → Connecting to {}...", server.host));
    let session = connect(config, server).await?;
    let exec = SshExecutor::new(Arc::clone(&session));

    let lock = ReleaseLock::acquire(&exec, &config.site, force).await?;

    output.progress("  → Promoting staged version...");
    let result = match config.backend {
        BackendKind::Tarball => tarball_manager(config, &exec).deploy().await,
        BackendKind::Git => git_manager(config, &exec).deploy().await,
    };

    let _ = lock.release().await;
    disconnect(&session, &server.host).await;

    let id = result?;
    output.success(&format!("  ✓ Deployed version {id} on {}", server.host));
    Ok(())
}

/// Roll back to the previous (or an explicit) version on a single server.
async fn rollback_on_server(
    config: &Config,
    server: &ServerConfig,
    target: Option<&VersionId>,
    force: bool,
    output: &Output,
) -> Result<()> {
    output.progress(&format!("  → Connecting to {}...", server.host));
    let session = connect(config, server).await?;
    let exec = SshExecutor::new(Arc::clone(&session));

    let lock = ReleaseLock::acquire(&exec, &config.site, force).await?;

    output.progress("  → Restoring previous version...");
    let result = match config.backend {
        BackendKind::Tarball => tarball_manager(config, &exec).rollback(target).await,
        BackendKind::Git => git_manager(config, &exec).rollback(target).await,
    };

    let _ = lock.release().await;
    disconnect(&session, &server.host).await;

    let id = result?;
    output.success(&format!("  ✓ Rolled back to {id} on {}", server.host));
    Ok(())
}

/// Garbage-collect old versions on a single server.
async fn cleanup_on_server(
    config: &Config,
    server: &ServerConfig,
    retain: Option<usize>,
    force: bool,
    output: &Output,
) -> Result<()> {
    output.progress(&format!("  → Connecting to {}...", server.host));
    let session = connect(config, server).await?;
    let exec = SshExecutor::new(Arc::clone(&session));

    let lock = ReleaseLock::acquire(&exec, &config.site, force).await?;

    output.progress("  → Removing unreferenced versions...");
    let result = match config.backend {
        BackendKind::Tarball => tarball_manager(config, &exec).cleanup(retain).await,
        BackendKind::Git => git_manager(config, &exec).cleanup(retain).await,
    };

    let _ = lock.release().await;
    disconnect(&session, &server.host).await;

    let removed = result?;
    output.success(&format!(
        "  ✓ Removed {} version(s) on {}",
        removed.len(),
        server.host
    ));
    Ok(())
}

#[derive(Serialize)]
struct ServerStatus<'a> {
    host: &'a str,
    state: otto::release::ReleaseState,
    #[serde(flatten)]
    status: &'a ReleaseStatus,
}

/// Show pointers and history for a single server. Read-only, no lock.
async fn list_on_server(config: &Config, server: &ServerConfig, output: &Output) -> Result<()> {
    let session = connect(config, server).await?;
    let exec = SshExecutor::new(Arc::clone(&session));

    let result = match config.backend {
        BackendKind::Tarball => tarball_manager(config, &exec).status().await,
        BackendKind::Git => git_manager(config, &exec).status().await,
    };

    disconnect(&session, &server.host).await;
    let status = result?;

    if output.json(&ServerStatus {
        host: &server.host,
        state: status.state(),
        status: &status,
    }) {
        return Ok(());
    }

    print_status(config, server, &status);
    Ok(())
}

fn print_status(config: &Config, server: &ServerConfig, status: &ReleaseStatus) {
    fn shown(id: &Option<VersionId>) -> String {
        id.as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    println!("{} on {} [{}]", config.site, server.host, status.state());
    println!("  staged:     {}", shown(&status.staged));
    println!("  current:    {}", shown(&status.current));
    println!("  previous:   {}", shown(&status.previous));
    println!("  rolledback: {}", shown(&status.rolledback));
    if status.versions.is_empty() {
        println!("Available: none");
    } else {
        println!("Available:");
        for id in &status.versions {
            println!("  {id}");
        }
    }
}
