use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use hookvisor_server::WebhookServer;
use hookvisor_supervisor::{parse_duration, ConfigOverrides, SecretString, Supervisor, SupervisorConfig};
use hookvisor_trigger::{trigger_channel, ShutdownSignal};

/// Restart a command whenever a signed GitHub push arrives
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML); flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on [default: localhost:8000]
    #[arg(long, value_name = "HOST:PORT")]
    address: Option<String>,

    /// Command to run and restart
    #[arg(long)]
    command: Option<String>,

    /// Argument for the command (repeatable)
    #[arg(long = "params", value_name = "ARG", allow_hyphen_values = true)]
    params: Vec<String>,

    /// Grace period before the command is killed, e.g. 500ms, 5s, 1m [default: 5s]
    #[arg(long, value_parser = parse_duration)]
    shutdown_timeout: Option<Duration>,

    /// Webhook secret
    #[arg(long, env = "HOOKVISOR_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Event type that triggers a restart [default: push]
    #[arg(long)]
    event: Option<String>,

    /// Ref that triggers a restart [default: refs/heads/main]
    #[arg(long = "ref", value_name = "REF")]
    git_ref: Option<String>,

    /// File receiving the command's stdout [default: command.out]
    #[arg(long, value_name = "FILE")]
    stdout_file: Option<PathBuf>,

    /// File receiving the command's stderr [default: command.err]
    #[arg(long, value_name = "FILE")]
    stderr_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            address: self.address.clone(),
            command: self.command.clone(),
            params: self.params.clone(),
            shutdown_timeout: self.shutdown_timeout,
            secret: self.secret.clone().map(SecretString::from),
            event: self.event.clone(),
            git_ref: self.git_ref.clone(),
            stdout_file: self.stdout_file.clone(),
            stderr_file: self.stderr_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    let config = SupervisorConfig::resolve(args.config.as_deref(), args.overrides())?;
    info!(
        command = %config.command,
        address = %config.address,
        event = %config.event,
        git_ref = %config.git_ref,
        "Starting hookvisor"
    );

    let verifier = config.verifier()?;
    let (triggers, receiver) = trigger_channel();
    let shutdown = ShutdownSignal::new();

    let server = WebhookServer::bind(&config.address, verifier, triggers)
        .await
        .with_context(|| format!("Failed to listen on {}", config.address))?;

    let _signals = spawn_signal_listener(shutdown.clone())?;

    let server_task = {
        let shutdown = shutdown.clone();
        let drain_timeout = config.shutdown_timeout;
        tokio::spawn(async move {
            let result = server.run(shutdown.clone(), drain_timeout).await;
            if let Err(e) = &result {
                error!(error = %e, "Webhook server failed");
                shutdown.shutdown();
            }
            result
        })
    };

    let supervisor = Supervisor::from_config(&config, receiver, shutdown.clone());
    let supervised = supervisor.run().await;

    // The supervisor is done either way; take the server down with it.
    shutdown.shutdown();
    let served = server_task.await;

    let summary = supervised.map_err(|e| {
        error!(error = %e, "Supervisor failed");
        anyhow!(e)
    })?;
    served
        .context("Webhook server task panicked")?
        .context("Webhook server failed")?;

    info!(
        starts = summary.starts,
        forced_kills = summary.forced_kills,
        "hookvisor shut down"
    );
    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}

/// Close `shutdown` on the first SIGTERM or SIGINT.
#[cfg(unix)]
fn spawn_signal_listener(shutdown: ShutdownSignal) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM signal"),
            _ = sigint.recv() => info!("Received SIGINT signal"),
            _ = shutdown.wait() => return,
        }
        shutdown.shutdown();
    }))
}

/// Close `shutdown` on Ctrl+C.
#[cfg(not(unix))]
fn spawn_signal_listener(shutdown: ShutdownSignal) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                info!("Received Ctrl+C signal");
            }
            _ = shutdown.wait() => return,
        }
        shutdown.shutdown();
    }))
}
