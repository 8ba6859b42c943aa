use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::future::join_all;

use uwhoisd_helpers::signal_handler::{
    get_signal_channel, signal_handler, sleep_unless_signalled,
};
use uwhoisd_helpers::{long_sleep_async, safe_create_dir, EnvConfig, Registry, Service};

#[derive(Parser)]
#[command(name = "uwhoisd-ctl", about = "Inspect and steer the uwhoisd service lifecycle")]
struct Cli {
    #[command(flatten)]
    env: EnvConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved home directory
    Home,
    /// Print the socket path of a service
    Socket { service: String },
    /// Create a directory (and parents) unless a file is in the way
    Mkdir { path: PathBuf },
    /// Mark a task as running
    SetRunning { name: String },
    /// Remove a task from the running registry
    UnsetRunning { name: String },
    /// List the running registry
    Running,
    /// Ping every known service
    Status,
    /// Print whether a shutdown is requested
    ShutdownRequested,
    /// Ask every service to stop
    RequestShutdown,
    /// Remove the shutdown flag
    ClearShutdown,
    /// Sleep, waking up early on shutdown or a signal
    Sleep { seconds: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let env = cli.env.environment()?;
    let registry = Registry::new(env.clone());

    match cli.command {
        Command::Home => println!("{}", env.home().display()),
        Command::Socket { service } => println!("{}", env.get_socket_path(&service)?),
        Command::Mkdir { path } => safe_create_dir(&path)?,
        Command::SetRunning { name } => registry.set_running(&name).await?,
        Command::UnsetRunning { name } => registry.unset_running(&name).await?,
        Command::Running => {
            let mut running: Vec<_> = registry.is_running().await?.into_iter().collect();
            running.sort();
            for (name, value) in running {
                println!("{}={}", name, value);
            }
        }
        Command::Status => {
            let pings = Service::ALL
                .iter()
                .map(|service| registry.check_running(service.as_str()));
            for (service, alive) in Service::ALL.iter().zip(join_all(pings).await) {
                println!("{}: {}", service, if alive? { "up" } else { "down" });
            }
        }
        Command::ShutdownRequested => println!("{}", registry.shutdown_requested().await),
        Command::RequestShutdown => registry.request_shutdown().await?,
        Command::ClearShutdown => registry.clear_shutdown().await?,
        Command::Sleep { seconds } => {
            let (publisher, mut signals) = get_signal_channel();
            tokio::spawn(signal_handler(publisher));

            let sleep = long_sleep_async(
                &registry,
                Duration::from_secs(seconds),
                cli.env.shutdown_check(),
            );
            let completed = sleep_unless_signalled(sleep, &mut signals).await;
            println!("{}", if completed { "completed" } else { "interrupted" });
        }
    }

    Ok(())
}
