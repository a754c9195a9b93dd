mod cli;
mod config;
mod plugins;
mod renewals;
mod storage;

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::Result;
use renew_store::RenewalStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let command = cli.command.unwrap_or(Command::List {
        id: None,
        name: None,
    });
    run(command, &config).await
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run(command: Command, config: &config::Config) -> Result<()> {
    match command {
        Command::List { id, name } => {
            renewals::list(&open_store(config).await?, id.as_deref(), name.as_deref())?
        }
        Command::Import { path } => renewals::import(&open_store(config).await?, &path)?,
        Command::Cancel { id } => renewals::cancel(&open_store(config).await?, &id)?,
        Command::Clear { yes } => renewals::clear(&open_store(config).await?, yes)?,
        Command::Encrypt { rotate_key } => {
            renewals::encrypt(config, &storage::key_provider(config), rotate_key).await?
        }
        Command::Plugins => renewals::plugins(&open_store(config).await?),
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(config)?,
    }
    Ok(())
}

async fn open_store(config: &config::Config) -> Result<RenewalStore> {
    storage::open_store(config, &storage::key_provider(config)).await
}

fn print_version() {
    println!("renew {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
