use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use life_news::app::AppContext;
use life_news::cli::{commands, Cli, Commands, VapidAction};
use life_news::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("life_news=info")))
        .init();

    let cli = Cli::parse();

    // Key generation needs neither config nor database.
    if let Commands::Vapid {
        action: VapidAction::Generate { subject, json },
    } = &cli.command
    {
        commands::vapid_generate(subject, *json)?;
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Commands::Vapid {
        action: VapidAction::Check,
    } = &cli.command
    {
        commands::vapid_check(&config)?;
        return Ok(());
    }

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Serve {
            interval,
            no_initial_run,
        } => {
            commands::serve(Arc::new(ctx), interval.as_deref(), no_initial_run).await?;
        }
        Commands::Run => {
            commands::run_once(&ctx).await?;
        }
        Commands::Sources => {
            commands::list_sources(&ctx)?;
        }
        Commands::Fetch { limit } => {
            commands::fetch_sources(&ctx, limit).await?;
        }
        Commands::Cleanup { days } => {
            commands::cleanup(&ctx, days)?;
        }
        Commands::Subscriptions => {
            commands::list_subscriptions(&ctx)?;
        }
        Commands::Vapid { .. } => {}
    }

    Ok(())
}
