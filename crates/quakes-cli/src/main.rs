mod fetch;
mod host;
mod settings;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use quakes_core::{AppConfig, FetchSize, LastOption, Provider, SearchRadius, SettingsStore};
use quakes_db::{PoolConfig, QuakeStore};
use quakes_feed::{Endpoints, FeedClient, NetworkActivity};
use quakes_pipeline::FetchPipeline;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quakes-cli")]
#[command(about = "Earthquake feed fetcher and local store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch quakes from the enabled providers and merge them into the store
    Fetch {
        #[command(subcommand)]
        command: FetchCommands,
    },
    /// Add nearby cities and country code to a stored quake
    Detail {
        #[arg(long, default_value = "usgs")]
        provider: Provider,
        #[arg(long)]
        id: String,
    },
    /// Run one background fetch activation and print its result
    BackgroundFetch,
    /// Run background fetch activations on a cron schedule until interrupted
    Schedule {
        /// Six-field cron expression (seconds first)
        #[arg(long, default_value = "0 */15 * * * *")]
        cron: String,
    },
    /// List stored quakes, newest first
    List {
        #[arg(long)]
        min_magnitude: Option<f64>,
        #[arg(long)]
        provider: Option<Provider>,
        /// Only quakes from the last N days
        #[arg(long)]
        days: Option<i64>,
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Register a push token for a location
    RegisterDevice {
        #[arg(long)]
        token: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum FetchCommands {
    /// Significant quakes worldwide
    World,
    /// Major quakes for one month, counting back from now
    Major {
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Quakes around a coordinate; remembered as the last searched place
    Near {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCommands {
    Show,
    FetchSize {
        size: FetchSize,
    },
    Radius {
        radius: SearchRadius,
    },
    /// Comma-separated provider list
    Providers {
        #[arg(value_delimiter = ',', required = true)]
        providers: Vec<Provider>,
    },
    /// Location option replayed by background fetches
    LocationOption {
        option: LastOption,
    },
    /// Set the last searched place
    Place {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    ClearPlace,
    /// Set the cached device location used by the nearby option
    CachedPlace {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Notifications {
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

/// Everything a command needs, wired from one [`AppConfig`].
pub(crate) struct Context {
    pub(crate) config: AppConfig,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) pipeline: FetchPipeline,
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<QuakeStore>> {
    let pool = quakes_db::connect_pool(&config.database_url, PoolConfig::default()).await?;
    let applied = quakes_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "migrations applied");
    }
    Ok(Arc::new(QuakeStore::new(pool)))
}

async fn build_context(config: AppConfig) -> anyhow::Result<Context> {
    let settings = Arc::new(SettingsStore::open(config.settings_path.clone())?);
    let store = connect_store(&config).await?;

    let activity = NetworkActivity::new();
    let mut visible = activity.subscribe();
    tokio::spawn(async move {
        while visible.changed().await.is_ok() {
            let on = *visible.borrow_and_update();
            tracing::debug!(visible = on, "network activity");
        }
    });

    let client = FeedClient::from_config(&config, activity)
        .map_err(|e| anyhow::anyhow!("failed to build feed client: {e}"))?;
    let endpoints = Endpoints::from_config(&config)?;
    let pipeline = FetchPipeline::from_config(&config, client, endpoints, store);
    Ok(Context {
        config,
        settings,
        pipeline,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = quakes_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("quakes-cli: no command given; see --help");
        return Ok(());
    };

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                let pool =
                    quakes_db::connect_pool(&config.database_url, PoolConfig::default()).await?;
                quakes_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let pool =
                    quakes_db::connect_pool(&config.database_url, PoolConfig::default()).await?;
                let applied = quakes_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
        },
        Commands::Settings { command } => {
            let store = SettingsStore::open(config.settings_path.clone())?;
            settings::run_settings(&store, &config, command)?;
        }
        Commands::Fetch { command } => {
            let ctx = build_context(config).await?;
            fetch::run_fetch(&ctx, command).await?;
        }
        Commands::Detail { provider, id } => {
            let ctx = build_context(config).await?;
            fetch::run_detail(&ctx, provider, &id).await?;
        }
        Commands::BackgroundFetch => {
            let ctx = build_context(config).await?;
            fetch::run_background_once(&ctx).await?;
        }
        Commands::Schedule { cron } => {
            let ctx = build_context(config).await?;
            fetch::run_schedule(ctx, &cron).await?;
        }
        Commands::List {
            min_magnitude,
            provider,
            days,
            limit,
        } => {
            let store = connect_store(&config).await?;
            fetch::run_list(&store, min_magnitude, provider, days, limit).await?;
        }
        Commands::RegisterDevice { token, lat, lon } => {
            let ctx = build_context(config).await?;
            fetch::run_register_device(&ctx, &token, lat, lon).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
