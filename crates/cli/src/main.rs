use std::sync::Arc;

use {
    clap::Parser,
    sqlx::SqlitePool,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    omnidesk_gateway::{
        AppState, GatewayConfig, SqliteCustomerStore, SqliteIntegrationStore, build_router, serve,
    },
    omnidesk_links::store::{CustomerStore, IntegrationStore},
    omnidesk_registry::{LinkRegistry, PlatformLinkFactory},
    omnidesk_zalo::ZaloService,
};

#[derive(Parser)]
#[command(name = "omnidesk", about = "Omnidesk — multi-tenant platform link gateway")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Config file path.
    #[arg(long, env = "OMNIDESK_CONFIG", default_value = "omnidesk.toml")]
    config: std::path::PathBuf,

    /// Address to bind to (overrides config value).
    #[arg(long)]
    bind: Option<String>,

    /// SQLite connection string (overrides config value).
    #[arg(long, env = "OMNIDESK_DATABASE_URL")]
    database_url: Option<String>,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let mut config = GatewayConfig::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    let pool = SqlitePool::connect(&config.database_url).await?;
    SqliteIntegrationStore::init(&pool).await?;
    SqliteCustomerStore::init(&pool).await?;

    let integrations: Arc<dyn IntegrationStore> =
        Arc::new(SqliteIntegrationStore::new(pool.clone()));
    let customers: Arc<dyn CustomerStore> = Arc::new(SqliteCustomerStore::new(pool.clone()));

    let zalo = Arc::new(ZaloService::new(Arc::clone(&integrations), Arc::clone(&customers)));
    let factory = Arc::new(PlatformLinkFactory::new(customers, Arc::clone(&zalo)));
    let registry = Arc::new(LinkRegistry::new(integrations, factory));

    registry.start_all_enabled().await?;
    info!(links = registry.active_keys().len(), "platform links started");

    let app = build_router(AppState {
        registry,
        zalo,
    });
    serve(&config.bind_addr, app).await
}
