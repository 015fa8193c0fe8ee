use clap::Parser;
use helpline_core::HelplineConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "helpline.toml")]
    config: String,

    /// Check database connectivity and exit
    #[arg(long)]
    health: bool,

    /// Insert or refresh the demo admin, support and customer accounts, then exit
    #[arg(long)]
    seed_demo_users: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match HelplineConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match helpline_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match helpline_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Helpline DB health check passed");
        return Ok(());
    }

    helpline_core::db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    if args.seed_demo_users {
        let seeded = helpline_server::subsystems::auth::seed_demo_users(&pool).await?;
        println!("✅ Seeded {} demo users", seeded);
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.auth.enforce_roles {
        tracing::info!("Role gate enabled for dashboard routes");
        if config.auth.uses_default_secret() {
            tracing::warn!(
                "Role gate is using the default jwt_secret; set auth.jwt_secret or HELPLINE__AUTH__JWT_SECRET"
            );
        }
    }

    helpline_server::http::start_http_server(pool, config, tx.subscribe()).await?;

    Ok(())
}
