//! Callisto - learning-goal tracker API

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callisto::{
    config::Args,
    db::MongoClient,
    server::{self, AppState},
    services::{ConsoleNotifier, GeminiClient, HttpMailer, Notifier, RoadmapGenerator},
    store::{
        MongoCategoryRepository, MongoItemRepository, MongoUserRepository, ProgressStore,
        UserRepository,
    },
};

/// Connect the MongoDB-backed repositories
async fn connect_mongo(args: &Args) -> callisto::Result<(Arc<dyn UserRepository>, ProgressStore)> {
    let client = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let users = MongoUserRepository::new(&client).await?;
    let categories = MongoCategoryRepository::new(&client).await?;
    let items = MongoItemRepository::new(&client).await?;
    Ok((
        Arc::new(users),
        ProgressStore::new(Arc::new(categories), Arc::new(items)),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("callisto={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Callisto - learning-goal tracker");
    info!("======================================");
    info!("Instance: {}", args.instance_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", if args.in_memory { "disabled (in-memory)" } else { args.mongodb_uri.as_str() });
    info!("Roadmap models: {}", args.roadmap_model_list().join(", "));
    info!("======================================");

    // Persistence: MongoDB unless told otherwise; dev mode falls back to memory
    let (users, store, persistence): (Arc<dyn UserRepository>, ProgressStore, &'static str) =
        if args.in_memory {
            warn!("Using in-memory storage - data is lost on restart");
            (
                Arc::new(callisto::store::MemoryUserRepository::new()),
                ProgressStore::in_memory(),
                "memory",
            )
        } else {
            match connect_mongo(&args).await {
                Ok((users, store)) => {
                    info!("MongoDB connected successfully");
                    (users, store, "mongodb")
                }
                Err(e) if args.dev_mode => {
                    warn!("MongoDB connection failed (dev mode, continuing in memory): {}", e);
                    (
                        Arc::new(callisto::store::MemoryUserRepository::new()),
                        ProgressStore::in_memory(),
                        "memory",
                    )
                }
                Err(e) => {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    // Verification mail: HTTP relay when configured, console otherwise
    let notifier: Arc<dyn Notifier> = match (&args.mail_api_url, &args.mail_api_key) {
        (Some(url), Some(key)) => {
            info!("Mail relay: {}", url);
            Arc::new(HttpMailer::new(
                url.as_str(),
                key.as_str(),
                args.mail_from.as_str(),
                args.request_timeout(),
            )?)
        }
        _ => {
            warn!("Mail relay not configured - OTP codes will be logged");
            Arc::new(ConsoleNotifier)
        }
    };

    let roadmap = match &args.gemini_api_key {
        Some(key) => {
            let client = GeminiClient::new(
                args.gemini_api_url.as_str(),
                key.as_str(),
                args.model_timeout(),
            )?;
            RoadmapGenerator::new(Arc::new(client), args.roadmap_model_list())
                .with_call_timeout(args.model_timeout())
        }
        None => {
            warn!("GEMINI_API_KEY not set - roadmap generation disabled");
            RoadmapGenerator::unconfigured()
        }
    };

    let state = AppState::with_services(args, users, store, notifier, roadmap, persistence)?;
    server::run(Arc::new(state)).await?;

    Ok(())
}
