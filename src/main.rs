use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tree_booking::booking::{CatalogResolver, CheckoutRegistry};
use tree_booking::cache::{start_cache_warmer, AppCache};
use tree_booking::config::Config;
use tree_booking::db::PgStore;
use tree_booking::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tree_booking=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let store = Arc::new(PgStore::new(pool));
    let providers = store.providers();

    let cache = AppCache::new(config.catalog_cache_ttl);
    tokio::spawn(start_cache_warmer(cache.clone(), providers.catalog.clone()));

    let state = AppState {
        resolver: CatalogResolver::new(providers.catalog.clone()).with_cache(cache.clone()),
        cache,
        identity: store.clone(),
        checkouts: CheckoutRegistry::new(config.checkout_idle, config.checkout_max_sessions),
        providers,
        config: Arc::new(config.clone()),
    };

    let app = tree_booking::app(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
