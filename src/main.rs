use std::{net::SocketAddr, time::Duration};

use foodgram::{config::Config, state::AppState, MIGRATOR};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    log::info!("Starting foodgram on {}:{}", config.host, config.port);

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    log::info!("Connected to database");

    if config.run_migrations {
        MIGRATOR.run(&pool).await?;
        log::info!("Migrations applied");
    }

    let cache = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let connection = client.get_multiplexed_tokio_connection().await?;
            log::info!("Connected to cache");
            Some(connection)
        }
        None => {
            log::warn!("REDIS_URL not set, caching is disabled and logout cannot revoke tokens");
            None
        }
    };

    tokio::fs::create_dir_all(&config.media_root).await?;

    let address = SocketAddr::new(config.host, config.port);
    let state = AppState::new(pool, cache, config)?;
    let routes = foodgram::routes(state);

    let (address, server) =
        warp::serve(routes).bind_with_graceful_shutdown(address, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for shutdown signal: {e}");
            }
            log::info!("Shutting down");
        });
    log::info!("Listening on http://{address}");
    server.await;

    Ok(())
}
