use carrus::config::{Config, StoreKind};
use carrus::db::{MemoryStore, PgStore};
use carrus::engine::Engine;
use carrus::error::{config_error, Error};
use carrus::server::serve;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("carrus=info")),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!(store = ?config.store, "starting");

    match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| config_error("DATABASE_URL is required for the postgres store"))?;
            let store = PgStore::new(database_url, config.database_max_connections).await?;
            let engine = Engine::new(store)?.with_password_cost(config.password_hash_cost);

            serve(engine, config.bind_address).await
        }
        StoreKind::Memory => {
            let engine =
                Engine::new(MemoryStore::new())?.with_password_cost(config.password_hash_cost);

            serve(engine, config.bind_address).await
        }
    }
}
