use dedup_store::config::AppConfig;
use dedup_store::infrastructure::AppContainer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!(
        backend = ?config.store_backend,
        embeddings = ?config.embeddings_backend,
        port = config.port,
        "starting dedup-store"
    );

    let container = match AppContainer::new(config) {
        Ok(container) => container,
        Err(e) => {
            error!("failed to initialise: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = container.create_http_server().run().await {
        error!("server error: {}", e);
        std::process::exit(1);
    }
}
