use std::sync::Arc;
use storybook_api::app::create_app;
use storybook_api::auth::AppState;
use storybook_api::config::{load_config, save_default_config, Config, StorageBackend};
use storybook_api::constants::{CONFIG_PATH, DATABASE_PATH, DATA_DIR};
use storybook_api::database::{create_pool, init_database};
use storybook_api::dropbox::HttpDropboxClient;
use storybook_api::error::AppResult;
use storybook_api::logging::{init_logging, install_panic_hook};
use storybook_api::store::{MemoryTokenStore, SqliteTokenStore, TokenStore};
use tracing::{info, warn};

fn create_token_store(config: &Config) -> AppResult<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory token store; refreshed tokens are lost on restart");
            Arc::new(MemoryTokenStore::default())
        }
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&*DATA_DIR)?;
            let pool = create_pool(&DATABASE_PATH)?;
            {
                let conn = pool.get()?;
                init_database(&conn)?;
            }
            Arc::new(SqliteTokenStore::new(pool))
        }
    };

    store.seed_users(&config.users)?;
    info!("Registered {} gallery users", config.users.len());
    Ok(store)
}

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--init-config") {
        match save_default_config(&CONFIG_PATH) {
            Ok(_) => {
                println!("Default configuration saved to {:?}", *CONFIG_PATH);
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("Failed to save default configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    init_logging();
    install_panic_hook();

    let mut config = load_config(&CONFIG_PATH);
    config.apply_env_overrides();
    let config = Arc::new(config);

    if config.dropbox.app_key.is_empty() || config.dropbox.app_secret.is_empty() {
        warn!("Dropbox app key/secret not set; expired access tokens cannot be refreshed");
    }

    let tokens = create_token_store(&config).expect("Failed to initialize token store");
    let dropbox =
        HttpDropboxClient::new(&config.dropbox).expect("Failed to create Dropbox client");

    let app = create_app(AppState {
        config: Arc::clone(&config),
        tokens,
        dropbox: Arc::new(dropbox),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting Storybook API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server failed");
}
