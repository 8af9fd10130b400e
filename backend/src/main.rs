use backend::config::Config;
use backend::sessions::spawn_session_sweeper;
use backend::{app, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    let state = AppState::from_config(&config).await;
    spawn_session_sweeper(state.clone());
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("cannot bind {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };

    info!("listening on {}", config.bind_addr);
    if let Err(err) = axum::serve(listener, app(state)).await {
        error!("server error: {err}");
    }
}
