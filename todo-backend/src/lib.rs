/// Todo backend: config loading, store init, HTTP server.
pub mod api;
pub mod config;
pub mod logging;
pub mod server;
pub mod state;

use crate::state::AppState;

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = logging::init() {
        eprintln!("failed to initialize backend logger: {}", e);
    }

    let config_path = config::default_config_path();
    let config = config::apply_env_overrides(config::load_config(&config_path));
    for list in &config.lists {
        log::info!(
            target: "todo.store",
            "Seeded list: {} ({:?}, {} todos)",
            list.id,
            list.title,
            list.todos.len()
        );
    }

    let state = AppState::from_config(&config);
    spawn_server_until_shutdown(state).await
}

async fn spawn_server_until_shutdown(
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    server::spawn_server(state).await?;
    tokio::signal::ctrl_c().await?;
    log::info!(target: "todo.server", "Shutting down; in-memory lists are discarded");
    Ok(())
}
