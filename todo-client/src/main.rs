use std::sync::Arc;

use env_logger::Env;
use todo_client::config::{self, SelectionStore};
use todo_client::{repl, HttpTodoApi, SyncController, SyncOptions};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let config = config::load_config(&config::default_config_path());
    let api = Arc::new(HttpTodoApi::new(&config.server_url)?);
    log::info!(target: "todo.client", "Using server {}", api.base_url());

    let controller = SyncController::new(api, SyncOptions::from(&config))
        .with_selection_store(SelectionStore::default_location());
    controller.load().await;
    if let Some(message) = controller.error() {
        eprintln!("! {}", message);
    }

    repl::run(&controller, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    Ok(())
}
