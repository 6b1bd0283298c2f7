//! Todo client: REST wrapper, sync controller and terminal front end.
pub mod api;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod repl;

pub use api::{HttpTodoApi, ListEcho, ListsSnapshot, TodoApi};
pub use controller::{SyncController, SyncOptions};
pub use error::ClientError;
