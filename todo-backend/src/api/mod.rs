use axum::{
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Router,
};
use todo_core::store::StoreError;

mod todo_list;

use crate::state::AppState;

pub const LIST_NOT_FOUND: &str = "Todo list not found";
pub const TODO_NOT_FOUND: &str = "Todo or todo list not found";
pub const LIST_CONFLICT: &str = "Todo list was modified concurrently";

/// Header on `GET /todo-lists` carrying every list's version as a JSON object.
pub const VERSIONS_HEADER: &str = "x-list-versions";

/// Axum REST API routes. Every other path or method is a plain 404.
///
///   GET    /todo-lists                      -> all lists keyed by id
///   POST   /todo-lists/:id/todos            -> append a todo (201)
///   DELETE /todo-lists/:id/todos/:index     -> remove the todo at index
///   PUT    /todo-lists/:id                  -> replace all todos (optional If-Match)
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/todo-lists", get(todo_list::list_all))
        .route("/todo-lists/{list_id}/todos", post(todo_list::add_todo))
        .route(
            "/todo-lists/{list_id}/todos/{index}",
            delete(todo_list::delete_todo),
        )
        .route("/todo-lists/{list_id}", put(todo_list::save_todos))
        // Must come after the routes it covers.
        .method_not_allowed_fallback(route_not_found)
        .fallback(route_not_found)
}

async fn route_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Log a refused request and build its plain-text response.
fn reject(
    status: StatusCode,
    reason: &'static str,
    target: &'static str,
    detail: impl std::fmt::Display,
) -> (StatusCode, String) {
    if status.is_server_error() {
        log::error!(target: target, "{} ({})", reason, detail);
    } else {
        log::warn!(target: target, "{} ({})", reason, detail);
    }
    (status, reason.to_string())
}

/// Map a store failure to a status and a plain-text reason.
/// `not_found` is the route-specific 404 wording.
fn store_rejection(
    err: &StoreError,
    not_found: &'static str,
    target: &'static str,
) -> (StatusCode, String) {
    match err {
        StoreError::ListNotFound(_) | StoreError::ItemOutOfRange { .. } => {
            reject(StatusCode::NOT_FOUND, not_found, target, err)
        }
        StoreError::Conflict { .. } => reject(StatusCode::CONFLICT, LIST_CONFLICT, target, err),
    }
}

/// Set a header, skipping it with a warning when the value isn't a valid header value.
fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> bool {
    match value.parse() {
        Ok(parsed) => {
            headers.insert(name, parsed);
            true
        }
        Err(e) => {
            log::warn!(target: "todo.api", "Skipping header {}: {:?} ({})", name, value, e);
            false
        }
    }
}
