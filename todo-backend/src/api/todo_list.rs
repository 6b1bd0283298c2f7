use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use todo_core::store::VersionedList;
use todo_core::types::{format_etag, parse_etag, ListMap, TodoList};

use super::{
    reject, set_header, store_rejection, LIST_NOT_FOUND, TODO_NOT_FOUND, VERSIONS_HEADER,
};
use crate::state::AppState;

type ListResponse = Result<(StatusCode, HeaderMap, Json<TodoList>), (StatusCode, String)>;

/// Items are taken as arbitrary JSON; a missing `todo` appends `null`.
#[derive(Deserialize)]
pub struct AddTodoBody {
    #[serde(default)]
    todo: Value,
}

#[derive(Deserialize)]
pub struct SaveTodosBody {
    #[serde(default)]
    todos: Vec<Value>,
}

/// The list record as the body, its version as the ETag.
fn list_response(status: StatusCode, updated: VersionedList) -> (StatusCode, HeaderMap, Json<TodoList>) {
    let mut headers = HeaderMap::new();
    set_header(&mut headers, "etag", &format_etag(updated.version));
    (status, headers, Json(updated.list))
}

pub async fn list_all(State(state): State<AppState>) -> (HeaderMap, Json<ListMap>) {
    let (lists, versions) = state.storage.snapshot();
    let mut headers = HeaderMap::new();
    match serde_json::to_string(&versions) {
        Ok(encoded) => {
            set_header(&mut headers, VERSIONS_HEADER, &encoded);
        }
        Err(e) => log::warn!(target: "todo.api.list_all", "Cannot encode versions: {}", e),
    }
    (headers, Json(lists))
}

/// POST /todo-lists/{list_id}/todos -- append one todo, 201 with the updated list.
pub async fn add_todo(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(body): Json<AddTodoBody>,
) -> ListResponse {
    let updated = state
        .storage
        .append_item(&list_id, body.todo)
        .map_err(|e| store_rejection(&e, LIST_NOT_FOUND, "todo.api.add_todo"))?;
    Ok(list_response(StatusCode::CREATED, updated))
}

/// DELETE /todo-lists/{list_id}/todos/{index}
/// A non-numeric or negative index is just another todo that doesn't exist.
pub async fn delete_todo(
    State(state): State<AppState>,
    Path((list_id, raw_index)): Path<(String, String)>,
) -> ListResponse {
    let index: usize = raw_index.parse().map_err(|_| {
        reject(
            StatusCode::NOT_FOUND,
            TODO_NOT_FOUND,
            "todo.api.delete_todo",
            format!("invalid index {:?} for list {}", raw_index, list_id),
        )
    })?;

    let updated = state
        .storage
        .remove_item_at(&list_id, index)
        .map_err(|e| store_rejection(&e, TODO_NOT_FOUND, "todo.api.delete_todo"))?;
    Ok(list_response(StatusCode::OK, updated))
}

/// PUT /todo-lists/{list_id} -- replace the whole todo sequence, verbatim.
/// Last write wins unless the request carries `If-Match: "<version>"`.
pub async fn save_todos(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SaveTodosBody>,
) -> ListResponse {
    let expected_version = headers
        .get("if-match")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let parsed = parse_etag(value);
            if parsed.is_none() {
                log::warn!(
                    target: "todo.api.save_todos",
                    "Ignoring unparsable If-Match {:?} for list {}",
                    value,
                    list_id
                );
            }
            parsed
        });

    let updated = state
        .storage
        .replace_items(&list_id, body.todos, expected_version)
        .map_err(|e| store_rejection(&e, LIST_NOT_FOUND, "todo.api.save_todos"))?;
    Ok(list_response(StatusCode::OK, updated))
}
