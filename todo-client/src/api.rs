//! Thin wrapper over the todo server's REST API.
//!
//! Each call yields the parsed success payload or a `ClientError`.
//! Non-success statuses become `ClientError::Api` with a readable message.
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use todo_core::types::{format_etag, parse_etag, ListMap, TodoList, Versions};

use crate::error::ClientError;

/// Response header listing every list's version on `GET /todo-lists`.
pub const VERSIONS_HEADER: &str = "x-list-versions";

/// Result of reading every list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListsSnapshot {
    pub lists: ListMap,
    /// Empty when the server did not report versions.
    pub versions: Versions,
}

/// A server's answer to a mutation: the updated list and, when the
/// server sent an ETag, its version.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEcho {
    pub list: TodoList,
    pub version: Option<u64>,
}

#[async_trait]
pub trait TodoApi: Send + Sync {
    /// GET /todo-lists
    async fn fetch_lists(&self) -> Result<ListsSnapshot, ClientError>;

    /// POST /todo-lists/{list_id}/todos
    async fn add_todo(&self, list_id: &str, todo: &Value) -> Result<ListEcho, ClientError>;

    /// DELETE /todo-lists/{list_id}/todos/{index}
    async fn delete_todo(&self, list_id: &str, index: usize) -> Result<ListEcho, ClientError>;

    /// PUT /todo-lists/{list_id}, with `If-Match` when a version is given.
    async fn save_todo_list(
        &self,
        list_id: &str,
        todos: &[Value],
        expected_version: Option<u64>,
    ) -> Result<ListEcho, ClientError>;
}

pub struct HttpTodoApi {
    client: Client,
    base_url: Url,
}

impl HttpTodoApi {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Transport(format!("Invalid server URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "Invalid server URL {}: not a base URL",
                base_url
            )));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Message for a failed response: the JSON body's `message` when present,
/// otherwise `Error <code>: <plain-text body or reason phrase>`.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let detail = match body.trim() {
        "" => status.canonical_reason().unwrap_or("Unknown status"),
        text if text.starts_with('{') || text.starts_with('<') => {
            status.canonical_reason().unwrap_or("Unknown status")
        }
        text => text,
    };
    format!("Error {}: {}", status.as_u16(), detail)
}

/// Pass a success response through; turn anything else into `ClientError::Api`.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    log::warn!(target: "todo.client.api", "{} -> {}", status, message);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

async fn read_echo(response: Response) -> Result<ListEcho, ClientError> {
    let response = check_status(response).await?;
    let version = header_str(&response, "etag").and_then(parse_etag);
    let list = response.json().await?;
    Ok(ListEcho { list, version })
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn fetch_lists(&self) -> Result<ListsSnapshot, ClientError> {
        let response = self
            .client
            .get(self.endpoint(&["todo-lists"]))
            .send()
            .await?;
        let response = check_status(response).await?;
        let versions = header_str(&response, VERSIONS_HEADER)
            .and_then(|raw| match serde_json::from_str::<Versions>(raw) {
                Ok(versions) => Some(versions),
                Err(e) => {
                    log::debug!(target: "todo.client.api", "Ignoring {}: {}", VERSIONS_HEADER, e);
                    None
                }
            })
            .unwrap_or_default();
        let lists = response.json().await?;
        Ok(ListsSnapshot { lists, versions })
    }

    async fn add_todo(&self, list_id: &str, todo: &Value) -> Result<ListEcho, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&["todo-lists", list_id, "todos"]))
            .json(&serde_json::json!({ "todo": todo }))
            .send()
            .await?;
        read_echo(response).await
    }

    async fn delete_todo(&self, list_id: &str, index: usize) -> Result<ListEcho, ClientError> {
        let index = index.to_string();
        let response = self
            .client
            .delete(self.endpoint(&["todo-lists", list_id, "todos", index.as_str()]))
            .send()
            .await?;
        read_echo(response).await
    }

    async fn save_todo_list(
        &self,
        list_id: &str,
        todos: &[Value],
        expected_version: Option<u64>,
    ) -> Result<ListEcho, ClientError> {
        let mut request = self
            .client
            .put(self.endpoint(&["todo-lists", list_id]))
            .json(&serde_json::json!({ "todos": todos }));
        if let Some(version) = expected_version {
            request = request.header("if-match", format_etag(version));
        }
        read_echo(request.send().await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use todo_backend::server::spawn_server;
    use todo_backend::state::AppState;
    use todo_core::store::memory::MemoryStore;
    use todo_core::types::{item_text, TodoItem};

    async fn start_server() -> HttpTodoApi {
        let mut list = TodoList::new("L1", "First");
        list.todos = vec![
            TodoItem::new("A", false).to_value(),
            TodoItem::new("B", false).to_value(),
        ];
        let storage = Arc::new(MemoryStore::with_lists([list, TodoList::new("L2", "Second")]));
        let port = spawn_server(AppState::new(storage, 0, "127.0.0.1"))
            .await
            .unwrap();
        HttpTodoApi::new(&format!("http://127.0.0.1:{}", port)).unwrap()
    }

    #[test]
    fn test_error_message_prefers_json_message() {
        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"message":"bad todo"}"#);
        assert_eq!(msg, "bad todo");
    }

    #[test]
    fn test_error_message_plain_text_body() {
        let msg = error_message(StatusCode::NOT_FOUND, "Todo list not found");
        assert_eq!(msg, "Error 404: Todo list not found");
    }

    #[test]
    fn test_error_message_falls_back_to_reason() {
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Error 404: Not Found");
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"boom"}"#),
            "Error 500: Internal Server Error"
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let api = HttpTodoApi::new("http://localhost:3001/").unwrap();
        assert_eq!(
            api.endpoint(&["todo-lists", "a b", "todos"]).as_str(),
            "http://localhost:3001/todo-lists/a%20b/todos"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpTodoApi::new("not a url"),
            Err(ClientError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_round_trip_against_server() {
        let api = start_server().await;

        let snapshot = api.fetch_lists().await.unwrap();
        assert_eq!(snapshot.lists.len(), 2);
        assert_eq!(snapshot.versions["L1"], 0);

        let echo = api
            .add_todo("L1", &json!({ "text": "C", "completed": false, "tag": "x" }))
            .await
            .unwrap();
        assert_eq!(echo.version, Some(1));
        assert_eq!(echo.list.todos[2], json!({ "text": "C", "completed": false, "tag": "x" }));

        let echo = api.delete_todo("L1", 0).await.unwrap();
        let texts: Vec<&str> = echo.list.todos.iter().map(item_text).collect();
        assert_eq!(texts, vec!["B", "C"]);

        let todos = vec![json!({ "text": "only", "completed": true })];
        let echo = api.save_todo_list("L1", &todos, echo.version).await.unwrap();
        assert_eq!(echo.list.todos, todos);
        assert_eq!(echo.version, Some(3));
    }

    #[tokio::test]
    async fn test_server_errors_become_api_errors() {
        let api = start_server().await;

        let err = api.delete_todo("L1", 9).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Api {
                status: 404,
                message: "Error 404: Todo or todo list not found".to_string()
            }
        );

        let err = api.save_todo_list("L1", &[], Some(99)).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Bind then drop a listener to get a port nothing is serving.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let api = HttpTodoApi::new(&format!("http://127.0.0.1:{}", port)).unwrap();
        assert!(matches!(
            api.fetch_lists().await,
            Err(ClientError::Transport(_))
        ));
    }
}
